// errand-cli/src/ui.rs

use anyhow::Result;
use errand_core::{ErrandResult, ExecuteErrand, Ui, async_trait};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

/// Prints each line to stdout.
pub struct TerminalUi;

/// Captured errand output usually ends in its own newline; drop one so the line ends once.
fn without_trailing_newline(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

impl Ui for TerminalUi {
    fn print_line(&self, line: &str) {
        let mut stdout = io::stdout().lock();
        // A closed stdout (e.g. `| head`) is not worth failing the errand over.
        let _ = writeln!(stdout, "{}", without_trailing_newline(line));
    }
}

/// Shows a spinner on stderr while the wrapped deployment runs the errand.
pub struct SpinnerDeployment {
    inner: Arc<dyn ExecuteErrand>,
}

impl SpinnerDeployment {
    pub fn new(inner: Arc<dyn ExecuteErrand>) -> Self {
        Self { inner }
    }
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "-"]));
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[async_trait]
impl ExecuteErrand for SpinnerDeployment {
    async fn run_errand(&self, name: &str, keep_alive: bool) -> Result<ErrandResult> {
        let pb = spinner(format!("Running errand '{}'...", name));
        let result = self.inner.run_errand(name, keep_alive).await;
        pb.finish_and_clear();
        result
    }
}
