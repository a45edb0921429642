// errand-cli/src/main.rs
mod config;
mod models;
mod ui;

use anyhow::{Context, Result, anyhow};
use colored::*;
use std::env;
use std::fs;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use errand_core::{
    BlobDownloader, Deployment, DirectorClient, ErrandInvocation, ErrandRunner, Ui,
};

use crate::config::load_settings;
use crate::models::cli::{Cli, Commands, RunErrandArgs};
use crate::ui::{SpinnerDeployment, TerminalUi};

use clap::Parser;
use tracing::{debug, info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_FILE_NAME: &str = "errand.log";

/// Installs stderr and file logging. The returned guard flushes the file writer on drop.
fn init_logging(verbose: u8) -> Result<WorkerGuard> {
    let default_level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level.into()));

    let log_dir = dirs::cache_dir()
        .or_else(dirs::runtime_dir)
        .unwrap_or_else(env::temp_dir)
        .join("errand");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let time_format_desc = time::format_description::parse(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]",
    )
    .context("Failed to parse log time format")?;
    let local_timer = LocalTime::new(time_format_desc);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_timer(local_timer.clone());

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(local_timer)
        .with_target(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized. Level determined by RUST_LOG or -v flags (default: {}). Logging to stderr and {}",
        default_level,
        log_dir.join(LOG_FILE_NAME).display()
    );
    Ok(guard)
}

async fn run_errand(cli: &Cli, args: &RunErrandArgs) -> Result<()> {
    let settings = load_settings(
        cli.config.as_deref(),
        cli.director.as_deref(),
        cli.deployment.as_deref(),
    )?;
    debug!(deployment = %settings.deployment, director = %settings.director.url, "Resolved settings");

    let logs_destination = match &args.logs_dir {
        Some(dir) => dir.clone(),
        None => env::current_dir().context("Failed to get current directory")?,
    };
    let invocation = ErrandInvocation {
        name: args.name.clone(),
        keep_alive: args.keep_alive,
        download_logs: args.download_logs,
        logs_destination,
    };

    let client = Arc::new(DirectorClient::new(&settings.director)?);
    let ui: Arc<dyn Ui> = Arc::new(TerminalUi);
    let deployment = Arc::new(SpinnerDeployment::new(Arc::new(Deployment::new(
        client.clone(),
        settings.deployment,
    ))));
    let downloader = Arc::new(BlobDownloader::new(client, ui.clone()));

    let runner = ErrandRunner::new(deployment, downloader, ui);
    runner.run(&invocation).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _guard = match init_logging(cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let result = match &cli.command {
        Commands::Run(args) => run_errand(&cli, args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("Command failed: {:?}", e);
            eprintln!("{} {:#}", "Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}
