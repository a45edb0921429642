// errand-core/src/runner.rs
use crate::errors::ErrandError;
use crate::models::{ErrandInvocation, ErrandResult, ErrandStatus};
use crate::{DownloadBlob, ExecuteErrand, Ui};
use std::sync::Arc;

/// Runs one errand: executes it remotely, shows its output, fetches its logs when asked,
/// and turns the exit code into the command's result.
pub struct ErrandRunner {
    deployment: Arc<dyn ExecuteErrand>,
    downloader: Arc<dyn DownloadBlob>,
    ui: Arc<dyn Ui>,
}

impl ErrandRunner {
    pub fn new(
        deployment: Arc<dyn ExecuteErrand>,
        downloader: Arc<dyn DownloadBlob>,
        ui: Arc<dyn Ui>,
    ) -> Self {
        Self {
            deployment,
            downloader,
            ui,
        }
    }

    pub async fn run(&self, invocation: &ErrandInvocation) -> Result<(), ErrandError> {
        let result = self
            .deployment
            .run_errand(&invocation.name, invocation.keep_alive)
            .await
            .map_err(ErrandError::Execution)?;

        let status = result.status();
        self.render(&invocation.name, &result, status);

        match status {
            ErrandStatus::Succeeded => {
                if invocation.download_logs {
                    if let Some(blob) = result.logs_blob() {
                        self.downloader
                            .download(
                                blob.blobstore_id,
                                blob.checksum,
                                &invocation.name,
                                &invocation.logs_destination,
                            )
                            .await
                            .map_err(ErrandError::Download)?;
                    }
                }
                Ok(())
            }
            ErrandStatus::Failed => Err(ErrandError::CompletedWithError {
                name: invocation.name.clone(),
                exit_code: result.exit_code,
            }),
            ErrandStatus::Canceled => Err(ErrandError::Canceled {
                name: invocation.name.clone(),
                exit_code: result.exit_code,
            }),
        }
    }

    fn render(&self, name: &str, result: &ErrandResult, status: ErrandStatus) {
        if !result.stdout.is_empty() {
            self.ui.print_line("[stdout]");
            self.ui.print_line(&result.stdout);
        }

        if !result.stderr.is_empty() {
            self.ui.print_line("[stderr]");
            self.ui.print_line(&result.stderr);
        }

        // Failures are reported through the returned error.
        if status == ErrandStatus::Succeeded {
            self.ui.print_line(&format!(
                "Errand '{}' completed successfully (exit code {})",
                name, result.exit_code
            ));
        }
    }
}
