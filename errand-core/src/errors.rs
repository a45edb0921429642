// errand-core/src/errors.rs
use thiserror::Error;

/// Terminal errors of an errand run.
#[derive(Error, Debug)]
pub enum ErrandError {
    /// The errand could not be run, or its result could not be fetched.
    #[error(transparent)]
    Execution(anyhow::Error),

    /// The errand finished with an exit code between 1 and 128.
    #[error("Errand '{name}' completed with error (exit code {exit_code})")]
    CompletedWithError { name: String, exit_code: i32 },

    /// The errand was killed by a signal (exit code above 128).
    #[error("Errand '{name}' was canceled (exit code {exit_code})")]
    Canceled { name: String, exit_code: i32 },

    /// The errand succeeded but its logs could not be downloaded.
    #[error(transparent)]
    Download(anyhow::Error),
}
