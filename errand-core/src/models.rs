// errand-core/src/models.rs

use std::path::PathBuf;

/// Everything needed to run one errand, as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrandInvocation {
    /// Name of the errand job.
    pub name: String,
    /// Keep the errand VMs running after the errand finishes.
    pub keep_alive: bool,
    /// Download the errand's log bundle when it succeeds.
    pub download_logs: bool,
    /// Directory the log bundle is written to. Only read when `download_logs` is set.
    pub logs_destination: PathBuf,
}

impl ErrandInvocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keep_alive: false,
            download_logs: false,
            logs_destination: PathBuf::from("."),
        }
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn download_logs_to(mut self, destination: impl Into<PathBuf>) -> Self {
        self.download_logs = true;
        self.logs_destination = destination.into();
        self
    }
}

/// How a finished errand ended, derived from its exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrandStatus {
    Succeeded,
    Failed,
    /// Exit codes above 128 mean the errand was killed by a signal.
    Canceled,
}

impl ErrandStatus {
    pub fn from_exit_code(exit_code: i32) -> Self {
        match exit_code {
            0 => ErrandStatus::Succeeded,
            code if code > 128 => ErrandStatus::Canceled,
            _ => ErrandStatus::Failed,
        }
    }
}

/// Result of a finished errand as reported by the director.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub logs_blobstore_id: String,
    pub logs_checksum: String,
}

/// Reference to a downloadable log bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogsBlob<'a> {
    pub blobstore_id: &'a str,
    pub checksum: &'a str,
}

impl ErrandResult {
    pub fn status(&self) -> ErrandStatus {
        ErrandStatus::from_exit_code(self.exit_code)
    }

    /// The log bundle, if the director reported one. A blob id without a checksum (or
    /// the reverse) counts as no logs.
    pub fn logs_blob(&self) -> Option<LogsBlob<'_>> {
        if self.logs_blobstore_id.is_empty() || self.logs_checksum.is_empty() {
            return None;
        }
        Some(LogsBlob {
            blobstore_id: &self.logs_blobstore_id,
            checksum: &self.logs_checksum,
        })
    }
}
