// errand-core/src/lib.rs

//! Core library for running deployment errands.
//!
//! The [`ErrandRunner`] drives a single errand invocation. Everything it talks to is a
//! trait object: [`ExecuteErrand`] runs the errand remotely, [`DownloadBlob`] fetches the
//! resulting log bundle and [`Ui`] receives the lines shown to the user. The `director`,
//! `deployment` and `blobs` modules provide HTTP-backed implementations of those traits.

pub mod blobs;
pub mod config;
pub mod deployment;
pub mod digest;
pub mod director;
pub mod errors;
pub mod models;
pub mod runner;


use anyhow::Result;
use std::path::Path;

pub use async_trait::async_trait;

pub use blobs::BlobDownloader;
pub use config::{DirectorConfig, ErrandConfig};
pub use deployment::Deployment;
pub use director::DirectorClient;
pub use errors::ErrandError;
pub use models::{ErrandInvocation, ErrandResult, ErrandStatus, LogsBlob};
pub use runner::ErrandRunner;

/// Runs errands on a remote deployment.
#[async_trait]
pub trait ExecuteErrand: Send + Sync {
    /// Runs the named errand and waits for it to finish.
    ///
    /// An `Err` means the errand could not be run or its result could not be fetched.
    /// A finished errand with a non-zero exit code is still `Ok`.
    async fn run_errand(&self, name: &str, keep_alive: bool) -> Result<ErrandResult>;
}

/// Fetches a blob from the blobstore into a local directory.
#[async_trait]
pub trait DownloadBlob: Send + Sync {
    /// Downloads `blob_id` into `destination_dir`, naming the file after `name_prefix`.
    /// Implementations verify the content against `checksum`.
    async fn download(
        &self,
        blob_id: &str,
        checksum: &str,
        name_prefix: &str,
        destination_dir: &Path,
    ) -> Result<()>;
}

/// Append-only sink for user-facing output lines.
pub trait Ui: Send + Sync {
    fn print_line(&self, line: &str);
}
