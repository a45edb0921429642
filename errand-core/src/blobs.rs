// errand-core/src/blobs.rs

//! Downloads blobstore resources (errand log bundles) through the director.

use crate::digest::{ExpectedDigest, StreamHasher};
use crate::director::DirectorClient;
use crate::{DownloadBlob, Ui, async_trait};
use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Hashes everything written through it.
struct HashingWriter<W> {
    inner: W,
    hasher: StreamHasher,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

pub struct BlobDownloader {
    client: Arc<DirectorClient>,
    ui: Arc<dyn Ui>,
}

impl BlobDownloader {
    pub fn new(client: Arc<DirectorClient>, ui: Arc<dyn Ui>) -> Self {
        Self { client, ui }
    }
}

/// `<dir>/<prefix>-<YYYYMMDD-HHMMSS.nnnnnnnnn>.tgz`
fn destination_file_path(destination_dir: &Path, name_prefix: &str) -> PathBuf {
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S%.9f");
    destination_dir.join(format!("{}-{}.tgz", name_prefix, timestamp))
}

#[async_trait]
impl DownloadBlob for BlobDownloader {
    async fn download(
        &self,
        blob_id: &str,
        checksum: &str,
        name_prefix: &str,
        destination_dir: &Path,
    ) -> Result<()> {
        let expected: ExpectedDigest = checksum
            .parse()
            .with_context(|| format!("Parsing checksum '{}' for resource '{}'", checksum, blob_id))?;

        let dst_file_path = destination_file_path(destination_dir, name_prefix);
        self.ui.print_line(&format!(
            "Downloading resource '{}' to '{}'...",
            blob_id,
            dst_file_path.display()
        ));

        // The temp file is removed on drop unless it is persisted below.
        let temp_file = NamedTempFile::new_in(destination_dir).with_context(|| {
            format!("Creating temporary file in {:?}", destination_dir)
        })?;
        let writer = HashingWriter {
            inner: temp_file,
            hasher: expected.hasher(),
        };

        let (writer, bytes) = self.client.download_resource(blob_id, writer).await?;
        debug!(blob_id, bytes, "Verifying downloaded resource");

        let HashingWriter { inner, hasher } = writer;
        if let Err(e) = expected.verify(hasher) {
            warn!(blob_id, error = %e, "Downloaded resource failed verification");
            return Err(anyhow!(e)).with_context(|| format!("Verifying resource '{}'", blob_id));
        }

        inner
            .persist(&dst_file_path)
            .with_context(|| format!("Moving resource '{}' to {:?}", blob_id, dst_file_path))?;
        info!(blob_id, path = %dst_file_path.display(), "Downloaded resource");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DirectorConfig;
    use crate::digest::Algorithm;
    use httpmock::prelude::*;
    use std::fs;
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    const BUNDLE: &[u8] = b"fake log bundle";

    #[derive(Default)]
    struct RecordingUi {
        said: StdMutex<Vec<String>>,
    }

    impl Ui for RecordingUi {
        fn print_line(&self, line: &str) {
            self.said.lock().unwrap().push(line.to_string());
        }
    }

    fn sha1_of(bytes: &[u8]) -> String {
        let mut hasher = StreamHasher::new(Algorithm::Sha1);
        hasher.update(bytes);
        hasher.finalize_hex()
    }

    async fn serve_bundle(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/resources/logs-blob-id");
                then.status(200).body(BUNDLE);
            })
            .await;
    }

    fn downloader_for(server: &MockServer, ui: Arc<RecordingUi>) -> BlobDownloader {
        let client = Arc::new(DirectorClient::new(&DirectorConfig::new(server.base_url())).unwrap());
        BlobDownloader::new(client, ui)
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[test]
    fn test_destination_file_path_format() {
        let path = destination_file_path(Path::new("/fake-dir"), "errand-name");
        let file_name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(path.parent(), Some(Path::new("/fake-dir")));
        assert!(file_name.starts_with("errand-name-"), "{}", file_name);
        assert!(file_name.ends_with(".tgz"), "{}", file_name);
        // errand-name- + YYYYMMDD-HHMMSS.nnnnnnnnn + .tgz
        assert_eq!(file_name.len(), "errand-name-".len() + 25 + ".tgz".len());
    }

    #[tokio::test]
    async fn test_download_writes_verified_file() {
        let server = MockServer::start_async().await;
        serve_bundle(&server).await;
        let dir = tempdir().unwrap();
        let ui = Arc::new(RecordingUi::default());

        downloader_for(&server, ui.clone())
            .download("logs-blob-id", &sha1_of(BUNDLE), "errand-name", dir.path())
            .await
            .unwrap();

        let files = files_in(dir.path());
        assert_eq!(files.len(), 1);
        assert_eq!(fs::read(&files[0]).unwrap(), BUNDLE);

        let said = ui.said.lock().unwrap();
        assert_eq!(
            *said,
            vec![format!(
                "Downloading resource 'logs-blob-id' to '{}'...",
                files[0].display()
            )]
        );
    }

    #[tokio::test]
    async fn test_download_checksum_mismatch_leaves_no_file() {
        let server = MockServer::start_async().await;
        serve_bundle(&server).await;
        let dir = tempdir().unwrap();

        let err = downloader_for(&server, Arc::new(RecordingUi::default()))
            .download("logs-blob-id", &sha1_of(b"other"), "errand-name", dir.path())
            .await
            .unwrap_err();

        assert!(
            format!("{:#}", err).contains("Expected stream to have digest"),
            "Unexpected error message: {:#}",
            err
        );
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_download_server_error_leaves_no_file() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/resources/logs-blob-id");
                then.status(500).body("blobstore unavailable");
            })
            .await;
        let dir = tempdir().unwrap();

        let err = downloader_for(&server, Arc::new(RecordingUi::default()))
            .download("logs-blob-id", &sha1_of(BUNDLE), "errand-name", dir.path())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("'500'"), "{}", err);
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_download_rejects_bad_checksum_before_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/resources/logs-blob-id");
                then.status(200).body(BUNDLE);
            })
            .await;
        let dir = tempdir().unwrap();

        let result = downloader_for(&server, Arc::new(RecordingUi::default()))
            .download("logs-blob-id", "md5:abc", "errand-name", dir.path())
            .await;

        assert!(result.is_err());
        mock.assert_hits_async(0).await;
    }
}
