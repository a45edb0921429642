// errand-core/src/deployment.rs

//! Runs errands through the director for a single deployment.

use crate::director::DirectorClient;
use crate::models::ErrandResult;
use crate::{ExecuteErrand, async_trait};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, trace};

#[derive(Serialize, Debug)]
struct RunErrandBody {
    #[serde(rename = "keep-alive")]
    keep_alive: bool,
}

/// One line of an errand task's result output. The director may send `null` for any
/// string field; missing and `null` both read as empty.
#[derive(Deserialize, Debug)]
struct ErrandResultResp {
    exit_code: i32,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    logs: Option<ErrandLogsResp>,
}

#[derive(Deserialize, Debug, Default)]
struct ErrandLogsResp {
    #[serde(default)]
    blobstore_id: Option<String>,
    #[serde(default)]
    sha1: Option<String>,
}

impl From<ErrandResultResp> for ErrandResult {
    fn from(resp: ErrandResultResp) -> Self {
        let logs = resp.logs.unwrap_or_default();
        ErrandResult {
            exit_code: resp.exit_code,
            stdout: resp.stdout.unwrap_or_default(),
            stderr: resp.stderr.unwrap_or_default(),
            logs_blobstore_id: logs.blobstore_id.unwrap_or_default(),
            logs_checksum: logs.sha1.unwrap_or_default(),
        }
    }
}

/// A named deployment on a director.
pub struct Deployment {
    client: Arc<DirectorClient>,
    name: String,
}

impl Deployment {
    pub fn new(client: Arc<DirectorClient>, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }
}

#[async_trait]
impl ExecuteErrand for Deployment {
    async fn run_errand(&self, name: &str, keep_alive: bool) -> Result<ErrandResult> {
        info!(deployment = %self.name, errand = name, keep_alive, director = %self.client.base_url(), "Running errand");

        let path = format!("/deployments/{}/errands/{}/runs", self.name, name);
        let task_id = self
            .client
            .start_task(&path, &RunErrandBody { keep_alive })
            .await
            .with_context(|| format!("Running errand '{}'", name))?;

        self.client.wait_for_task(task_id).await?;
        let output = self.client.task_result(task_id).await?;
        trace!(task_id, output = %output, "Errand task result");

        let result = parse_errand_result(&output)
            .with_context(|| format!("Unmarshaling errand result for task '{}'", task_id))?;
        debug!(task_id, exit_code = result.exit_code, "Errand finished");
        Ok(result)
    }
}

fn parse_errand_result(output: &str) -> Result<ErrandResult> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| anyhow!("Errand task result is empty"))?;
    let resp: ErrandResultResp = serde_json::from_str(line)?;
    Ok(resp.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DirectorConfig;
    use httpmock::prelude::*;
    use serde_json::json;

    fn deployment_for(server: &MockServer) -> Deployment {
        let mut config = DirectorConfig::new(server.base_url());
        config.task_poll_interval_ms = 1;
        let client = Arc::new(DirectorClient::new(&config).unwrap());
        Deployment::new(client, "dep")
    }

    #[test]
    fn test_parse_full_result() {
        let output = r#"{"exit_code":0,"stdout":"out","stderr":"err","logs":{"blobstore_id":"blob-1","sha1":"abc"}}"#;
        let result = parse_errand_result(output).unwrap();
        assert_eq!(
            result,
            ErrandResult {
                exit_code: 0,
                stdout: "out".to_string(),
                stderr: "err".to_string(),
                logs_blobstore_id: "blob-1".to_string(),
                logs_checksum: "abc".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_minimal_result_uses_first_line() {
        let output = "\n{\"exit_code\":129}\n{\"exit_code\":0}\n";
        let result = parse_errand_result(output).unwrap();
        assert_eq!(result.exit_code, 129);
        assert!(result.stdout.is_empty());
        assert!(result.logs_blob().is_none());
    }

    #[test]
    fn test_parse_null_fields_read_as_empty() {
        let output = r#"{"exit_code":0,"stdout":null,"stderr":"err","logs":{"blobstore_id":null,"sha1":null}}"#;
        let result = parse_errand_result(output).unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "");
        assert_eq!(result.stderr, "err");
        assert!(result.logs_blob().is_none());

        let result = parse_errand_result(r#"{"exit_code":1,"stdout":"out","logs":null}"#).unwrap();
        assert_eq!(result.stdout, "out");
        assert!(result.stderr.is_empty());
        assert!(result.logs_blob().is_none());
    }

    #[test]
    fn test_parse_empty_result_is_error() {
        assert!(parse_errand_result("  \n").is_err());
        assert!(parse_errand_result("not json").is_err());
    }

    #[tokio::test]
    async fn test_run_errand_round_trip() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let server = MockServer::start_async().await;
        let start = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/deployments/dep/errands/smoke-tests/runs")
                    .json_body(json!({ "keep-alive": true }));
                then.status(302).header("Location", "/tasks/7");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/tasks/7");
                then.status(200).json_body(json!({ "id": 7, "state": "done" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/tasks/7/output")
                    .query_param("type", "result");
                then.status(200).body(
                    json!({
                        "exit_code": 1,
                        "stdout": "stdout-content",
                        "stderr": "",
                        "logs": { "blobstore_id": "logs-blob-id", "sha1": "logs-sha1" }
                    })
                    .to_string()
                        + "\n",
                );
            })
            .await;

        let deployment = deployment_for(&server);
        let result = deployment.run_errand("smoke-tests", true).await.unwrap();

        start.assert_hits_async(1).await;
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stdout, "stdout-content");
        assert_eq!(result.logs_blobstore_id, "logs-blob-id");
        assert_eq!(result.logs_checksum, "logs-sha1");
    }

    #[tokio::test]
    async fn test_run_errand_failed_task_is_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/deployments/dep/errands/smoke-tests/runs");
                then.status(302).header("Location", "/tasks/8");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/tasks/8");
                then.status(200).json_body(json!({ "id": 8, "state": "cancelled" }));
            })
            .await;

        let deployment = deployment_for(&server);
        let err = deployment.run_errand("smoke-tests", false).await.unwrap_err();
        assert!(
            err.to_string().contains("Expected task '8' to succeed but state is 'cancelled'"),
            "Unexpected error message: {}",
            err
        );
    }
}
