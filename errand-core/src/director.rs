// errand-core/src/director.rs

//! HTTP client for the director API.
//!
//! The director runs long operations as tasks: a request that starts one is answered with
//! a redirect to `/tasks/<id>`, which is then polled until the task finishes. Task output
//! is read from `/tasks/<id>/output`.

use crate::config::DirectorConfig;
use anyhow::{Context, Result, anyhow};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, header, redirect};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

const RESOURCE_CHUNK_BACKLOG: usize = 16;

/// A director task as returned by `GET /tasks/<id>`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Task {
    pub id: u64,
    pub state: String,
    #[serde(default)]
    pub description: String,
}

impl Task {
    pub fn is_running(&self) -> bool {
        matches!(self.state.as_str(), "queued" | "processing" | "cancelling")
    }
}

pub struct DirectorClient {
    http: Client,
    base_url: String,
    client: Option<String>,
    client_secret: Option<String>,
    task_poll_interval: Duration,
}

impl DirectorClient {
    pub fn new(config: &DirectorConfig) -> Result<Self> {
        config.validate()?;

        // Task redirects are followed by hand so the task id can be read.
        let mut builder = Client::builder().redirect(redirect::Policy::none());
        if let Some(ca_path) = &config.ca_cert {
            let pem = std::fs::read(ca_path)
                .with_context(|| format!("Failed to read director CA certificate {:?}", ca_path))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .with_context(|| format!("Invalid PEM in director CA certificate {:?}", ca_path))?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder
            .build()
            .context("Failed to build HTTP client for director")?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            client: config.client.clone(),
            client_secret: config.resolve_client_secret()?,
            task_poll_interval: config.task_poll_interval(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        trace!(%method, %url, "Building director request");
        let builder = self.http.request(method, url);
        match &self.client {
            Some(client) => builder.basic_auth(client, self.client_secret.as_deref()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> Result<Response> {
        builder
            .send()
            .await
            .with_context(|| format!("Performing request to director '{}{}'", self.base_url, path))
    }

    /// Starts a director task with a JSON body and returns its id.
    pub async fn start_task<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<u64> {
        let response = self
            .send(self.request(Method::POST, path).json(body), path)
            .await?;

        let status = response.status();
        if status != StatusCode::FOUND {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, path, "Director did not redirect to a task");
            return Err(non_success_error(status, &body));
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| anyhow!("Director redirect for '{}' is missing a Location header", path))?;
        let task_id = parse_task_id(location)?;
        info!(task_id, path, "Director task started");
        Ok(task_id)
    }

    pub async fn task(&self, id: u64) -> Result<Task> {
        let path = format!("/tasks/{}", id);
        let response = self.send(self.request(Method::GET, &path), &path).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Reading director task '{}'", id))?;
        if !status.is_success() {
            return Err(non_success_error(status, &body));
        }
        serde_json::from_str(&body)
            .with_context(|| format!("Unmarshaling director task '{}': {}", id, body))
    }

    /// Polls a task until it finishes. Only `done` counts as success.
    pub async fn wait_for_task(&self, id: u64) -> Result<Task> {
        loop {
            let task = self.task(id).await?;
            if !task.is_running() {
                if task.state != "done" {
                    warn!(task_id = id, state = %task.state, "Director task did not succeed");
                    return Err(anyhow!(
                        "Expected task '{}' to succeed but state is '{}'",
                        id,
                        task.state
                    ));
                }
                debug!(task_id = id, "Director task finished");
                return Ok(task);
            }
            trace!(task_id = id, state = %task.state, "Director task still running");
            tokio::time::sleep(self.task_poll_interval).await;
        }
    }

    /// Reads the `result` output of a finished task.
    pub async fn task_result(&self, id: u64) -> Result<String> {
        let path = format!("/tasks/{}/output?type=result", id);
        let response = self.send(self.request(Method::GET, &path), &path).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Reading result of director task '{}'", id))?;
        if !status.is_success() {
            return Err(non_success_error(status, &body));
        }
        Ok(body)
    }

    /// Streams a blobstore resource into `writer` and hands it back with the number of
    /// bytes written. Writes run on the blocking pool; chunks reach them over a channel.
    pub async fn download_resource<W>(&self, blob_id: &str, writer: W) -> Result<(W, u64)>
    where
        W: Write + Send + 'static,
    {
        let path = format!("/resources/{}", blob_id);
        let mut response = self.send(self.request(Method::GET, &path), &path).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(non_success_error(status, &body));
        }

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(RESOURCE_CHUNK_BACKLOG);
        let resource = blob_id.to_string();
        let write_task = tokio::task::spawn_blocking(move || -> Result<(W, u64)> {
            let mut writer = writer;
            let mut written: u64 = 0;
            while let Some(chunk) = rx.blocking_recv() {
                writer
                    .write_all(&chunk)
                    .with_context(|| format!("Writing resource '{}'", resource))?;
                written += chunk.len() as u64;
            }
            writer
                .flush()
                .with_context(|| format!("Flushing resource '{}'", resource))?;
            Ok((writer, written))
        });

        let mut received = Ok(());
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    // A closed channel means the writer failed; its error is reported below.
                    if tx.send(chunk.to_vec()).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    received = Err(anyhow::Error::new(e)
                        .context(format!("Downloading resource '{}'", blob_id)));
                    break;
                }
            }
        }
        drop(tx);

        let (writer, written) = write_task
            .await
            .with_context(|| format!("Writer for resource '{}' did not finish", blob_id))??;
        received?;
        debug!(blob_id, bytes = written, "Downloaded director resource");
        Ok((writer, written))
    }
}

fn non_success_error(status: StatusCode, body: &str) -> anyhow::Error {
    anyhow!(
        "Director responded with non-successful status code '{}' response '{}'",
        status.as_u16(),
        body
    )
}

fn parse_task_id(location: &str) -> Result<u64> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| anyhow!("Failed to find task id in redirect location '{}'", location))
}
