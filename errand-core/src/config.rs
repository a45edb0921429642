// errand-core/src/config.rs

//! Handles configuration structures and parsing for the errand library.

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const DEFAULT_TASK_POLL_INTERVAL_MS: u64 = 500;

#[derive(Deserialize, Debug, Clone)]
pub struct ErrandConfig {
    pub director: DirectorConfig,
    /// Deployment the errands belong to. Usually overridden on the command line.
    #[serde(default)]
    pub deployment: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DirectorConfig {
    pub url: String,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Name of an environment variable holding the client secret.
    #[serde(default)]
    pub client_secret_env_var: Option<String>,
    /// PEM file with the CA that signed the director's certificate.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    #[serde(default = "default_task_poll_interval_ms")]
    pub task_poll_interval_ms: u64,
}

fn default_task_poll_interval_ms() -> u64 {
    DEFAULT_TASK_POLL_INTERVAL_MS
}

impl DirectorConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: None,
            client_secret: None,
            client_secret_env_var: None,
            ca_cert: None,
            task_poll_interval_ms: DEFAULT_TASK_POLL_INTERVAL_MS,
        }
    }

    pub fn task_poll_interval(&self) -> Duration {
        Duration::from_millis(self.task_poll_interval_ms)
    }

    /// The client secret, taken from `client_secret` or else from the environment
    /// variable named by `client_secret_env_var`.
    pub fn resolve_client_secret(&self) -> Result<Option<String>> {
        if let Some(secret) = &self.client_secret {
            return Ok(Some(secret.clone()));
        }
        match &self.client_secret_env_var {
            Some(var) => std::env::var(var)
                .map(Some)
                .with_context(|| format!("Client secret environment variable '{}' is not set", var)),
            None => Ok(None),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("'director.url' is empty."));
        }
        let url = Url::parse(&self.url)
            .with_context(|| format!("Invalid URL format for director ('{}').", self.url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(anyhow!(
                "Director URL '{}' must use http or https, not '{}'.",
                self.url,
                url.scheme()
            ));
        }
        let has_secret = self.client_secret.is_some() || self.client_secret_env_var.is_some();
        let has_client = self
            .client
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if has_secret && !has_client {
            return Err(anyhow!(
                "A client secret is configured but 'director.client' is missing."
            ));
        }
        if self.task_poll_interval_ms == 0 {
            return Err(anyhow!("'director.task_poll_interval_ms' must be greater than 0."));
        }
        Ok(())
    }
}

impl ErrandConfig {
    pub fn from_toml_str(config_toml_content: &str) -> Result<ErrandConfig> {
        let config: ErrandConfig = match toml::from_str(config_toml_content) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::error!(error = %e, "Failed to parse TOML content");
                return Err(anyhow!(e))
                    .context("Failed to parse configuration TOML content. Check TOML syntax.");
            }
        };

        config.director.validate()?;
        if let Some(deployment) = &config.deployment {
            if deployment.trim().is_empty() {
                return Err(anyhow!("'deployment' in config content is empty."));
            }
        }

        tracing::info!("Successfully parsed and validated errand configuration.");
        Ok(config)
    }
}
