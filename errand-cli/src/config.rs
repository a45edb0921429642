// errand-cli/src/config.rs

//! Locates and loads the CLI configuration, applying command-line overrides.

use anyhow::{Context, Result, anyhow};
use errand_core::config::{DirectorConfig, ErrandConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_FILENAME: &str = "errand.toml";

/// Walks up from `start` looking for `errand.toml`.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let config_path = dir.join(CONFIG_FILENAME);
        if config_path.is_file() {
            return Some(config_path);
        }
        current = dir.parent();
    }
    None
}

fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("errand").join("config.toml"))
        .filter(|p| p.is_file())
}

fn read_config(config_path: &Path) -> Result<ErrandConfig> {
    info!("Loading configuration file: {:?}", config_path);
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
    ErrandConfig::from_toml_str(&content)
        .with_context(|| format!("Failed to parse or validate {:?}", config_path))
}

/// Resolved settings for one command run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub director: DirectorConfig,
    pub deployment: String,
}

pub fn load_settings(
    explicit_path: Option<&Path>,
    director_override: Option<&str>,
    deployment_override: Option<&str>,
) -> Result<Settings> {
    let config_path = match explicit_path {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            find_config_file(&cwd).or_else(user_config_file)
        }
    };

    let file_config = config_path.as_deref().map(read_config).transpose()?;
    resolve_settings(file_config, director_override, deployment_override)
}

fn resolve_settings(
    file_config: Option<ErrandConfig>,
    director_override: Option<&str>,
    deployment_override: Option<&str>,
) -> Result<Settings> {
    let (mut director, file_deployment) = match file_config {
        Some(config) => (config.director, config.deployment),
        None => {
            let url = director_override.ok_or_else(|| {
                anyhow!(
                    "Could not find '{}' in the current directory or any parent directory, and no --director was given.",
                    CONFIG_FILENAME
                )
            })?;
            (DirectorConfig::new(url), None)
        }
    };

    if let Some(url) = director_override {
        debug!(url, "Director URL overridden on the command line");
        director.url = url.to_string();
    }
    director.validate()?;

    let deployment = deployment_override
        .map(str::to_string)
        .or(file_deployment)
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| anyhow!("Expected a deployment: pass --deployment or set 'deployment' in {}", CONFIG_FILENAME))?;

    Ok(Settings {
        director,
        deployment,
    })
}
