use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const APP_NAME: &str = "Tutor Virtual";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Client-side request timeout. Unset means no timeout.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Settings {
    /// Reads `tutor.toml` from the working directory if present, then
    /// `TUTOR__*` environment variables on top.
    pub fn load() -> Result<Self> {
        let builder = Config::builder()
            .add_source(File::with_name("tutor").required(false))
            .add_source(
                Environment::with_prefix("TUTOR")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder
            .build()
            .map_err(map_config_error)
            .context("failed to build configuration")?;

        config
            .try_deserialize::<Settings>()
            .map_err(map_config_error)
            .context("failed to deserialize configuration")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("session.db")
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            data_dir: default_data_dir(),
            request_timeout_secs: None,
        }
    }
}

fn map_config_error(err: ConfigError) -> anyhow::Error {
    match err {
        ConfigError::NotFound(_) => err.into(),
        _ => anyhow::anyhow!(err),
    }
}

fn default_api_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

fn default_data_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".local/share")))
        .unwrap_or_else(|_| PathBuf::from("."));
    base.join("tutor")
}
