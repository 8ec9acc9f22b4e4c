use crate::{
    error::{BoardError, Result},
    sync::SyncPolicy,
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::fs;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root of the REST API, without a trailing slash
    pub api_url: String,
    pub request_timeout_secs: u64,
    /// Directory holding the saved session
    pub session_dir: PathBuf,
    pub sync: SyncPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Self::DEFAULT_API_URL.to_string(),
            request_timeout_secs: 30,
            session_dir: PathBuf::from("."),
            sync: SyncPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub const DEFAULT_API_URL: &'static str = "http://localhost:5000";
    pub const API_URL_ENV: &'static str = "TASKBOARD_API_URL";
    pub const TIMEOUT_ENV: &'static str = "TASKBOARD_TIMEOUT_SECS";
    pub const SESSION_DIR_ENV: &'static str = "TASKBOARD_SESSION_DIR";

    /// Defaults overlaid with `TASKBOARD_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Loads a JSON config file; missing keys take their defaults
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).await?;
        let config: ClientConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup(Self::API_URL_ENV) {
            self.api_url = url;
        }

        if let Some(timeout) = lookup(Self::TIMEOUT_ENV) {
            self.request_timeout_secs = timeout.trim().parse().map_err(|_| {
                BoardError::ConfigError(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    Self::TIMEOUT_ENV,
                    timeout
                ))
            })?;
        }

        if let Some(dir) = lookup(Self::SESSION_DIR_ENV) {
            self.session_dir = PathBuf::from(dir);
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(BoardError::ConfigError(format!(
                "api_url must be an http(s) URL, got '{}'",
                self.api_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(BoardError::ConfigError(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
