use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::HeaderName;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

const APP_DIR: &str = "failure-atlas";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Client settings. Every field is optional in the TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the backend (e.g. "http://127.0.0.1:8000").
    pub api_base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Quiet period before a search keystroke reloads the feed.
    pub search_debounce_ms: u64,
    /// Header carrying the viewer id on scoped requests.
    pub user_id_header: String,
    /// Where the viewer id is persisted. Defaults next to the config file.
    pub identity_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            timeout_seconds: 10,
            search_debounce_ms: 300,
            user_id_header: "X-User-Id".to_string(),
            identity_path: None,
        }
    }
}

impl ClientConfig {
    /// `~/.config/failure-atlas/config.toml` or the platform equivalent,
    /// falling back to the current directory.
    pub fn config_path() -> PathBuf {
        app_dir().join("config.toml")
    }

    /// Loads the default config file, then applies `ATLAS_*` environment
    /// overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())?.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Loads from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: ClientConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Applies `ATLAS_API_URL` and `ATLAS_TIMEOUT_SECONDS` from `lookup`.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("ATLAS_API_URL") {
            info!("ATLAS_API_URL set, using {url}");
            self.api_base_url = url;
        }
        if let Some(raw) = lookup("ATLAS_TIMEOUT_SECONDS") {
            self.timeout_seconds = raw.trim().parse().map_err(|e| ConfigError::ValidationError {
                message: format!("ATLAS_TIMEOUT_SECONDS '{raw}': {e}"),
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks:
    /// - the base URL is http or https
    /// - the timeout is non-zero
    /// - the identity header name is a valid HTTP header name
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError {
                message: format!("api_base_url '{}' must start with http:// or https://", url),
            });
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "timeout_seconds must be greater than zero".to_string(),
            });
        }
        let header = self.user_id_header.trim();
        if header.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "user_id_header must not be empty".to_string(),
            });
        }
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            return Err(ConfigError::ValidationError {
                message: format!("user_id_header '{header}' is not a valid HTTP header name"),
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn identity_file(&self) -> PathBuf {
        self.identity_path
            .clone()
            .unwrap_or_else(|| app_dir().join("identity.json"))
    }
}

fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
