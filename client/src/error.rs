use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Everything that can go wrong between a user action and the backend.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("backend unreachable: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{message}")]
    Server { status: StatusCode, message: String },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("identity store at '{path}': {message}")]
    Identity { path: PathBuf, message: String },

    #[error("invalid viewer id '{0}', expected a UUID")]
    InvalidViewerId(String),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

impl ClientError {
    /// True when the backend could not be reached at all.
    pub fn is_offline(&self) -> bool {
        matches!(self, ClientError::Network(_) | ClientError::Timeout)
    }

    /// Build the error for a non-success response from its status and the
    /// message extracted from the body.
    pub(crate) fn from_status(status: StatusCode, message: String) -> Self {
        if status == StatusCode::NOT_FOUND {
            ClientError::NotFound(message)
        } else {
            ClientError::Server { status, message }
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else if e.is_builder() {
            ClientError::Validation(format!("invalid request: {e}"))
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
