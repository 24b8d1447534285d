// error.rs

use thiserror::Error;

/// Failure of a persistence call. `Display` is the message shown to the user.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("not authorized: {0}")]
    Unauthorized(String),
    #[error("could not decode server response: {0}")]
    Decode(String),
    #[error("local storage failed: {0}")]
    Storage(#[from] std::io::Error),
    #[error("todo {id} not found")]
    NotFound { id: String },
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("auth request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("could not decode auth response: {0}")]
    Decode(String),
    #[error("remote server is not configured")]
    NotConfigured,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config file {path} is malformed: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
