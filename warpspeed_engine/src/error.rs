// WarpSpeed Engine - error.rs

use std::time::Duration;

use thiserror::Error;

/// Failures reported by a [`Transport`](crate::transport::Transport).
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Network request failed: {0}")]
    Network(String),
    #[error("Server returned an unsuccessful status code: {0}")]
    Unsuccessful(u16),
    #[error("Timed out after {0:?} waiting for data")]
    Timeout(Duration),
    #[error("Connection closed with {remaining} bytes of the range still missing")]
    ConnectionClosed { remaining: u64 },
    #[error("Could not get content length from server: {0}")]
    NoContentLength(String),
    #[error("Unsupported location: {0}")]
    Unsupported(String),
}

impl TransportError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Network(_)
            | TransportError::Timeout(_)
            | TransportError::ConnectionClosed { .. } => true,
            TransportError::Unsuccessful(status) => *status == 408 || *status == 429 || *status >= 500,
            TransportError::NoContentLength(_) | TransportError::Unsupported(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => TransportError::Unsuccessful(status.as_u16()),
            None => TransportError::Network(err.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),
    #[error("Resume invalid, restart required: {0}")]
    ResourceChanged(String),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    #[error("Snapshot persistence failed: {0}")]
    Persistence(String),
    #[error("Timed out after {0:?} waiting for the {1} lock")]
    LockTimeout(Duration, &'static str),
    #[error("Operation not allowed in state {0}")]
    InvalidState(String),
    #[error("Download not found: {0}")]
    NotFound(String),
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Errors that end a download instead of being retried by the fetch loop.
    pub fn is_fatal(&self) -> bool {
        match self {
            EngineError::Transport(err) => !err.is_transient(),
            _ => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
