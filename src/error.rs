//! Error types for the Maylo client core.

use thiserror::Error;

/// Local key/value storage errors.
///
/// These never escape the guest session store; they are logged and absorbed
/// there so that a missing storage medium degrades to "not a guest".
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Storage medium unavailable: {0}")]
    Unavailable(String),

    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Corrupt value for key {key}: {value:?}")]
    Corrupt { key: String, value: String },
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        match err {
            sled::Error::Io(io) => StorageError::Io(io.to_string()),
            other => StorageError::Backend(other.to_string()),
        }
    }
}

/// Failure reported by a remote collaborator (identity or favorites store).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {message}")]
pub struct RemoteError {
    pub operation: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced to callers of the client core.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// No identity is present; the caller should send the viewer to authentication.
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(#[from] RemoteError),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Async runtime could not be started (CLI only)
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl ApiError {
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, ApiError::Unauthenticated)
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
