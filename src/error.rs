//! Error types for the changelog relay.

use std::time::Duration;
use thiserror::Error;

/// Main error type for relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Store is locked by another process")]
    Locked,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Request timed out")]
    TimedOut,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl RelayError {
    /// Whether this error came from the durable store.
    ///
    /// Store errors are never swallowed: once a durable write fails the
    /// delivery state can no longer be trusted.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            RelayError::Io(_)
                | RelayError::Serialization(_)
                | RelayError::Deserialization(_)
                | RelayError::Corruption(_)
                | RelayError::InvalidFormat(_)
                | RelayError::ChecksumMismatch { .. }
                | RelayError::Locked
        )
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Deserialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for RelayError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        RelayError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for RelayError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        RelayError::Deserialization(e.to_string())
    }
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
