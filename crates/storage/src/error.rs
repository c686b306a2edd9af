//! Error types for the storage gateway.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors surfaced by a gateway fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The object does not exist in the backend
    #[error("object not found: {key}")]
    NotFound {
        /// The requested object key
        key: String,
    },

    /// The backend did not answer within the configured timeout
    #[error("backend timed out after {after:?}")]
    Timeout {
        /// The timeout that elapsed
        after: Duration,
    },

    /// The circuit is open; the backend was not contacted
    #[error("circuit open for command '{command}'")]
    CircuitOpen {
        /// The guarded command name
        command: String,
    },

    /// The caller abandoned the request before it completed
    #[error("request cancelled by caller")]
    Cancelled,

    /// Any other backend failure
    #[error("backend error: {0}")]
    Unknown(String),
}

impl BackendError {
    /// Whether this outcome counts toward the circuit breaker's failure
    /// ratio.
    ///
    /// A missing object proves the backend answered, and a cancelled
    /// request says nothing about backend health; neither is a failure.
    /// Circuit-open rejections never reach the rolling window at all.
    #[must_use]
    pub fn counts_as_failure(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Unknown(_) => true,
            Self::NotFound { .. } | Self::CircuitOpen { .. } | Self::Cancelled => false,
        }
    }

    /// Short stable name for metric paths and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Timeout { .. } => "timeout",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Cancelled => "cancelled",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Errors from building or validating a gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required field is missing or empty
    #[error("missing required option: {0}")]
    MissingField(&'static str),

    /// A field holds an out-of-range value
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// The offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}
