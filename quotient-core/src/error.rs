//! Error types for Quotient operations

use std::time::Duration;
use thiserror::Error;

/// Store backend errors.
///
/// These cover the "backend unavailable" failure class: the resilient facade
/// absorbs every variant and degrades to the local store, so callers above
/// the facade never observe them directly.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Backend connection failed: {reason}")]
    Connection { reason: String },

    #[error("Backend command failed: {reason}")]
    Command { reason: String },

    #[error("Backend script failed: {reason}")]
    Script { reason: String },

    #[error("No backend available")]
    Unavailable,
}

impl StoreError {
    /// Build a connection error from any displayable cause.
    pub fn connection(reason: impl std::fmt::Display) -> Self {
        Self::Connection {
            reason: reason.to_string(),
        }
    }

    /// Build a command error from any displayable cause.
    pub fn command(reason: impl std::fmt::Display) -> Self {
        Self::Command {
            reason: reason.to_string(),
        }
    }
}

/// Upstream fetch errors.
///
/// These are business-level failures of the wrapped fetch function. They are
/// surfaced to miss-path callers (every caller joined on the same in-flight
/// fetch receives a clone of the same failure) and swallowed on stale-path
/// background refreshes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Upstream request failed with status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Upstream fetch timed out after {elapsed:?}")]
    TimedOut { elapsed: Duration },

    #[error("Upstream fetch failed: {reason}")]
    Other { reason: String },
}

impl FetchError {
    /// Build an opaque fetch error from any displayable cause.
    pub fn other(reason: impl std::fmt::Display) -> Self {
        Self::Other {
            reason: reason.to_string(),
        }
    }
}

/// Cache entry encode/decode errors.
///
/// A decode failure is never surfaced as an error: the orchestrator treats
/// the entry as a miss, deletes it, and refetches.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Failed to encode cache entry: {reason}")]
    Encode { reason: String },

    #[error("Failed to decode cache entry: {reason}")]
    Decode { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Quotient errors.
#[derive(Debug, Clone, Error)]
pub enum QuotientError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Quotient operations.
pub type QuotientResult<T> = Result<T, QuotientError>;

// =============================================================================
// TESTS
// =============================================================================
