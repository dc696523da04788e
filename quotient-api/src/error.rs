//! Error Types for the Quotient API surface
//!
//! This module defines error handling for the HTTP-facing layer:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.
//! The guiding rule from the core layer carries through here: an end user
//! sees either correct data (possibly a few seconds stale) or a clear
//! upstream error - never a silent wrong answer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use quotient_core::{FetchError, QuotientError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code and represents
/// a category of error that this layer can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request contains invalid input data
    InvalidInput,

    /// Client exceeded its request quota
    TooManyRequests,

    /// The wrapped upstream API returned a failure
    UpstreamFailed,

    /// The wrapped upstream API did not answer in time
    UpstreamTimeout,

    /// A backing service is unavailable
    ServiceUnavailable,

    /// Unexpected internal error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::UpstreamFailed => StatusCode::BAD_GATEWAY,
            ErrorCode::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the default human-readable message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input",
            ErrorCode::TooManyRequests => "Rate limit exceeded",
            ErrorCode::UpstreamFailed => "Upstream request failed",
            ErrorCode::UpstreamTimeout => "Upstream request timed out",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::TooManyRequests => "TOO_MANY_REQUESTS",
            ErrorCode::UpstreamFailed => "UPSTREAM_FAILED",
            ErrorCode::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(name)
    }
}

// ============================================================================
// API ERROR
// ============================================================================

/// Structured error response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create a TooManyRequests error.
    pub fn too_many_requests(retry_after_secs: Option<u64>) -> Self {
        let message = match retry_after_secs {
            Some(secs) => format!("Rate limit exceeded. Retry after {} seconds", secs),
            None => "Rate limit exceeded".to_string(),
        };
        Self::new(ErrorCode::TooManyRequests, message)
    }

    /// Create an InternalError.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Map core-layer failures onto the HTTP surface.
///
/// Only business-level failures should ever reach this conversion:
/// store-level problems are absorbed inside the resilient facade and
/// degrade service quality instead of erroring.
impl From<QuotientError> for ApiError {
    fn from(err: QuotientError) -> Self {
        match err {
            QuotientError::Fetch(FetchError::TimedOut { elapsed }) => Self::new(
                ErrorCode::UpstreamTimeout,
                format!("Upstream request timed out after {:?}", elapsed),
            ),
            QuotientError::Fetch(fetch) => {
                Self::new(ErrorCode::UpstreamFailed, fetch.to_string())
            }
            QuotientError::Store(store) => {
                tracing::error!(error = %store, "store error surfaced to API layer");
                Self::from_code(ErrorCode::ServiceUnavailable)
            }
            QuotientError::Codec(codec) => {
                tracing::error!(error = %codec, "codec error surfaced to API layer");
                Self::from_code(ErrorCode::InternalError)
            }
            QuotientError::Config(config) => Self::invalid_input(config.to_string()),
        }
    }
}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Implement IntoResponse for ApiError to enable automatic error handling in
/// Axum, so handlers can return `Result<Json<T>, ApiError>` directly.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}
