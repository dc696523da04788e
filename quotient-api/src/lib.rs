//! Quotient API - HTTP surface
//!
//! Axum-facing pieces of the caching and rate-limiting layer: the rate-limit
//! middleware with its header/429 contract, and the structured API error
//! type route handlers return when an upstream fetch fails.
//!
//! The route handlers themselves live in the consuming application; this
//! crate only provides the contract at that boundary.

pub mod config;
pub mod error;
pub mod middleware;

pub use config::ApiConfig;
pub use error::{ApiError, ErrorCode};
pub use middleware::{rate_limit_middleware, ClientId, RateLimitExceeded, RateLimitState};
