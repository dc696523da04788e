//! Middleware modules for the Quotient API surface
//!
//! # Middleware Order
//!
//! When applying middleware, order matters. The recommended order is:
//!
//! ```ignore
//! Router::new()
//!     .route("/api/v1/resource", get(handler))
//!     // Auth runs first on the request path so rate limiting can key by
//!     // client identity instead of IP (it inserts `ClientId`).
//!     .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
//!     .layer(middleware::from_fn_with_state(rate_limit_state, rate_limit_middleware))
//! ```

pub mod rate_limit;

pub use rate_limit::{
    rate_limit_middleware, ClientId, RateLimitExceeded, RateLimitState,
};
