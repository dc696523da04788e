//! Rate limiting middleware.
//!
//! Enforces per-client quotas in front of the route layer:
//! - authenticated requests are keyed by the client identifier a previous
//!   middleware put into the request extensions ([`ClientId`])
//! - unauthenticated requests fall back to the client IP, taken from proxy
//!   headers first and the socket address last
//!
//! Allowed responses carry `X-RateLimit-Limit`, `X-RateLimit-Remaining` and
//! `X-RateLimit-Reset` (epoch seconds); denials are HTTP 429 with a JSON
//! body `{ error, retryAfterSeconds }` and a `Retry-After` header.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use quotient_store::{RateDecision, RateLimiter, RateLimitKey};

use crate::config::ApiConfig;
use crate::error::ErrorCode;

/// Client identifier for rate limiting, inserted into request extensions by
/// the authentication layer.
#[derive(Debug, Clone)]
pub struct ClientId(pub String);

/// State for rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitState {
    limiter: RateLimiter,
    config: Arc<ApiConfig>,
}

impl RateLimitState {
    /// Create new rate limit state.
    pub fn new(limiter: RateLimiter, config: Arc<ApiConfig>) -> Self {
        Self { limiter, config }
    }
}

/// Error type for rate limit middleware: the denied decision.
pub struct RateLimitExceeded {
    /// The decision that denied the request.
    pub decision: RateDecision,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitBody {
    error: String,
    retry_after_seconds: u64,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let retry_after = self.decision.retry_after_secs();
        let body = RateLimitBody {
            error: ErrorCode::TooManyRequests.default_message().to_string(),
            retry_after_seconds: retry_after,
        };

        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        let headers = response.headers_mut();
        apply_rate_limit_headers(headers, &self.decision);
        headers.insert(
            header::RETRY_AFTER,
            HeaderValue::from_str(&retry_after.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("60")),
        );
        response
    }
}

/// Rate limiting middleware.
///
/// Apply before authentication-dependent layers run on the response path but
/// after the auth layer that provides [`ClientId`] on the request path, so
/// authenticated traffic is keyed by identity rather than IP.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitExceeded> {
    if !state.config.rate_limit_enabled {
        return Ok(next.run(request).await);
    }

    let quota = state.config.quota_for_path(request.uri().path());

    let key = match limit_key(&request, connect_info.map(|ConnectInfo(addr)| addr)) {
        Some(key) => key,
        None => {
            // Nothing to key on at all; protective layer, so let it through.
            tracing::debug!("request has no client identity or address, skipping rate limit");
            return Ok(next.run(request).await);
        }
    };

    let decision = state.limiter.check(&key, quota).await;
    if decision.allowed {
        let mut response = next.run(request).await;
        apply_rate_limit_headers(response.headers_mut(), &decision);
        Ok(response)
    } else {
        Err(RateLimitExceeded { decision })
    }
}

/// Pick the rate-limit key: client identifier first, IP as the
/// unauthenticated fallback.
fn limit_key(request: &Request, socket_addr: Option<SocketAddr>) -> Option<RateLimitKey> {
    if let Some(ClientId(id)) = request.extensions().get::<ClientId>() {
        return Some(RateLimitKey::Client(id.clone()));
    }
    extract_client_ip(request, socket_addr).map(RateLimitKey::Ip)
}

/// Extract client IP from request, considering proxy headers.
fn extract_client_ip(request: &Request, fallback: Option<SocketAddr>) -> Option<IpAddr> {
    // X-Forwarded-For can contain multiple IPs, take the first one
    if let Some(forwarded_for) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
    {
        if let Some(first_ip) = forwarded_for.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse() {
                return Some(ip);
            }
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
    {
        if let Ok(ip) = real_ip.trim().parse() {
            return Some(ip);
        }
    }

    fallback.map(|addr| addr.ip())
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    let set = |headers: &mut HeaderMap, name: &'static str, value: String| {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("0")),
        );
    };
    set(headers, "x-ratelimit-limit", decision.limit.to_string());
    set(headers, "x-ratelimit-remaining", decision.remaining.to_string());
    set(headers, "x-ratelimit-reset", decision.reset_at.timestamp().to_string());
}

// ============================================================================
// TESTS
// ============================================================================
