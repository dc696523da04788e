//! Fixed-window rate limiting over the shared store.
//!
//! A deliberate tradeoff: fixed windows let a client burst up to twice the
//! limit across a window boundary, in exchange for a single atomic increment
//! per check. Callers that need smoother limiting should use a smaller
//! window.
//!
//! Rate limiting is a protective layer, not a correctness-critical one, so
//! every failure mode degrades toward allowing traffic: store errors and
//! invalid inputs fail open rather than blocking legitimate requests.

use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::time::Duration;

use quotient_core::RateQuota;

use crate::key::{CacheKey, KeyCodec};
use crate::store::DynStore;

/// Who is being limited.
///
/// Identifier-based limiting is primary; IP keying is strictly the fallback
/// for unauthenticated traffic, where no identifier exists.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum RateLimitKey {
    /// Authenticated request, keyed by client identifier.
    Client(String),
    /// Unauthenticated request, keyed by source IP.
    Ip(IpAddr),
}

impl RateLimitKey {
    fn is_valid(&self) -> bool {
        match self {
            Self::Client(id) => !id.trim().is_empty(),
            Self::Ip(_) => true,
        }
    }
}

/// The answer to one rate-limit check.
///
/// Field for field, this is what the HTTP layer needs for the
/// `X-RateLimit-*` headers and a 429 body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// The configured limit for this window.
    pub limit: u32,
    /// Requests left in the current window.
    pub remaining: u32,
    /// When the current window resets.
    pub reset_at: DateTime<Utc>,
}

impl RateDecision {
    /// Seconds until the window resets, for `Retry-After`. At least 1.
    pub fn retry_after_secs(&self) -> u64 {
        self.reset_at
            .signed_duration_since(Utc::now())
            .num_seconds()
            .max(1) as u64
    }
}

/// Fixed-window rate limiter backed by the shared store.
#[derive(Clone)]
pub struct RateLimiter {
    store: DynStore,
    codec: KeyCodec,
}

impl RateLimiter {
    /// Create a limiter with the default counter namespace.
    pub fn new(store: DynStore) -> Self {
        Self::with_codec(store, KeyCodec::new("ratelimit", "v1"))
    }

    /// Create a limiter whose counters live under a custom key codec.
    pub fn with_codec(store: DynStore, codec: KeyCodec) -> Self {
        Self { store, codec }
    }

    /// Check and count one request against the client's window.
    ///
    /// Never returns an error: a store failure or invalid input fails open.
    /// The decision always carries well-formed header values.
    pub async fn check(&self, key: &RateLimitKey, quota: RateQuota) -> RateDecision {
        if quota.limit == 0 || quota.window_secs == 0 || !key.is_valid() {
            tracing::debug!(?key, ?quota, "invalid rate-limit input, failing open");
            return self.open_decision(quota);
        }

        let storage_key = self.storage_key(key);
        match self
            .store
            .incr_with_expiry(storage_key.as_str(), quota.window())
            .await
        {
            Ok(counter) => {
                let allowed = counter.count <= quota.limit as u64;
                let remaining = (quota.limit as u64).saturating_sub(counter.count) as u32;
                if !allowed {
                    tracing::debug!(?key, count = counter.count, limit = quota.limit, "rate limited");
                }
                RateDecision {
                    allowed,
                    limit: quota.limit,
                    remaining,
                    reset_at: counter.reset_at,
                }
            }
            Err(error) => {
                // Availability over strict enforcement: infrastructure
                // failure must not block legitimate traffic.
                tracing::warn!(?key, %error, "rate-limit store unavailable, failing open");
                self.open_decision(quota)
            }
        }
    }

    fn open_decision(&self, quota: RateQuota) -> RateDecision {
        let window = quota.window().max(Duration::from_secs(1));
        RateDecision {
            allowed: true,
            limit: quota.limit,
            remaining: quota.limit,
            reset_at: Utc::now()
                + chrono::Duration::from_std(window)
                    .unwrap_or_else(|_| chrono::Duration::seconds(1)),
        }
    }

    fn storage_key(&self, key: &RateLimitKey) -> CacheKey {
        match key {
            RateLimitKey::Client(id) => self.codec.build(id, &[("kind", "client")]),
            RateLimitKey::Ip(ip) => self.codec.build(&ip.to_string(), &[("kind", "ip")]),
        }
    }
}
