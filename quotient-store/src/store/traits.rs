//! Store backend trait.
//!
//! Abstracts over the distributed backend and the in-process fallback so the
//! cache orchestrator and rate limiter stay backend-agnostic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quotient_core::QuotientResult;
use std::sync::Arc;
use std::time::Duration;

/// Result of an atomic window increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounter {
    /// The counter value after this increment.
    pub count: u64,
    /// When the current window ends and the counter resets.
    pub reset_at: DateTime<Utc>,
}

/// Key/value backend abstraction.
///
/// Implemented identically by [`RedisStore`](super::RedisStore) and
/// [`MemoryStore`](super::MemoryStore); the
/// [`ResilientStore`](super::ResilientStore) facade implements it too, by
/// routing between them.
///
/// # Atomicity
///
/// `incr_with_expiry` MUST be a single atomic operation against the backend.
/// Concurrent callers may never observe a lost increment, or rate-limit
/// checks will under-count. No read-modify-write round trip from the
/// application side is permitted.
#[async_trait]
pub trait Store: Send + Sync {
    /// Get a value, or `None` if absent or expired.
    async fn get(&self, key: &str) -> QuotientResult<Option<Vec<u8>>>;

    /// Set a value with a time-to-live after which the backend evicts it.
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> QuotientResult<()>;

    /// Delete a single key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> QuotientResult<()>;

    /// Delete every key under a prefix, returning how many were removed.
    ///
    /// Used for bulk invalidation, e.g. "all entries for this client".
    async fn delete_prefix(&self, prefix: &str) -> QuotientResult<u64>;

    /// Atomically increment a fixed-window counter.
    ///
    /// The first increment of a window starts it and sets its expiry to
    /// `window`; later increments within the window never extend it.
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> QuotientResult<WindowCounter>;
}

/// Shared, dynamically-dispatched store handle.
///
/// The orchestrator and rate limiter hold one of these so callers can wire in
/// any backend (usually the resilient facade, a bare [`MemoryStore`](super::MemoryStore)
/// in tests).
pub type DynStore = Arc<dyn Store>;

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn get(&self, key: &str) -> QuotientResult<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> QuotientResult<()> {
        (**self).set_with_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> QuotientResult<()> {
        (**self).delete(key).await
    }

    async fn delete_prefix(&self, prefix: &str) -> QuotientResult<u64> {
        (**self).delete_prefix(prefix).await
    }

    async fn incr_with_expiry(&self, key: &str, window: Duration) -> QuotientResult<WindowCounter> {
        (**self).incr_with_expiry(key, window).await
    }
}
