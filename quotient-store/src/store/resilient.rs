//! Resilient store facade.
//!
//! Wraps the distributed backend with automatic fallback to the in-process
//! store. The facade is an explicit object constructed once at startup and
//! injected into the orchestrator and rate limiter - its health state lives
//! here, not in module-level globals, so fallback behavior is testable with
//! a pre-broken backend.
//!
//! # Degradation contract
//!
//! - A failed distributed call flips `healthy` to false and is retried
//!   against the local store within the same invocation. The distributed
//!   error is never surfaced to the caller.
//! - While unhealthy, at most one operation per `reconnect_interval` is
//!   routed to the distributed backend as a probe; everything else goes
//!   local. The caller is never blocked on a reconnect loop.
//! - A `None` distributed side means permanent local-only mode. That is a
//!   supported configuration, not a degraded one.

use async_trait::async_trait;
use quotient_core::{QuotientConfig, QuotientError, QuotientResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::memory::MemoryStore;
use super::redis_backend::RedisStore;
use super::traits::{Store, WindowCounter};

/// Operation counters for observing degradation without log-diving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Operations served by the distributed backend.
    pub distributed_ops: u64,
    /// Operations served by the local fallback.
    pub local_ops: u64,
    /// Healthy-to-unhealthy transitions.
    pub failovers: u64,
}

#[derive(Debug, Default)]
struct StatsInner {
    distributed_ops: AtomicU64,
    local_ops: AtomicU64,
    failovers: AtomicU64,
}

/// Store facade routing between a distributed backend and a local fallback.
pub struct ResilientStore<D: Store = RedisStore> {
    distributed: Option<D>,
    local: MemoryStore,
    healthy: AtomicBool,
    last_probe: Mutex<Option<Instant>>,
    reconnect_interval: Duration,
    stats: StatsInner,
}

impl<D: Store> ResilientStore<D> {
    /// Create a facade. `None` for the distributed side means local-only
    /// mode permanently.
    pub fn new(distributed: Option<D>, reconnect_interval: Duration) -> Self {
        Self {
            distributed,
            local: MemoryStore::new(),
            healthy: AtomicBool::new(true),
            last_probe: Mutex::new(None),
            reconnect_interval,
            stats: StatsInner::default(),
        }
    }

    /// Whether the distributed backend is present and currently healthy.
    pub fn is_healthy(&self) -> bool {
        self.distributed.is_some() && self.healthy.load(Ordering::Relaxed)
    }

    /// Snapshot the operation counters.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            distributed_ops: self.stats.distributed_ops.load(Ordering::Relaxed),
            local_ops: self.stats.local_ops.load(Ordering::Relaxed),
            failovers: self.stats.failovers.load(Ordering::Relaxed),
        }
    }

    /// Decide whether this operation should be routed to the distributed
    /// backend.
    ///
    /// Healthy: always. Unhealthy: only if a probe is due; the operation
    /// itself doubles as the reconnect probe, so there is no separate retry
    /// loop anywhere.
    fn distributed_side(&self) -> Option<&D> {
        let distributed = self.distributed.as_ref()?;
        if self.healthy.load(Ordering::Relaxed) {
            return Some(distributed);
        }

        let mut last_probe = self
            .last_probe
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if last_probe.map_or(true, |at| at.elapsed() >= self.reconnect_interval) {
            *last_probe = Some(Instant::now());
            Some(distributed)
        } else {
            None
        }
    }

    fn mark_distributed_ok(&self) {
        self.stats.distributed_ops.fetch_add(1, Ordering::Relaxed);
        if !self.healthy.swap(true, Ordering::Relaxed) {
            tracing::info!("distributed store recovered");
        }
    }

    fn mark_distributed_failed(&self, op: &str, error: &QuotientError) {
        if self.healthy.swap(false, Ordering::Relaxed) {
            self.stats.failovers.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(%op, %error, "distributed store failed, degrading to local store");
        } else {
            tracing::debug!(%op, %error, "distributed store still unavailable");
        }
        let mut last_probe = self
            .last_probe
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last_probe = Some(Instant::now());
    }

    fn count_local(&self) {
        self.stats.local_ops.fetch_add(1, Ordering::Relaxed);
    }
}

impl ResilientStore<RedisStore> {
    /// Build the facade from configuration.
    ///
    /// An invalid URL is a configuration error and surfaces here; an absent
    /// URL selects local-only mode.
    pub fn from_config(config: &QuotientConfig) -> QuotientResult<Self> {
        let distributed = match &config.redis_url {
            Some(url) => Some(RedisStore::new(url)?),
            None => None,
        };
        Ok(Self::new(distributed, config.reconnect_interval))
    }
}

#[async_trait]
impl<D: Store> Store for ResilientStore<D> {
    async fn get(&self, key: &str) -> QuotientResult<Option<Vec<u8>>> {
        if let Some(distributed) = self.distributed_side() {
            match distributed.get(key).await {
                Ok(value) => {
                    self.mark_distributed_ok();
                    return Ok(value);
                }
                Err(error) => self.mark_distributed_failed("get", &error),
            }
        }
        self.count_local();
        self.local.get(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> QuotientResult<()> {
        if let Some(distributed) = self.distributed_side() {
            match distributed.set_with_ttl(key, value, ttl).await {
                Ok(()) => {
                    self.mark_distributed_ok();
                    return Ok(());
                }
                Err(error) => self.mark_distributed_failed("set_with_ttl", &error),
            }
        }
        self.count_local();
        self.local.set_with_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> QuotientResult<()> {
        if let Some(distributed) = self.distributed_side() {
            match distributed.delete(key).await {
                Ok(()) => {
                    self.mark_distributed_ok();
                    // Also clear the local copy so a later fallback read
                    // cannot resurrect the deleted entry.
                    self.local.delete(key).await?;
                    return Ok(());
                }
                Err(error) => self.mark_distributed_failed("delete", &error),
            }
        }
        self.count_local();
        self.local.delete(key).await
    }

    async fn delete_prefix(&self, prefix: &str) -> QuotientResult<u64> {
        if let Some(distributed) = self.distributed_side() {
            match distributed.delete_prefix(prefix).await {
                Ok(count) => {
                    self.mark_distributed_ok();
                    self.local.delete_prefix(prefix).await?;
                    return Ok(count);
                }
                Err(error) => self.mark_distributed_failed("delete_prefix", &error),
            }
        }
        self.count_local();
        self.local.delete_prefix(prefix).await
    }

    async fn incr_with_expiry(&self, key: &str, window: Duration) -> QuotientResult<WindowCounter> {
        if let Some(distributed) = self.distributed_side() {
            match distributed.incr_with_expiry(key, window).await {
                Ok(counter) => {
                    self.mark_distributed_ok();
                    return Ok(counter);
                }
                Err(error) => self.mark_distributed_failed("incr_with_expiry", &error),
            }
        }
        self.count_local();
        self.local.incr_with_expiry(key, window).await
    }
}
