//! Stale-while-revalidate cache orchestrator.
//!
//! The read path for everything cached in front of the upstream API:
//!
//! - fresh entry: returned immediately, no fetch invoked
//! - stale-but-usable entry: returned immediately, one background refresh
//!   spawned if none is running for the key
//! - expired or missing entry: the caller blocks on a fetch, joining an
//!   in-flight one when it exists
//!
//! # Single flight
//!
//! Per key and per process, at most one upstream fetch runs at a time. The
//! in-flight marker is an entry in a concurrent map from key to a shared
//! future; joiners clone the shared handle and all observe the same resolved
//! value or the same failure. The marker is removed by a drop guard in the
//! fetch task, so a panicking fetch can never leave a permanently stuck
//! marker. Deduplication across processes is out of scope - each process may
//! fetch a cold key once.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use quotient_core::{CodecError, FetchError, QuotientResult};

use super::entry::{Cached, EntryState, StoredEntry, TtlPolicy};
use crate::key::CacheKey;
use crate::store::DynStore;

/// Resolved outcome of one in-flight fetch, fanned out to every joiner.
type FlightOutcome = Result<Arc<serde_json::Value>, FetchError>;

/// Cloneable handle onto an in-flight fetch.
type SharedFlight = Shared<BoxFuture<'static, FlightOutcome>>;

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served fresh.
    pub hits: u64,
    /// Reads served stale while a refresh ran.
    pub stale_hits: u64,
    /// Reads that required a blocking fetch.
    pub misses: u64,
    /// Miss-path reads that joined an existing fetch instead of starting one.
    pub joined_flights: u64,
    /// Background refreshes started from stale reads.
    pub background_refreshes: u64,
}

impl CacheStats {
    /// Fraction of reads answered from cache, fresh or stale (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.stale_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct StatsInner {
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    joined_flights: AtomicU64,
    background_refreshes: AtomicU64,
}

/// Removes the in-flight marker when the fetch task ends, however it ends.
struct FlightGuard {
    flights: Arc<DashMap<String, SharedFlight>>,
    key: String,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flights.remove(&self.key);
    }
}

/// Stale-while-revalidate cache over an injected store.
#[derive(Clone)]
pub struct SwrCache {
    store: DynStore,
    flights: Arc<DashMap<String, SharedFlight>>,
    stats: Arc<StatsInner>,
}

impl SwrCache {
    /// Create a cache over the given store (usually the resilient facade).
    pub fn new(store: DynStore) -> Self {
        Self {
            store,
            flights: Arc::new(DashMap::new()),
            stats: Arc::new(StatsInner::default()),
        }
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &DynStore {
        &self.store
    }

    /// Snapshot the usage counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            stale_hits: self.stats.stale_hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            joined_flights: self.stats.joined_flights.load(Ordering::Relaxed),
            background_refreshes: self.stats.background_refreshes.load(Ordering::Relaxed),
        }
    }

    /// Read through the cache, falling back to `fetch_fn` per the
    /// stale-while-revalidate rules.
    ///
    /// `fetch_fn` is only invoked when the cache cannot answer: never on a
    /// fresh hit, at most once (in the background) on a stale hit, and at
    /// most once across all concurrent callers on a miss.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: &CacheKey,
        policy: TtlPolicy,
        fetch_fn: F,
    ) -> QuotientResult<Cached<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        self.fetch_inner(key, policy, None, fetch_fn).await
    }

    /// Like [`SwrCache::fetch`], bounding the upstream call to `timeout`.
    ///
    /// A miss-path timeout surfaces as [`FetchError::TimedOut`] to every
    /// joined caller; a stale-path timeout is swallowed like any other
    /// background refresh failure.
    pub async fn fetch_with_timeout<T, F, Fut>(
        &self,
        key: &CacheKey,
        policy: TtlPolicy,
        timeout: Duration,
        fetch_fn: F,
    ) -> QuotientResult<Cached<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        self.fetch_inner(key, policy, Some(timeout), fetch_fn).await
    }

    /// Drop one entry. The next read for the key is a hard miss.
    pub async fn invalidate(&self, key: &CacheKey) -> QuotientResult<()> {
        self.store.delete(key.as_str()).await
    }

    /// Drop every entry under a prefix (see [`crate::key::KeyCodec`] prefix
    /// helpers), returning how many were removed.
    pub async fn invalidate_prefix(&self, prefix: &str) -> QuotientResult<u64> {
        self.store.delete_prefix(prefix).await
    }

    async fn fetch_inner<T, F, Fut>(
        &self,
        key: &CacheKey,
        policy: TtlPolicy,
        timeout: Option<Duration>,
        fetch_fn: F,
    ) -> QuotientResult<Cached<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        // Store-level failures are infrastructure, not business failures:
        // degrade to a miss rather than surfacing them.
        let raw = match self.store.get(key.as_str()).await {
            Ok(raw) => raw,
            Err(error) => {
                tracing::debug!(key = %key, %error, "cache read failed, treating as miss");
                None
            }
        };

        let mut entry: Option<StoredEntry> = None;
        if let Some(bytes) = raw {
            match StoredEntry::decode(&bytes) {
                Ok(decoded) => entry = Some(decoded),
                Err(error) => {
                    tracing::warn!(key = %key, %error, "undecodable cache entry, evicting");
                    let _ = self.store.delete(key.as_str()).await;
                }
            }
        }

        if let Some(entry) = entry {
            let state = entry.state(Utc::now());
            if state != EntryState::Expired {
                match serde_json::from_value::<T>(entry.payload) {
                    Ok(value) => {
                        if state == EntryState::Fresh {
                            self.stats.hits.fetch_add(1, Ordering::Relaxed);
                            return Ok(Cached::fresh(value));
                        }
                        self.stats.stale_hits.fetch_add(1, Ordering::Relaxed);
                        let (_, joined) =
                            self.join_or_spawn(key, policy, timeout, fetch_fn, true);
                        if !joined {
                            self.stats.background_refreshes.fetch_add(1, Ordering::Relaxed);
                        }
                        return Ok(Cached::stale(value));
                    }
                    Err(error) => {
                        tracing::warn!(
                            key = %key,
                            %error,
                            "cache payload does not deserialize, evicting"
                        );
                        let _ = self.store.delete(key.as_str()).await;
                    }
                }
            }
        }

        // Hard miss: join the in-flight fetch for this key, or start it.
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let (flight, joined) = self.join_or_spawn(key, policy, timeout, fetch_fn, false);
        if joined {
            self.stats.joined_flights.fetch_add(1, Ordering::Relaxed);
        }

        match flight.await {
            Ok(payload) => {
                let value =
                    serde_json::from_value((*payload).clone()).map_err(|e| CodecError::Decode {
                        reason: e.to_string(),
                    })?;
                Ok(Cached::fresh(value))
            }
            Err(fetch_error) => Err(fetch_error.into()),
        }
    }

    /// Get the in-flight fetch for `key`, spawning it if absent.
    ///
    /// Returns the shared handle and whether an existing flight was joined.
    /// `fetch_fn` is invoked only when this call starts the flight.
    fn join_or_spawn<T, F, Fut>(
        &self,
        key: &CacheKey,
        policy: TtlPolicy,
        timeout: Option<Duration>,
        fetch_fn: F,
        background: bool,
    ) -> (SharedFlight, bool)
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        match self.flights.entry(key.as_str().to_string()) {
            Entry::Occupied(occupied) => (occupied.get().clone(), true),
            Entry::Vacant(vacant) => {
                let (tx, rx) = oneshot::channel::<FlightOutcome>();
                let shared: SharedFlight = async move {
                    rx.await
                        .unwrap_or_else(|_| Err(FetchError::other("in-flight fetch task died")))
                }
                .boxed()
                .shared();

                // Insert before spawning: a task that completed before its
                // marker existed would leave a dead entry behind forever.
                vacant.insert(shared.clone());

                let upstream = fetch_fn();
                let upstream: BoxFuture<'static, Result<T, FetchError>> = match timeout {
                    Some(limit) => async move {
                        match tokio::time::timeout(limit, upstream).await {
                            Ok(result) => result,
                            Err(_) => Err(FetchError::TimedOut { elapsed: limit }),
                        }
                    }
                    .boxed(),
                    None => upstream.boxed(),
                };

                let store = Arc::clone(&self.store);
                let guard = FlightGuard {
                    flights: Arc::clone(&self.flights),
                    key: key.as_str().to_string(),
                };
                let key = key.as_str().to_string();

                tokio::spawn(async move {
                    let outcome: FlightOutcome = match upstream.await {
                        Ok(value) => match serde_json::to_value(&value) {
                            Ok(payload) => {
                                let entry = StoredEntry::new(policy, payload);
                                match entry.encode() {
                                    Ok(bytes) => {
                                        if let Err(error) =
                                            store.set_with_ttl(&key, &bytes, policy.stale()).await
                                        {
                                            tracing::warn!(
                                                key = %key,
                                                %error,
                                                "failed to write cache entry"
                                            );
                                        }
                                    }
                                    Err(error) => {
                                        tracing::warn!(
                                            key = %key,
                                            %error,
                                            "failed to encode cache entry"
                                        );
                                    }
                                }
                                Ok(Arc::new(entry.payload))
                            }
                            Err(error) => Err(FetchError::other(format!(
                                "fetched value does not serialize: {error}"
                            ))),
                        },
                        Err(error) => {
                            if background {
                                tracing::warn!(
                                    key = %key,
                                    %error,
                                    "background refresh failed, keeping stale entry"
                                );
                            } else {
                                tracing::debug!(key = %key, %error, "upstream fetch failed");
                            }
                            Err(error)
                        }
                    };

                    // Clear the marker before publishing, so a caller that
                    // sees the outcome can never join this finished flight.
                    drop(guard);
                    let _ = tx.send(outcome);
                });

                (shared, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyCodec;
    use crate::store::MemoryStore;
    use quotient_core::QuotientError;
    use std::sync::atomic::AtomicUsize;

    fn cache() -> SwrCache {
        SwrCache::new(Arc::new(MemoryStore::new()))
    }

    fn codec() -> KeyCodec {
        KeyCodec::new("ads", "v1")
    }

    fn policy(fresh_ms: u64, stale_ms: u64) -> TtlPolicy {
        TtlPolicy::new(
            Duration::from_millis(fresh_ms),
            Duration::from_millis(stale_ms),
        )
    }

    /// Fetch function that counts invocations and returns a fixed value.
    fn counting_fetch(
        counter: &Arc<AtomicUsize>,
        value: &str,
    ) -> impl FnOnce() -> futures_util::future::BoxFuture<'static, Result<String, FetchError>> {
        let counter = counter.clone();
        let value = value.to_string();
        move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_cold_miss_then_fresh_hit() {
        let cache = cache();
        let key = codec().build("c1", &[("report", "spend")]);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .fetch::<String, _, _>(&key, policy(60_000, 600_000), counting_fetch(&calls, "v1"))
            .await
            .unwrap();
        assert!(!first.is_stale());
        assert_eq!(first.value(), "v1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Fresh hit: no fetch invoked.
        let second = cache
            .fetch::<String, _, _>(&key, policy(60_000, 600_000), counting_fetch(&calls, "v2"))
            .await
            .unwrap();
        assert!(!second.is_stale());
        assert_eq!(second.value(), "v1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_flight_on_cold_key() {
        let cache = cache();
        let key = codec().build("c1", &[]);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            let key = key.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .fetch::<String, _, _>(&key, policy(60_000, 600_000), move || {
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            // Slow enough that every caller overlaps.
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok("shared".to_string())
                        }
                        .boxed()
                    })
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            let read = handle.await.unwrap();
            assert_eq!(read.value(), "shared");
            assert!(!read.is_stale());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A straggler scheduled after the flight landed reads a fresh hit
        // instead of joining, so count both shapes.
        let stats = cache.stats();
        assert_eq!(stats.misses + stats.hits, 10);
        assert_eq!(stats.joined_flights, stats.misses - 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stale_hit_triggers_one_refresh() {
        let cache = cache();
        let key = codec().build("c1", &[]);
        let seed_calls = Arc::new(AtomicUsize::new(0));
        let refresh_calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch::<String, _, _>(&key, policy(40, 60_000), counting_fetch(&seed_calls, "old"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        // Entry is now stale-but-usable. Every concurrent observer gets the
        // old value immediately; exactly one refresh runs behind them.
        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = cache.clone();
            let key = key.clone();
            let refresh_calls = refresh_calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .fetch::<String, _, _>(&key, policy(40, 60_000), move || {
                        async move {
                            refresh_calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            Ok("new".to_string())
                        }
                        .boxed()
                    })
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            let read = handle.await.unwrap();
            assert!(read.is_stale());
            assert_eq!(read.value(), "old");
        }

        // Let the background refresh finish and land.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(refresh_calls.load(Ordering::SeqCst), 1);

        let read = cache
            .fetch::<String, _, _>(&key, policy(40, 60_000), counting_fetch(&seed_calls, "x"))
            .await
            .unwrap();
        assert!(!read.is_stale());
        assert_eq!(read.value(), "new");
    }

    #[tokio::test]
    async fn test_freshness_is_monotone_over_time() {
        let cache = cache();
        let key = codec().build("c1", &[]);
        let calls = Arc::new(AtomicUsize::new(0));
        let ttl = policy(80, 250);

        // Fresh right after the fetch.
        let read = cache
            .fetch::<String, _, _>(&key, ttl, counting_fetch(&calls, "v"))
            .await
            .unwrap();
        assert!(!read.is_stale());

        // Past the fresh bound: same value, flagged stale.
        tokio::time::sleep(Duration::from_millis(130)).await;
        let read = cache
            .fetch::<String, _, _>(&key, ttl, || {
                async move { Err::<String, _>(FetchError::other("refresh down")) }.boxed()
            })
            .await
            .unwrap();
        assert!(read.is_stale());
        assert_eq!(read.value(), "v");

        // Past the stale bound: hard miss, blocking fetch.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let read = cache
            .fetch::<String, _, _>(&key, ttl, counting_fetch(&calls, "v2"))
            .await
            .unwrap();
        assert!(!read.is_stale());
        assert_eq!(read.value(), "v2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_hard_miss() {
        let cache = cache();
        let key = codec().build("c1", &[]);
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch::<String, _, _>(&key, policy(20, 50), counting_fetch(&calls, "old"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let read = cache
            .fetch::<String, _, _>(&key, policy(20, 50), counting_fetch(&calls, "new"))
            .await
            .unwrap();
        assert!(!read.is_stale());
        assert_eq!(read.value(), "new");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_miss_failure_propagates_and_is_not_cached() {
        let cache = cache();
        let key = codec().build("c1", &[]);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = cache.clone();
            let key = key.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .fetch::<String, _, _>(&key, policy(60_000, 600_000), move || {
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Err::<String, _>(FetchError::Upstream {
                                status: 503,
                                message: "quota exhausted".to_string(),
                            })
                        }
                        .boxed()
                    })
                    .await
            }));
        }

        // Every joined caller sees the same upstream failure.
        for handle in handles {
            let result = handle.await.unwrap();
            match result {
                Err(QuotientError::Fetch(FetchError::Upstream { status, .. })) => {
                    assert_eq!(status, 503)
                }
                other => panic!("expected upstream failure, got {:?}", other.map(|_| ())),
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // No negative caching: the next call retries the upstream.
        let read = cache
            .fetch::<String, _, _>(&key, policy(60_000, 600_000), counting_fetch(&calls, "ok"))
            .await
            .unwrap();
        assert_eq!(read.value(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stale_refresh_failure_keeps_stale_entry() {
        let cache = cache();
        let key = codec().build("c1", &[]);
        let seed_calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch::<String, _, _>(&key, policy(30, 60_000), counting_fetch(&seed_calls, "old"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let read = cache
            .fetch::<String, _, _>(&key, policy(30, 60_000), || {
                async move {
                    Err::<String, _>(FetchError::other("upstream down"))
                }
                .boxed()
            })
            .await
            .unwrap();
        assert!(read.is_stale());
        assert_eq!(read.value(), "old");

        // The failed refresh did not evict the entry; it is still served
        // stale until its stale bound passes.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let read = cache
            .fetch::<String, _, _>(&key, policy(30, 60_000), || {
                async move {
                    Err::<String, _>(FetchError::other("upstream still down"))
                }
                .boxed()
            })
            .await
            .unwrap();
        assert!(read.is_stale());
        assert_eq!(read.value(), "old");
    }

    #[tokio::test]
    async fn test_timeout_surfaces_and_clears_marker() {
        let cache = cache();
        let key = codec().build("c1", &[]);
        let calls = Arc::new(AtomicUsize::new(0));

        let result = cache
            .fetch_with_timeout::<String, _, _>(
                &key,
                policy(60_000, 600_000),
                Duration::from_millis(30),
                || {
                    async move {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        Ok("too late".to_string())
                    }
                    .boxed()
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(QuotientError::Fetch(FetchError::TimedOut { .. }))
        ));

        // The marker was cleared; a healthy fetch goes straight through.
        let read = cache
            .fetch::<String, _, _>(&key, policy(60_000, 600_000), counting_fetch(&calls, "ok"))
            .await
            .unwrap();
        assert_eq!(read.value(), "ok");
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_evicted_and_refetched() {
        let store: DynStore = Arc::new(MemoryStore::new());
        let cache = SwrCache::new(store.clone());
        let key = codec().build("c1", &[]);
        let calls = Arc::new(AtomicUsize::new(0));

        store
            .set_with_ttl(key.as_str(), b"not json", Duration::from_secs(60))
            .await
            .unwrap();

        let read = cache
            .fetch::<String, _, _>(&key, policy(60_000, 600_000), counting_fetch(&calls, "ok"))
            .await
            .unwrap();
        assert_eq!(read.value(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_payload_type_mismatch_is_evicted_and_refetched() {
        let cache = cache();
        let key = codec().build("c1", &[]);
        let calls = Arc::new(AtomicUsize::new(0));

        // Seed with a string payload, then read it as a number.
        cache
            .fetch::<String, _, _>(&key, policy(60_000, 600_000), counting_fetch(&calls, "text"))
            .await
            .unwrap();

        let read = cache
            .fetch::<u64, _, _>(&key, policy(60_000, 600_000), || {
                async move { Ok(7u64) }.boxed()
            })
            .await
            .unwrap();
        assert_eq!(*read.value(), 7);
    }

    #[tokio::test]
    async fn test_prefix_invalidation_forces_hard_miss() {
        let cache = cache();
        let codec = codec();
        let key_a = codec.build("client42", &[("report", "spend")]);
        let key_b = codec.build("client42", &[("report", "clicks")]);
        let key_other = codec.build("client7", &[("report", "spend")]);
        let calls = Arc::new(AtomicUsize::new(0));

        for key in [&key_a, &key_b, &key_other] {
            cache
                .fetch::<String, _, _>(key, policy(60_000, 600_000), counting_fetch(&calls, "v"))
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let removed = cache
            .invalidate_prefix(&codec.client_prefix("client42"))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        // Both of client42's keys are hard misses now; client7 is untouched.
        for key in [&key_a, &key_b] {
            cache
                .fetch::<String, _, _>(key, policy(60_000, 600_000), counting_fetch(&calls, "v"))
                .await
                .unwrap();
        }
        cache
            .fetch::<String, _, _>(&key_other, policy(60_000, 600_000), counting_fetch(&calls, "v"))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_miss() {
        use crate::store::{Store, WindowCounter};
        use async_trait::async_trait;
        use quotient_core::StoreError;

        /// A store that is down entirely.
        struct DeadStore;

        #[async_trait]
        impl Store for DeadStore {
            async fn get(&self, _key: &str) -> QuotientResult<Option<Vec<u8>>> {
                Err(StoreError::Unavailable.into())
            }
            async fn set_with_ttl(
                &self,
                _key: &str,
                _value: &[u8],
                _ttl: Duration,
            ) -> QuotientResult<()> {
                Err(StoreError::Unavailable.into())
            }
            async fn delete(&self, _key: &str) -> QuotientResult<()> {
                Err(StoreError::Unavailable.into())
            }
            async fn delete_prefix(&self, _prefix: &str) -> QuotientResult<u64> {
                Err(StoreError::Unavailable.into())
            }
            async fn incr_with_expiry(
                &self,
                _key: &str,
                _window: Duration,
            ) -> QuotientResult<WindowCounter> {
                Err(StoreError::Unavailable.into())
            }
        }

        let cache = SwrCache::new(Arc::new(DeadStore));
        let key = codec().build("c1", &[]);
        let calls = Arc::new(AtomicUsize::new(0));

        // The caller still gets an answer: store failures degrade to a
        // fetch, never to an error.
        let read = cache
            .fetch::<String, _, _>(&key, policy(60_000, 600_000), counting_fetch(&calls, "ok"))
            .await
            .unwrap();
        assert_eq!(read.value(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
