//! End-to-end degradation behavior.
//!
//! The properties under test: killing the distributed backend mid-run must
//! not make a single `fetch` or `check` call fail - the cache keeps
//! answering from the local store, and the rate limiter keeps counting
//! locally (or fails open). Callers never see a backend error.

use async_trait::async_trait;
use futures_util::FutureExt;
use quotient_core::{FetchError, QuotientResult, RateQuota, StoreError};
use quotient_store::{
    DynStore, KeyCodec, MemoryStore, RateLimiter, RateLimitKey, ResilientStore, Store, SwrCache,
    TtlPolicy, WindowCounter,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Distributed backend whose outage can be toggled mid-run.
struct FlakyBackend {
    inner: MemoryStore,
    down: Arc<AtomicBool>,
}

impl FlakyBackend {
    fn new(down: Arc<AtomicBool>) -> Self {
        Self {
            inner: MemoryStore::new(),
            down,
        }
    }

    fn check(&self) -> QuotientResult<()> {
        if self.down.load(Ordering::Relaxed) {
            Err(StoreError::connection("connection reset by peer").into())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FlakyBackend {
    async fn get(&self, key: &str) -> QuotientResult<Option<Vec<u8>>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> QuotientResult<()> {
        self.check()?;
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> QuotientResult<()> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn delete_prefix(&self, prefix: &str) -> QuotientResult<u64> {
        self.check()?;
        self.inner.delete_prefix(prefix).await
    }

    async fn incr_with_expiry(&self, key: &str, window: Duration) -> QuotientResult<WindowCounter> {
        self.check()?;
        self.inner.incr_with_expiry(key, window).await
    }
}

fn fetch_fn(
    calls: &Arc<AtomicUsize>,
    value: &str,
) -> impl FnOnce() -> futures_util::future::BoxFuture<'static, Result<String, FetchError>> {
    let calls = calls.clone();
    let value = value.to_string();
    move || {
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        }
        .boxed()
    }
}

#[tokio::test]
async fn backend_outage_is_invisible_to_cache_callers() {
    let down = Arc::new(AtomicBool::new(false));
    let facade = ResilientStore::new(
        Some(FlakyBackend::new(down.clone())),
        Duration::from_secs(60),
    );
    let store: DynStore = Arc::new(facade);
    let cache = SwrCache::new(store);

    let codec = KeyCodec::new("ads", "v1");
    let ttl = TtlPolicy::new(Duration::from_secs(60), Duration::from_secs(600));
    let calls = Arc::new(AtomicUsize::new(0));

    // Healthy: first read populates the shared backend.
    let key = codec.build("client42", &[("report", "spend")]);
    let read = cache
        .fetch::<String, _, _>(&key, ttl, fetch_fn(&calls, "spend-report"))
        .await
        .expect("fetch succeeds while healthy");
    assert_eq!(read.value(), "spend-report");

    // Backend dies. Reads keep working; the cache re-fetches into the
    // local store since the shared copy is unreachable.
    down.store(true, Ordering::Relaxed);
    let read = cache
        .fetch::<String, _, _>(&key, ttl, fetch_fn(&calls, "spend-report"))
        .await
        .expect("fetch succeeds during outage");
    assert_eq!(read.value(), "spend-report");

    // And from here on it is a plain local cache hit, no upstream calls.
    let before = calls.load(Ordering::SeqCst);
    let read = cache
        .fetch::<String, _, _>(&key, ttl, fetch_fn(&calls, "unused"))
        .await
        .expect("fetch succeeds from local store");
    assert_eq!(read.value(), "spend-report");
    assert!(!read.is_stale());
    assert_eq!(calls.load(Ordering::SeqCst), before);
}

#[tokio::test]
async fn backend_outage_is_invisible_to_rate_limit_callers() {
    let down = Arc::new(AtomicBool::new(false));
    let facade = ResilientStore::new(
        Some(FlakyBackend::new(down.clone())),
        Duration::from_secs(60),
    );
    let store: DynStore = Arc::new(facade);
    let limiter = RateLimiter::new(store);

    let key = RateLimitKey::Client("client42".to_string());
    let quota = RateQuota::new(5, 60);

    let first = limiter.check(&key, quota).await;
    assert!(first.allowed);
    assert_eq!(first.remaining, 4);

    // Backend dies between checks. Counting continues against the local
    // store; the window simply restarts there.
    down.store(true, Ordering::Relaxed);
    let during = limiter.check(&key, quota).await;
    assert!(during.allowed);
    assert_eq!(during.remaining, 4);

    // The local window is enforced for real: exhaust it.
    for _ in 0..4 {
        assert!(limiter.check(&key, quota).await.allowed);
    }
    assert!(!limiter.check(&key, quota).await.allowed);
}

#[tokio::test]
async fn cache_state_is_not_shared_after_degradation() {
    // Two facades over the same shared backend simulate two processes.
    let down = Arc::new(AtomicBool::new(false));
    let shared_backend = Arc::new(FlakyBackend::new(down.clone()));

    let process_a: DynStore = Arc::new(ResilientStore::new(
        Some(shared_backend.clone()),
        Duration::from_secs(60),
    ));
    let process_b: DynStore = Arc::new(ResilientStore::new(
        Some(shared_backend),
        Duration::from_secs(60),
    ));

    process_a
        .set_with_ttl("k", b"shared", Duration::from_secs(60))
        .await
        .unwrap();
    // While healthy, the second process sees the first one's write.
    assert_eq!(
        process_b.get("k").await.unwrap(),
        Some(b"shared".to_vec())
    );

    // After the outage each process is on its own local store.
    down.store(true, Ordering::Relaxed);
    process_a
        .set_with_ttl("k", b"local-a", Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(process_b.get("k").await.unwrap(), None);
}
