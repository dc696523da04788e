//! Quotient Store - Caching and Rate Limiting
//!
//! The layer between request handlers and a slow, quota-limited upstream
//! API. It deduplicates concurrent fetches for the same logical resource,
//! serves slightly-stale data instead of blocking while a refresh is in
//! flight or the backend is down, and enforces per-client request quotas
//! without a single point of failure.
//!
//! # Architecture
//!
//! ```text
//! handlers ──> SwrCache ─────┐
//!                            ├──> ResilientStore ──> RedisStore (shared)
//! handlers ──> RateLimiter ──┘          │
//!                                       └─────────> MemoryStore (fallback)
//! ```
//!
//! All components are constructed once at startup and injected - the facade
//! owns its health state, nothing lives in module-level globals.
//!
//! # Example
//!
//! ```ignore
//! let config = QuotientConfig::from_env();
//! let store: DynStore = Arc::new(ResilientStore::from_config(&config)?);
//! let cache = SwrCache::new(store.clone());
//! let limiter = RateLimiter::new(store);
//!
//! let codec = KeyCodec::new("ads", "v1");
//! let key = codec.build(&client_id, &[("report", "spend"), ("month", month)]);
//! let read = cache
//!     .fetch(&key, config.ttl.report.into(), || upstream.spend_report(month))
//!     .await?;
//! ```

pub mod cache;
pub mod key;
pub mod rate;
pub mod store;

pub use cache::{Cached, CacheStats, EntryState, SwrCache, TtlPolicy};
pub use key::{CacheKey, KeyCodec};
pub use rate::{RateDecision, RateLimiter, RateLimitKey};
pub use store::{DynStore, MemoryStore, RedisStore, ResilientStore, Store, StoreStats, WindowCounter};
