//! In-process store backend.
//!
//! Single-instance fallback for the distributed backend, implementing the
//! same TTL and window semantics. Expiry is lazy: entries past their deadline
//! are treated as absent on read and removed when touched.
//!
//! The atomic increment is safe here because the process is the only writer;
//! DashMap's entry API holds the shard lock for the read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use quotient_core::QuotientResult;
use std::time::{Duration, Instant};

use super::traits::{Store, WindowCounter};

#[derive(Debug, Clone)]
struct ValueEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
struct CounterEntry {
    count: u64,
    window_ends: Instant,
    reset_at: DateTime<Utc>,
}

/// In-memory key/value store with TTL and fixed-window counters.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: DashMap<String, ValueEntry>,
    counters: DashMap<String, CounterEntry>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) values, for diagnostics.
    pub fn value_count(&self) -> usize {
        let now = Instant::now();
        self.values
            .iter()
            .filter(|entry| now < entry.expires_at)
            .count()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> QuotientResult<Option<Vec<u8>>> {
        if let Some(entry) = self.values.get(key) {
            if Instant::now() < entry.expires_at {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Absent or past its deadline; sweep the dead entry if still there.
        self.values
            .remove_if(key, |_, entry| Instant::now() >= entry.expires_at);
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> QuotientResult<()> {
        self.values.insert(
            key.to_string(),
            ValueEntry {
                value: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> QuotientResult<()> {
        self.values.remove(key);
        self.counters.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> QuotientResult<u64> {
        let mut deleted = 0u64;
        self.values.retain(|key, _| {
            if key.starts_with(prefix) {
                deleted += 1;
                false
            } else {
                true
            }
        });
        self.counters.retain(|key, _| {
            if key.starts_with(prefix) {
                deleted += 1;
                false
            } else {
                true
            }
        });
        Ok(deleted)
    }

    async fn incr_with_expiry(&self, key: &str, window: Duration) -> QuotientResult<WindowCounter> {
        let now = Instant::now();
        let chrono_window =
            chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());

        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert_with(|| CounterEntry {
                count: 0,
                window_ends: now + window,
                reset_at: Utc::now() + chrono_window,
            });

        if now >= entry.window_ends {
            // New window: the reset is atomic with the first increment
            // because the shard lock is held for the whole entry access.
            entry.count = 0;
            entry.window_ends = now + window;
            entry.reset_at = Utc::now() + chrono_window;
        }
        entry.count += 1;

        Ok(WindowCounter {
            count: entry.count,
            reset_at: entry.reset_at,
        })
    }
}
