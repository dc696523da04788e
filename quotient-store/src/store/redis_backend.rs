//! Redis-backed distributed store.
//!
//! The networked backend shared across processes. Connection management is
//! lazy: constructing the store only parses the URL, and the first operation
//! establishes the connection. A failed first connection is retried on the
//! next operation, which is what lets the resilient facade probe this
//! backend back to health without a dedicated reconnect loop.
//!
//! The window increment is a Lua script so the increment and the conditional
//! expire happen as one atomic EVAL on the server.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use quotient_core::{QuotientResult, StoreError};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::traits::{Store, WindowCounter};

/// Keys deleted per DEL when sweeping a prefix.
const DELETE_BATCH: usize = 500;

/// INCR + conditional PEXPIRE as one atomic server-side operation.
///
/// Returns `{count, pttl_ms}`. The expiry is only set when this increment
/// opened the window (count == 1) or when the key somehow has no TTL, so
/// later increments never extend the window.
static INCR_WITH_EXPIRY: Lazy<redis::Script> = Lazy::new(|| {
    redis::Script::new(
        r#"
        local count = redis.call('INCR', KEYS[1])
        if count == 1 then
            redis.call('PEXPIRE', KEYS[1], ARGV[1])
        end
        local ttl = redis.call('PTTL', KEYS[1])
        if ttl < 0 then
            redis.call('PEXPIRE', KEYS[1], ARGV[1])
            ttl = tonumber(ARGV[1])
        end
        return {count, ttl}
        "#,
    )
});

/// Distributed store over a Redis connection manager.
pub struct RedisStore {
    client: redis::Client,
    manager: OnceCell<ConnectionManager>,
}

impl RedisStore {
    /// Create a store for the given connection URL.
    ///
    /// Only the URL is validated here; no connection is made until the first
    /// operation.
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(StoreError::connection)?;
        Ok(Self {
            client,
            manager: OnceCell::new(),
        })
    }

    /// Get the shared connection manager, establishing it on first use.
    ///
    /// `OnceCell::get_or_try_init` leaves the cell empty on failure, so a
    /// later call retries the connection instead of caching the error.
    async fn manager(&self) -> Result<ConnectionManager, StoreError> {
        self.manager
            .get_or_try_init(|| async {
                ConnectionManager::new(self.client.clone())
                    .await
                    .map_err(StoreError::connection)
            })
            .await
            .cloned()
    }

    /// Round-trip a PING, for health probes.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.manager().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(StoreError::connection)?;
        Ok(())
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> QuotientResult<Option<Vec<u8>>> {
        let mut conn = self.manager().await?;
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(StoreError::command)?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> QuotientResult<()> {
        let mut conn = self.manager().await?;
        let seconds = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, value, seconds)
            .await
            .map_err(StoreError::command)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> QuotientResult<()> {
        let mut conn = self.manager().await?;
        let _: u64 = conn.del(key).await.map_err(StoreError::command)?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> QuotientResult<u64> {
        // SCAN on one connection, DEL batches on another; KEYS would block
        // the server on large databases.
        let mut scan_conn = self.manager().await?;
        let mut del_conn = scan_conn.clone();

        let pattern = format!("{}*", prefix);
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter: redis::AsyncIter<String> = scan_conn
                .scan_match(&pattern)
                .await
                .map_err(StoreError::command)?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        let mut deleted = 0u64;
        for chunk in keys.chunks(DELETE_BATCH) {
            let removed: u64 = del_conn
                .del(chunk.to_vec())
                .await
                .map_err(StoreError::command)?;
            deleted += removed;
        }
        Ok(deleted)
    }

    async fn incr_with_expiry(&self, key: &str, window: Duration) -> QuotientResult<WindowCounter> {
        let mut conn = self.manager().await?;
        let window_ms = window.as_millis().max(1) as u64;

        let (count, pttl_ms): (u64, i64) = INCR_WITH_EXPIRY
            .key(key)
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Script {
                reason: e.to_string(),
            })?;

        let reset_at: DateTime<Utc> =
            Utc::now() + chrono::Duration::milliseconds(pttl_ms.max(0));
        Ok(WindowCounter { count, reset_at })
    }
}
