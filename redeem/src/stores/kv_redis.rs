//! Redis-based key-value store.
//!
//! # Architecture
//!
//! - **Code records**: `code:{code}` → JSON `CodeRecord`, no TTL
//! - **Locks**: `code_lock:{code}` → random token, `SET NX PX`
//! - **Operation log**: list `logs`, `LPUSH` + `LTRIM` in one `MULTI`
//!
//! # Atomicity
//!
//! - Conditional set is a single `SET ... NX` command
//! - Compare-and-delete runs as a Lua script, so the `GET` and `DEL`
//!   execute without any other client interleaving
//! - Listing uses incremental `SCAN`, never `KEYS`, so a large code table
//!   does not block the server
//!
//! # Connection Lifecycle
//!
//! [`RedisStoreHandle`] is the process-wide shared handle. It is
//! constructed once at startup, cloned into every task, and connects on
//! first use behind a `tokio::sync::OnceCell`, so concurrent first callers
//! share a single connection attempt. A failed attempt leaves the cell
//! empty and the next call tries again.
//!
//! # Example
//!
//! ```no_run
//! use invite_redeem::providers::KeyValueStore;
//! use invite_redeem::stores::RedisStoreHandle;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisStoreHandle::new(Some("redis://127.0.0.1:6379".to_string()));
//! let created = store.set_if_absent("code:ABC", "{}", None).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::StoreError;
use crate::providers::{KeyValueStore, ScanPage};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Deletes `KEYS[1]` only while it still holds `ARGV[1]`.
const COMPARE_AND_DELETE_LUA: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
  return redis.call("DEL", KEYS[1])
else
  return 0
end
"#;

fn command_error(context: &str, err: &RedisError) -> StoreError {
    if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        StoreError::Unavailable(format!("{context}: {err}"))
    } else {
        StoreError::Command(format!("{context}: {err}"))
    }
}

/// `Redis` store over a pooled `ConnectionManager`.
///
/// Cheap to clone; clones share the same connection manager.
#[derive(Clone)]
pub struct RedisKeyValueStore {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,

    /// Compiled compare-and-delete script.
    release_script: Script,
}

impl RedisKeyValueStore {
    /// Connect to `Redis`.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - `Redis` connection URL (e.g., "<redis://127.0.0.1:6379>")
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the URL is malformed or the
    /// server cannot be reached.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url).map_err(|e| {
            StoreError::Unavailable(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::info!("RedisKeyValueStore connected");

        Ok(Self {
            conn_manager,
            release_script: Script::new(COMPARE_AND_DELETE_LUA),
        })
    }
}

impl KeyValueStore for RedisKeyValueStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn_manager.clone();

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            cmd.arg("PX").arg(ttl_ms);
        }

        // SET NX replies OK on write and nil when the key already exists
        let reply: Option<String> = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("SET NX failed", &e))?;

        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn_manager.clone();

        conn.get(key)
            .await
            .map_err(|e| command_error("GET failed", &e))
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn_manager.clone();
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.get(key);
        }

        pipe.query_async(&mut conn)
            .await
            .map_err(|e| command_error("pipelined GET failed", &e))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn_manager.clone();

        let _: () = conn
            .set(key, value)
            .await
            .map_err(|e| command_error("SET failed", &e))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn_manager.clone();

        let deleted: i64 = conn
            .del(key)
            .await
            .map_err(|e| command_error("DEL failed", &e))?;

        Ok(deleted > 0)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn_manager.clone();

        let deleted: i64 = self
            .release_script
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| command_error("compare-and-delete script failed", &e))?;

        Ok(deleted > 0)
    }

    async fn scan_prefix(
        &self,
        prefix: &str,
        cursor: u64,
        batch: usize,
    ) -> Result<ScanPage, StoreError> {
        let mut conn = self.conn_manager.clone();

        let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(format!("{prefix}*"))
            .arg("COUNT")
            .arg(batch)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("SCAN failed", &e))?;

        Ok(ScanPage { cursor, keys })
    }

    async fn push_capped(&self, key: &str, value: &str, cap: usize) -> Result<(), StoreError> {
        let mut conn = self.conn_manager.clone();

        // LTRIM 0 -1 keeps everything, so an empty cap is a delete
        if cap == 0 {
            let _: () = conn
                .del(key)
                .await
                .map_err(|e| command_error("DEL failed", &e))?;
            return Ok(());
        }

        let last = isize::try_from(cap).unwrap_or(isize::MAX).saturating_sub(1);

        let _: () = redis::pipe()
            .atomic()
            .lpush(key, value)
            .ignore()
            .ltrim(key, 0, last)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("LPUSH/LTRIM failed", &e))?;

        Ok(())
    }

    async fn list_head(&self, key: &str, count: usize) -> Result<Vec<String>, StoreError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.conn_manager.clone();
        let last = isize::try_from(count).unwrap_or(isize::MAX).saturating_sub(1);

        conn.lrange(key, 0, last)
            .await
            .map_err(|e| command_error("LRANGE failed", &e))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn_manager.clone();

        let _pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("PING failed", &e))?;

        Ok(())
    }
}

struct HandleInner {
    url: Option<String>,
    store: OnceCell<RedisKeyValueStore>,
}

/// Process-wide shared `Redis` handle with single, lazy construction.
///
/// Build one at startup and clone it wherever a store is needed. When no
/// URL is configured every operation fails fast with
/// [`StoreError::Unavailable`].
#[derive(Clone)]
pub struct RedisStoreHandle {
    inner: Arc<HandleInner>,
}

impl RedisStoreHandle {
    /// Create a handle. Does not connect.
    #[must_use]
    pub fn new(redis_url: Option<String>) -> Self {
        let url = redis_url.filter(|u| !u.trim().is_empty());
        if url.is_none() {
            tracing::error!("REDIS_URL is not set; store-backed operations will be refused");
        }

        Self {
            inner: Arc::new(HandleInner {
                url,
                store: OnceCell::new(),
            }),
        }
    }

    /// Whether a URL was configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.inner.url.is_some()
    }

    /// The shared store, connecting on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if no URL is configured or the
    /// connection attempt fails.
    pub async fn store(&self) -> Result<&RedisKeyValueStore, StoreError> {
        let Some(url) = self.inner.url.as_deref() else {
            return Err(StoreError::Unavailable("REDIS_URL is not set".to_string()));
        };

        self.inner
            .store
            .get_or_try_init(|| RedisKeyValueStore::connect(url))
            .await
    }
}

impl KeyValueStore for RedisStoreHandle {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        self.store().await?.set_if_absent(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.store().await?.get(key).await
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        self.store().await?.get_many(keys).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.store().await?.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.store().await?.delete(key).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.store().await?.compare_and_delete(key, expected).await
    }

    async fn scan_prefix(
        &self,
        prefix: &str,
        cursor: u64,
        batch: usize,
    ) -> Result<ScanPage, StoreError> {
        self.store().await?.scan_prefix(prefix, cursor, batch).await
    }

    async fn push_capped(&self, key: &str, value: &str, cap: usize) -> Result<(), StoreError> {
        self.store().await?.push_capped(key, value, cap).await
    }

    async fn list_head(&self, key: &str, count: usize) -> Result<Vec<String>, StoreError> {
        self.store().await?.list_head(key, count).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.store().await?.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_handle_refuses_operations() {
        let handle = RedisStoreHandle::new(None);
        assert!(!handle.is_configured());

        let err = handle.get("code:ABC").await.err();
        assert!(matches!(err, Some(StoreError::Unavailable(_))));

        let err = handle.ping().await.err();
        assert!(matches!(err, Some(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_blank_url_counts_as_unconfigured() {
        let handle = RedisStoreHandle::new(Some("   ".to_string()));
        assert!(!handle.is_configured());
    }

    // Note: The tests below require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running at localhost:6379
    #[allow(clippy::unwrap_used)] // Test code
    async fn test_redis_conditional_set_and_compare_and_delete() {
        let store = RedisStoreHandle::new(Some("redis://127.0.0.1:6379".to_string()));
        let key = format!("test:lock:{}", uuid::Uuid::new_v4());

        assert!(store.set_if_absent(&key, "a", Some(Duration::from_secs(5))).await.unwrap());
        assert!(!store.set_if_absent(&key, "b", None).await.unwrap());

        assert!(!store.compare_and_delete(&key, "b").await.unwrap());
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("a"));

        assert!(store.compare_and_delete(&key, "a").await.unwrap());
        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)] // Test code
    async fn test_redis_push_capped_and_scan() {
        let store = RedisStoreHandle::new(Some("redis://127.0.0.1:6379".to_string()));
        let run = uuid::Uuid::new_v4();
        let list = format!("test:log:{run}");

        for i in 0..10 {
            store.push_capped(&list, &i.to_string(), 3).await.unwrap();
        }
        assert_eq!(store.list_head(&list, 100).await.unwrap(), vec!["9", "8", "7"]);

        store.push_capped(&list, "x", 0).await.unwrap();
        assert!(store.list_head(&list, 100).await.unwrap().is_empty());

        let prefix = format!("test:scan:{run}:");
        for i in 0..5 {
            store.set(&format!("{prefix}{i}"), "v").await.unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor = 0;
        loop {
            let page = store.scan_prefix(&prefix, cursor, 2).await.unwrap();
            seen.extend(page.keys);
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);

        for key in seen {
            store.delete(&key).await.unwrap();
        }
        store.delete(&list).await.unwrap();
    }
}
