//! Mock key-value store for testing.

use crate::error::StoreError;
use crate::providers::{KeyValueStore, ScanPage};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
enum Entry {
    Text {
        value: String,
        expires_at: Option<Instant>,
    },
    List(VecDeque<String>),
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        match self {
            Self::Text {
                expires_at: Some(at),
                ..
            } => *at > now,
            _ => true,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    commands: Vec<String>,
    unavailable: bool,
    fail_overwrites: bool,
    fail_list_writes: bool,
    repeat_scan_keys: bool,
}

impl Inner {
    /// Drop `key` if its TTL has passed and return what is left.
    fn live(&mut self, key: &str) -> Option<&Entry> {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| !e.is_live(now)) {
            self.entries.remove(key);
        }
        self.entries.get(key)
    }

    fn text(&mut self, key: &str) -> Option<String> {
        match self.live(key)? {
            Entry::Text { value, .. } => Some(value.clone()),
            Entry::List(_) => None,
        }
    }
}

/// In-memory [`KeyValueStore`] with the same atomicity as Redis.
///
/// Every operation runs under one mutex, so `set_if_absent` and
/// `compare_and_delete` are atomic with respect to each other. TTLs use
/// `tokio::time::Instant` and therefore follow a paused tokio clock.
///
/// Commands are recorded by name so tests can assert which store calls an
/// operation made (or that it made none).
#[derive(Debug, Clone, Default)]
pub struct MockKeyValueStore {
    inner: Arc<Mutex<Inner>>,
}

impl MockKeyValueStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `command` and fail it if the store is marked unavailable.
    fn begin(&self, command: &str) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let mut inner = self.lock();
        inner.commands.push(command.to_string());
        if inner.unavailable {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(inner)
    }

    /// Store a raw string value, bypassing validation (for corrupt-record tests).
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.lock().entries.insert(
            key.to_string(),
            Entry::Text {
                value: value.to_string(),
                expires_at: None,
            },
        );
    }

    /// Read a string value without recording a command.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.lock().text(key)
    }

    /// Read a whole list without recording a command.
    #[must_use]
    pub fn peek_list(&self, key: &str) -> Vec<String> {
        match self.lock().live(key) {
            Some(Entry::List(items)) => items.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Whether `key` currently holds a live value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lock().live(key).is_some()
    }

    /// Expire `key` immediately, as if its TTL had run out.
    pub fn expire_now(&self, key: &str) {
        self.lock().entries.remove(key);
    }

    /// Make every subsequent command fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Make unconditional `set` fail with [`StoreError::Command`].
    pub fn fail_overwrites(&self, fail: bool) {
        self.lock().fail_overwrites = fail;
    }

    /// Make `push_capped` fail with [`StoreError::Command`].
    pub fn fail_list_writes(&self, fail: bool) {
        self.lock().fail_list_writes = fail;
    }

    /// Make every scan page after the first repeat the last key of the
    /// previous page, as Redis `SCAN` is allowed to.
    pub fn repeat_scan_keys(&self, repeat: bool) {
        self.lock().repeat_scan_keys = repeat;
    }

    /// Names of the commands issued so far, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    /// Forget recorded commands.
    pub fn clear_commands(&self) {
        self.lock().commands.clear();
    }

    /// Number of live keys starting with `prefix`.
    #[must_use]
    pub fn count_prefix(&self, prefix: &str) -> usize {
        let now = Instant::now();
        self.lock()
            .entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.is_live(now))
            .count()
    }
}

impl KeyValueStore for MockKeyValueStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.begin("SETNX")?;
        if inner.live(key).is_some() {
            return Ok(false);
        }
        inner.entries.insert(
            key.to_string(),
            Entry::Text {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.begin("GET")?.text(key))
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        let mut inner = self.begin("MGET")?;
        Ok(keys.iter().map(|key| inner.text(key)).collect())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.begin("SET")?;
        if inner.fail_overwrites {
            return Err(StoreError::Command("SET rejected".to_string()));
        }
        inner.entries.insert(
            key.to_string(),
            Entry::Text {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.begin("DEL")?;
        let existed = inner.live(key).is_some();
        inner.entries.remove(key);
        Ok(existed)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut inner = self.begin("EVALSHA")?;
        if inner.text(key).as_deref() == Some(expected) {
            inner.entries.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    async fn scan_prefix(
        &self,
        prefix: &str,
        cursor: u64,
        batch: usize,
    ) -> Result<ScanPage, StoreError> {
        let inner = self.begin("SCAN")?;
        let now = Instant::now();
        let mut keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();

        let start = usize::try_from(cursor).unwrap_or(usize::MAX).min(keys.len());
        let end = start.saturating_add(batch.max(1)).min(keys.len());
        let next = if end >= keys.len() { 0 } else { u64::try_from(end).unwrap_or(0) };
        let first = if inner.repeat_scan_keys {
            start.saturating_sub(1)
        } else {
            start
        };

        Ok(ScanPage {
            cursor: next,
            keys: keys[first..end].to_vec(),
        })
    }

    async fn push_capped(&self, key: &str, value: &str, cap: usize) -> Result<(), StoreError> {
        let mut inner = self.begin("LPUSH")?;
        if inner.fail_list_writes {
            return Err(StoreError::Command("LPUSH rejected".to_string()));
        }
        let entry = inner
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(VecDeque::new()));
        let Entry::List(items) = entry else {
            return Err(StoreError::Command(
                "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
            ));
        };
        items.push_front(value.to_string());
        items.truncate(cap);
        if cap == 0 {
            inner.entries.remove(key);
        }
        Ok(())
    }

    async fn list_head(&self, key: &str, count: usize) -> Result<Vec<String>, StoreError> {
        let mut inner = self.begin("LRANGE")?;
        match inner.live(key) {
            Some(Entry::List(items)) => Ok(items.iter().take(count).cloned().collect()),
            Some(Entry::Text { .. }) => Err(StoreError::Command(
                "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
            )),
            None => Ok(Vec::new()),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.begin("PING").map(|_| ())
    }
}
