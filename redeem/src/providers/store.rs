//! Key-value store trait.
//!
//! The store is the only shared mutable resource and the only
//! coordination point between server instances. Every method is a
//! single-key atomic primitive; nothing here spans multiple keys.
//!
//! # Implementation Notes
//!
//! - **CRITICAL**: `set_if_absent` must be one atomic command (`SET NX`).
//!   It is the serialization point for both code creation and locking.
//! - **CRITICAL**: `compare_and_delete` must compare and delete atomically
//!   (a server-side script on Redis). A `GET` followed by `DEL` lets a
//!   stale holder delete a lock it no longer owns.
//! - `push_capped` must prepend and trim as one unit so the list never
//!   exceeds its cap.

use crate::error::StoreError;
use std::time::Duration;

/// One page of an incremental key scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call. `0` means the scan is complete.
    pub cursor: u64,

    /// Keys returned by this page. May be empty even when `cursor != 0`.
    pub keys: Vec<String>,
}

/// Networked key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Write `value` only if `key` is absent, optionally with a TTL.
    ///
    /// Returns `true` if the write happened.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be reached or the command fails.
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl std::future::Future<Output = Result<bool, StoreError>> + Send;

    /// Read a string value.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be reached or the command fails.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Read many string values in one round trip, in key order.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be reached or the command fails.
    fn get_many(
        &self,
        keys: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Option<String>>, StoreError>> + Send;

    /// Unconditionally overwrite a value (no TTL).
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be reached or the command fails.
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Delete a key. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be reached or the command fails.
    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<bool, StoreError>> + Send;

    /// Delete `key` only if its current value equals `expected`.
    ///
    /// Returns `true` if the key was deleted.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be reached or the command fails.
    fn compare_and_delete(
        &self,
        key: &str,
        expected: &str,
    ) -> impl std::future::Future<Output = Result<bool, StoreError>> + Send;

    /// Fetch one page of keys starting with `prefix`.
    ///
    /// Start with cursor `0`; keep calling with the returned cursor until
    /// it comes back as `0`. `batch` is a hint, not a limit.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be reached or the command fails.
    fn scan_prefix(
        &self,
        prefix: &str,
        cursor: u64,
        batch: usize,
    ) -> impl std::future::Future<Output = Result<ScanPage, StoreError>> + Send;

    /// Prepend `value` to the list at `key` and trim it to `cap` entries.
    ///
    /// A `cap` of zero leaves no list at `key`.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be reached or the command fails.
    fn push_capped(
        &self,
        key: &str,
        value: &str,
        cap: usize,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Read the first `count` entries of the list at `key`.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be reached or the command fails.
    fn list_head(
        &self,
        key: &str,
        count: usize,
    ) -> impl std::future::Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Check connectivity.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be reached.
    fn ping(&self) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
