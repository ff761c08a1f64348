//! Storage implementations.
//!
//! - **Key-value store** (Redis) - Code records, redemption locks and the
//!   operation log, all in one shared instance

pub mod kv_redis;

// Re-exports
pub use kv_redis::{RedisKeyValueStore, RedisStoreHandle};
