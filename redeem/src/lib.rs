//! # Invite Redeem
//!
//! Single-use redemption codes, each of which triggers exactly one invite
//! send to an external workspace service.
//!
//! ## Guarantees
//!
//! - **At most one send per code**: a per-code lock in the shared store
//!   serializes redemptions, so any number of server instances can share
//!   one Redis.
//! - **Used is final**: once a code is marked used it only changes by
//!   admin delete.
//! - **Failed sends are free**: if the invite service rejects a send, the
//!   code stays unused.
//!
//! ## Architecture
//!
//! ```text
//! HTTP handler ─► RedemptionCoordinator ─┬─► RedemptionLock ─┐
//!                                        ├─► CodeRegistry ───┼─► KeyValueStore (Redis)
//!                                        ├─► OperationLog ───┘
//!                                        └─► InviteSender (HTTP)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use invite_redeem::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(RedisStoreHandle::new(Some(redis_url)));
//! let sender = Arc::new(HttpInviteSender::new(DEFAULT_INVITE_API_BASE_URL, timeout)?);
//! let coordinator = RedemptionCoordinator::new(
//!     store,
//!     sender,
//!     Arc::new(SystemClock),
//!     InviteCredentials::from_parts(account_id, token),
//!     &RedeemConfig::default(),
//! );
//!
//! let outcome = coordinator.redeem("ABC123XYZ", "user@example.com", None).await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod lock;
pub mod oplog;
pub mod providers;
pub mod registry;
pub mod senders;
pub mod stores;
pub mod types;

#[cfg(feature = "axum")]
pub mod handlers;
#[cfg(feature = "axum")]
pub mod router;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use config::{InviteCredentials, RedeemConfig};
pub use coordinator::RedemptionCoordinator;
pub use error::{RedeemError, Result, StoreError};
pub use lock::{LockToken, RedemptionLock};
pub use oplog::{LogEntry, LogListing, OperationEvent, OperationLog};
pub use providers::{
    Clock, InviteFailure, InviteReceipt, InviteSender, KeyValueStore, ScanPage, SystemClock,
};
pub use registry::CodeRegistry;
pub use senders::{DEFAULT_INVITE_API_BASE_URL, HttpInviteSender};
pub use stores::{RedisKeyValueStore, RedisStoreHandle};
pub use types::{
    CodeListing, CodeRecord, CreateOutcome, CreateReport, DeleteOutcome, EmailAddress,
    RedemptionCode, RedemptionOutcome,
};

#[cfg(feature = "axum")]
pub use handlers::AppState;
#[cfg(feature = "axum")]
pub use router::build_router;
