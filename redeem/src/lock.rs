//! Per-code redemption lock.
//!
//! A lock is a `code_lock:{code}` key holding a random token, written with
//! `SET NX PX` so only one holder can exist and a crashed holder's lock
//! disappears after the TTL. Release deletes the key only if it still holds
//! the caller's token, so a holder whose lock expired and was re-acquired by
//! someone else cannot release the new holder's lock.

use crate::constants::keys;
use crate::error::{RedeemError, Result};
use crate::providers::KeyValueStore;
use crate::types::RedemptionCode;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Proof of lock ownership.
///
/// Random per acquisition. Only the holder knows it.
#[derive(Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Token value as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LockToken(..)")
    }
}

/// Store key for the lock on `code`.
#[must_use]
pub fn lock_key(code: &RedemptionCode) -> String {
    format!("{}{}", keys::LOCK_PREFIX, code)
}

/// Short-lived mutual exclusion per code.
#[derive(Debug)]
pub struct RedemptionLock<S> {
    store: Arc<S>,
    ttl: Duration,
}

impl<S> Clone for RedemptionLock<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ttl: self.ttl,
        }
    }
}

impl<S: KeyValueStore> RedemptionLock<S> {
    /// Create a lock manager with the given hold ceiling.
    #[must_use]
    pub const fn new(store: Arc<S>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Take the lock on `code`.
    ///
    /// # Errors
    ///
    /// - [`RedeemError::InUse`] if someone else holds it
    /// - store errors if the store cannot be reached
    pub async fn acquire(&self, code: &RedemptionCode) -> Result<LockToken> {
        let token = LockToken::generate();
        let acquired = self
            .store
            .set_if_absent(&lock_key(code), token.as_str(), Some(self.ttl))
            .await?;

        if acquired {
            tracing::debug!(code = %code, "Redemption lock acquired");
            Ok(token)
        } else {
            tracing::debug!(code = %code, "Redemption lock busy");
            Err(RedeemError::InUse)
        }
    }

    /// Release the lock on `code` if `token` still owns it.
    ///
    /// Never fails. A lost lock or store error is logged and otherwise
    /// ignored: the TTL bounds how long an unreleased lock can linger.
    pub async fn release(&self, code: &RedemptionCode, token: &LockToken) {
        match self
            .store
            .compare_and_delete(&lock_key(code), token.as_str())
            .await
        {
            Ok(true) => tracing::debug!(code = %code, "Redemption lock released"),
            Ok(false) => tracing::warn!(
                code = %code,
                "Redemption lock was no longer held at release (expired or taken over)"
            ),
            Err(e) => tracing::error!(
                code = %code,
                error = %e,
                "Failed to release redemption lock, it will expire on its own"
            ),
        }
    }
}
