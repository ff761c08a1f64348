//! Redemption configuration.
//!
//! Tunables for the lock, registry and operation log. Values should be
//! provided by the application; the defaults match production.

use std::time::Duration;

/// Configuration shared by the lock, registry, coordinator and log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemConfig {
    /// Lifetime of a redemption lock entry.
    ///
    /// Bounds how long a crashed holder can keep a code locked.
    ///
    /// Default: 2 minutes
    pub lock_ttl: Duration,

    /// Maximum number of entries kept in the operation log.
    ///
    /// Default: 1000
    pub log_capacity: usize,

    /// Number of entries returned by a default log tail.
    ///
    /// Default: 100
    pub log_tail: usize,

    /// `COUNT` hint for each incremental key scan.
    ///
    /// Default: 200
    pub scan_batch: usize,

    /// Generation attempts allowed per requested code.
    ///
    /// Default: 20
    pub generation_attempt_factor: usize,
}

impl RedeemConfig {
    /// Create a configuration with production defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lock_ttl: Duration::from_secs(120),
            log_capacity: 1000,
            log_tail: 100,
            scan_batch: 200,
            generation_attempt_factor: 20,
        }
    }

    /// Set the lock lifetime.
    #[must_use]
    pub const fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Set the operation log capacity (at least 1).
    #[must_use]
    pub const fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = if capacity == 0 { 1 } else { capacity };
        self
    }

    /// Set the default log tail length.
    #[must_use]
    pub const fn with_log_tail(mut self, tail: usize) -> Self {
        self.log_tail = tail;
        self
    }

    /// Set the scan batch hint.
    #[must_use]
    pub const fn with_scan_batch(mut self, batch: usize) -> Self {
        self.scan_batch = batch;
        self
    }

    /// Set the generation attempt factor.
    #[must_use]
    pub const fn with_generation_attempt_factor(mut self, factor: usize) -> Self {
        self.generation_attempt_factor = factor;
        self
    }
}

impl Default for RedeemConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Credentials forwarded to the invite service.
#[derive(Clone, PartialEq, Eq)]
pub struct InviteCredentials {
    /// Account the invite is issued from.
    pub account_id: String,

    /// Bearer token for the invite service.
    pub token: String,
}

impl InviteCredentials {
    /// Build credentials, returning `None` unless both parts are non-empty.
    #[must_use]
    pub fn from_parts(account_id: Option<String>, token: Option<String>) -> Option<Self> {
        match (account_id, token) {
            (Some(account_id), Some(token)) if !account_id.is_empty() && !token.is_empty() => {
                Some(Self { account_id, token })
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for InviteCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InviteCredentials")
            .field("account_id", &self.account_id)
            .field("token", &"<redacted>")
            .finish()
    }
}
