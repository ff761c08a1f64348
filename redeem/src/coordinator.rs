//! Redemption coordinator.
//!
//! Turns "code + email" into at most one invite send per code:
//!
//! ```text
//! validate ─► lock ─► read record ─► send invite ─► mark used ─► release
//!                          │               │
//!                          └─ reject ──────┴─ failure ──────────► release
//! ```
//!
//! The lock, not the record read, is what serializes concurrent
//! redemptions of one code: the record is only read and written while the
//! caller holds the code's lock, so two callers can never both observe
//! `used = false` and both send.
//!
//! Every attempt that gets past input validation writes exactly one
//! operation log entry. Nothing is retried here.

use crate::config::{InviteCredentials, RedeemConfig};
use crate::error::{RedeemError, Result};
use crate::lock::RedemptionLock;
use crate::oplog::{OperationEvent, OperationLog};
use crate::providers::{Clock, InviteSender, KeyValueStore};
use crate::registry::CodeRegistry;
use crate::types::{EmailAddress, RedemptionCode, RedemptionOutcome};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Message reported when the invite service confirms without one.
const DEFAULT_SUCCESS_MESSAGE: &str = "Invite sent";

/// Log reason for a redemption that panicked while holding the lock.
pub const PANIC_REASON: &str = "Redemption panicked";

/// Client address recorded when the caller could not be identified.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Single-use code redemption.
#[derive(Debug)]
pub struct RedemptionCoordinator<S, I, C> {
    registry: CodeRegistry<S, C>,
    lock: RedemptionLock<S>,
    log: OperationLog<S, C>,
    sender: Arc<I>,
    clock: Arc<C>,
    credentials: Option<InviteCredentials>,
}

impl<S, I, C> Clone for RedemptionCoordinator<S, I, C> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            lock: self.lock.clone(),
            log: self.log.clone(),
            sender: Arc::clone(&self.sender),
            clock: Arc::clone(&self.clock),
            credentials: self.credentials.clone(),
        }
    }
}

impl<S, I, C> RedemptionCoordinator<S, I, C>
where
    S: KeyValueStore,
    I: InviteSender,
    C: Clock,
{
    /// Wire a coordinator.
    ///
    /// `credentials` may be `None`; redemptions then fail with
    /// [`RedeemError::Misconfigured`] while admin operations keep working.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        sender: Arc<I>,
        clock: Arc<C>,
        credentials: Option<InviteCredentials>,
        config: &RedeemConfig,
    ) -> Self {
        Self {
            registry: CodeRegistry::new(Arc::clone(&store), Arc::clone(&clock), config.clone()),
            lock: RedemptionLock::new(Arc::clone(&store), config.lock_ttl),
            log: OperationLog::new(store, Arc::clone(&clock), config),
            sender,
            clock,
            credentials,
        }
    }

    /// The code registry sharing this coordinator's store.
    #[must_use]
    pub const fn registry(&self) -> &CodeRegistry<S, C> {
        &self.registry
    }

    /// The operation log sharing this coordinator's store.
    #[must_use]
    pub const fn log(&self) -> &OperationLog<S, C> {
        &self.log
    }

    /// Redeem `code` for `email`.
    ///
    /// `client_ip` is only recorded in the operation log.
    ///
    /// # Errors
    ///
    /// - [`RedeemError::InvalidEmail`] / [`RedeemError::InvalidCodeFormat`]
    ///   before anything is touched
    /// - [`RedeemError::Misconfigured`] if invite credentials are missing
    /// - [`RedeemError::InUse`] if another redemption of the code is in flight
    /// - [`RedeemError::InvalidCode`], [`RedeemError::AlreadyUsed`],
    ///   [`RedeemError::CorruptRecord`] from the record state
    /// - [`RedeemError::UpstreamSendFailure`] if the invite was not sent;
    ///   the code stays redeemable
    /// - [`RedeemError::RecordUpdateFailed`] if the invite was sent but the
    ///   record could not be marked used
    /// - store errors
    ///
    /// # Panics
    ///
    /// Resumes a panic raised while the lock was held (by the invite sender
    /// or the store), after the lock has been released.
    pub async fn redeem(
        &self,
        code: &str,
        email: &str,
        client_ip: Option<&str>,
    ) -> Result<RedemptionOutcome> {
        let email = EmailAddress::parse(email)?;
        let code = RedemptionCode::parse(code)?;
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            tracing::error!("Invite credentials are not configured");
            RedeemError::Misconfigured("invite credentials are not configured".to_string())
        })?;
        let ip = client_ip.unwrap_or(UNKNOWN_CLIENT);

        let token = match self.lock.acquire(&code).await {
            Ok(token) => token,
            Err(e) => {
                self.record_failure(&code, &email, ip, &e).await;
                return Err(e);
            }
        };

        let attempt = AssertUnwindSafe(self.redeem_locked(&code, &email, credentials))
            .catch_unwind()
            .await;

        self.lock.release(&code, &token).await;

        let result = match attempt {
            Ok(result) => result,
            Err(panic) => {
                tracing::error!(code = %code, ip, "Redemption panicked, lock released");
                self.append_failure(&code, &email, ip, PANIC_REASON.to_string())
                    .await;
                std::panic::resume_unwind(panic);
            }
        };

        match &result {
            Ok(_) => {
                tracing::info!(code = %code, email = %email, ip, "Redemption succeeded");
                self.log
                    .append(OperationEvent::RedeemSuccess {
                        email: email.to_string(),
                        code: code.to_string(),
                        ip: ip.to_string(),
                    })
                    .await;
            }
            Err(e) => self.record_failure(&code, &email, ip, e).await,
        }

        result
    }

    /// Everything that must happen while the lock is held.
    async fn redeem_locked(
        &self,
        code: &RedemptionCode,
        email: &EmailAddress,
        credentials: &InviteCredentials,
    ) -> Result<RedemptionOutcome> {
        let record = self
            .registry
            .get(code)
            .await?
            .ok_or(RedeemError::InvalidCode)?;

        if record.used {
            return Err(RedeemError::AlreadyUsed);
        }

        let receipt = self
            .sender
            .send_invite(email, credentials)
            .await
            .map_err(|failure| RedeemError::UpstreamSendFailure {
                message: failure.message,
                data: failure.data,
            })?;

        let updated = record.redeemed(email, self.clock.now());
        if let Err(e) = self.registry.mark_used(code, &updated).await {
            tracing::error!(
                code = %code,
                email = %email,
                error = %e,
                "Invite was sent but the code could not be marked used; the code is still redeemable"
            );
            return Err(RedeemError::RecordUpdateFailed(e.to_string()));
        }

        Ok(RedemptionOutcome {
            code: code.clone(),
            message: Some(
                receipt
                    .message
                    .unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string()),
            ),
            data: receipt.data,
        })
    }

    async fn record_failure(
        &self,
        code: &RedemptionCode,
        email: &EmailAddress,
        ip: &str,
        error: &RedeemError,
    ) {
        if error.needs_operator() {
            tracing::error!(code = %code, ip, error = %error, "Redemption failed");
        } else {
            tracing::info!(code = %code, ip, error = %error, "Redemption rejected");
        }

        self.append_failure(code, email, ip, error.to_string()).await;
    }

    async fn append_failure(
        &self,
        code: &RedemptionCode,
        email: &EmailAddress,
        ip: &str,
        reason: String,
    ) {
        self.log
            .append(OperationEvent::RedeemFail {
                email: email.to_string(),
                code: code.to_string(),
                ip: ip.to_string(),
                reason,
            })
            .await;
    }
}
