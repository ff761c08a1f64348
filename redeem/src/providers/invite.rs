//! Invite sender trait.
//!
//! The invite call is the one side effect in the system that cannot be
//! undone: calling it twice may send two invites. Callers must guarantee
//! at-most-once invocation per code themselves.

use crate::config::InviteCredentials;
use crate::types::EmailAddress;

/// Successful invite send.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InviteReceipt {
    /// Human-readable confirmation from the service.
    pub message: Option<String>,

    /// Raw response payload.
    pub data: Option<serde_json::Value>,
}

/// Failed invite send.
#[derive(Debug, Clone, PartialEq)]
pub struct InviteFailure {
    /// Reason reported by the service (or by the transport).
    pub message: String,

    /// Raw response payload, if the service returned one.
    pub data: Option<serde_json::Value>,
}

impl InviteFailure {
    /// Failure with a message and no payload.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }
}

/// Invite-granting service.
///
/// Implementations report failures as values; they should not retry
/// internally, because a retry after an ambiguous failure may duplicate
/// the invite.
pub trait InviteSender: Send + Sync {
    /// Send one invite to `email` on behalf of `credentials.account_id`.
    ///
    /// # Errors
    ///
    /// Returns [`InviteFailure`] if the service rejects the invite or the
    /// request cannot be completed.
    fn send_invite(
        &self,
        email: &EmailAddress,
        credentials: &InviteCredentials,
    ) -> impl std::future::Future<Output = Result<InviteReceipt, InviteFailure>> + Send;
}
