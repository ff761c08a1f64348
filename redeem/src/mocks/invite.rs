//! Mock invite sender for testing.

use crate::config::InviteCredentials;
use crate::providers::{InviteFailure, InviteReceipt, InviteSender};
use crate::types::EmailAddress;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

type Scripted = Result<InviteReceipt, InviteFailure>;

/// Scriptable [`InviteSender`].
///
/// Responses queued with [`push_response`](Self::push_response) are
/// returned in order; once the queue is empty every call succeeds with
/// "Invite sent". An optional latency keeps a send in flight long enough
/// for concurrent callers to contend for the lock.
#[derive(Debug, Clone, Default)]
pub struct MockInviteSender {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    sent_to: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
    latency: Duration,
}

impl MockInviteSender {
    /// Sender that always succeeds immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `latency` inside every send.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue the result of a future call.
    pub fn push_response(&self, response: Scripted) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    /// Queue a failure with `message`.
    pub fn fail_next(&self, message: &str) {
        self.push_response(Err(InviteFailure::new(message)));
    }

    /// Number of completed `send_invite` calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Emails passed to `send_invite`, in call order.
    #[must_use]
    pub fn sent_to(&self) -> Vec<String> {
        self.sent_to
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl InviteSender for MockInviteSender {
    async fn send_invite(
        &self,
        email: &EmailAddress,
        _credentials: &InviteCredentials,
    ) -> Result<InviteReceipt, InviteFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent_to
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email.as_str().to_string());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        scripted.unwrap_or_else(|| {
            Ok(InviteReceipt {
                message: Some("Invite sent".to_string()),
                data: None,
            })
        })
    }
}
