//! HTTP invite sender.
//!
//! Posts a single workspace invite to the upstream account API:
//!
//! ```text
//! POST {base_url}/accounts/{account_id}/invites
//! Authorization: Bearer {token}
//!
//! {"email_addresses": ["user@example.com"], "role": "standard-user", "resend_emails": true}
//! ```
//!
//! A 2xx response is success and its JSON body is passed back as `data`.
//! Anything else is a failure whose message is taken from the body when the
//! upstream provides one. Nothing is retried here.

use crate::config::InviteCredentials;
use crate::providers::{InviteFailure, InviteReceipt, InviteSender};
use crate::types::EmailAddress;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Default upstream API root.
pub const DEFAULT_INVITE_API_BASE_URL: &str = "https://chatgpt.com/backend-api";

#[derive(Debug, Serialize)]
struct InviteRequest<'a> {
    email_addresses: [&'a str; 1],
    role: &'a str,
    resend_emails: bool,
}

/// Invite sender backed by the upstream HTTP API.
#[derive(Clone, Debug)]
pub struct HttpInviteSender {
    client: Client,
    base_url: String,
}

impl HttpInviteSender {
    /// Create a sender for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS backend
    /// initialization failure).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn invites_url(&self, account_id: &str) -> String {
        format!("{}/accounts/{account_id}/invites", self.base_url)
    }
}

/// Pull a human-readable reason out of an upstream error body.
fn upstream_reason(body: &Value) -> Option<String> {
    let field = |name: &str| match body.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(inner) => inner
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    };

    field("detail").or_else(|| field("message")).or_else(|| field("error"))
}

impl InviteSender for HttpInviteSender {
    async fn send_invite(
        &self,
        email: &EmailAddress,
        credentials: &InviteCredentials,
    ) -> Result<InviteReceipt, InviteFailure> {
        let request = InviteRequest {
            email_addresses: [email.as_str()],
            role: "standard-user",
            resend_emails: true,
        };

        let response = self
            .client
            .post(self.invites_url(&credentials.account_id))
            .bearer_auth(&credentials.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Invite request failed before a response");
                InviteFailure::new(format!("Invite request failed: {e}"))
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<Value>(&text).ok();

        if status.is_success() {
            tracing::info!(status = status.as_u16(), "Invite accepted upstream");
            return Ok(InviteReceipt {
                message: body.as_ref().and_then(upstream_reason),
                data: body,
            });
        }

        let message = body
            .as_ref()
            .and_then(upstream_reason)
            .unwrap_or_else(|| format!("Invite service responded with {status}"));

        tracing::warn!(
            status = status.as_u16(),
            reason = %message,
            "Invite rejected upstream"
        );

        Err(InviteFailure {
            message,
            data: body.or_else(|| (!text.is_empty()).then(|| Value::String(text))),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invites_url_trims_trailing_slash() {
        let sender = HttpInviteSender::new("https://api.example.com/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            sender.invites_url("acct-1"),
            "https://api.example.com/accounts/acct-1/invites"
        );
    }

    #[test]
    fn test_upstream_reason_prefers_detail() {
        let body = json!({"detail": "Seat limit reached", "message": "ignored"});
        assert_eq!(upstream_reason(&body).as_deref(), Some("Seat limit reached"));
    }

    #[test]
    fn test_upstream_reason_nested_error() {
        let body = json!({"error": {"message": "token expired", "code": 401}});
        assert_eq!(upstream_reason(&body).as_deref(), Some("token expired"));
    }

    #[test]
    fn test_upstream_reason_absent() {
        assert_eq!(upstream_reason(&json!({"ok": true})), None);
        assert_eq!(upstream_reason(&json!({"detail": ""})), None);
    }

    #[test]
    fn test_request_body_shape() {
        let request = InviteRequest {
            email_addresses: ["user@example.com"],
            role: "standard-user",
            resend_emails: true,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "email_addresses": ["user@example.com"],
                "role": "standard-user",
                "resend_emails": true
            })
        );
    }
}
