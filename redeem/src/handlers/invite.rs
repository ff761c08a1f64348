//! Public redemption endpoint.

use super::AppState;
use super::error::ApiError;
use super::extractors::ClientIp;
use crate::providers::{Clock, InviteSender, KeyValueStore};
use axum::{Json, body::Bytes, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// `POST /api/invite` body.
///
/// Fields that are missing or not strings are treated as empty and fail
/// validation, as does a body that is not JSON at all.
#[derive(Debug, Default, Deserialize)]
struct InviteRequest {
    #[serde(default)]
    email: Value,
    #[serde(default)]
    code: Value,
}

/// `POST /api/invite` success body.
#[derive(Debug, Serialize)]
pub struct InviteResponse {
    /// Always `true`.
    pub success: bool,
    /// Confirmation from the invite service.
    pub message: Option<String>,
    /// Raw payload from the invite service.
    pub data: Option<Value>,
}

/// Redeem a code for an email address.
///
/// The redemption runs on its own task, so a client that disconnects
/// mid-request cannot cancel it between the invite send and the record
/// update.
///
/// # Errors
///
/// Maps every [`RedeemError`](crate::RedeemError) to its status code.
/// Returns 500 if the redemption task panicked.
pub async fn redeem<S, I, C>(
    State(state): State<AppState<S, I, C>>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> Result<Json<InviteResponse>, ApiError>
where
    S: KeyValueStore + 'static,
    I: InviteSender + 'static,
    C: Clock + 'static,
{
    let request: InviteRequest = serde_json::from_slice(&body).unwrap_or_default();
    let email = request.email.as_str().unwrap_or_default().to_string();
    let code = request.code.as_str().unwrap_or_default().to_string();

    let coordinator = Arc::clone(&state.coordinator);
    let task = tokio::spawn(async move { coordinator.redeem(&code, &email, Some(&ip)).await });

    let outcome = task
        .await
        .map_err(|e| ApiError::internal("Internal server error").with_internal(e))??;

    Ok(Json(InviteResponse {
        success: true,
        message: outcome.message,
        data: outcome.data,
    }))
}
