//! Liveness and readiness endpoints.

use super::AppState;
use crate::providers::KeyValueStore;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
}

/// Liveness check. Does not touch the store.
///
/// ```bash
/// curl http://localhost:3000/health
/// # {"status":"ok","version":"0.1.0"}
/// ```
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness
    pub ready: bool,
    /// Store connectivity
    pub store: bool,
}

/// Readiness check: 200 if the store answers a ping, 503 otherwise.
pub async fn readiness_check<S, I, C>(
    State(state): State<AppState<S, I, C>>,
) -> (StatusCode, Json<ReadinessResponse>)
where
    S: KeyValueStore,
{
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                ready: true,
                store: true,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    ready: false,
                    store: false,
                }),
            )
        }
    }
}
