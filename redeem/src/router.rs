//! Router assembly.

use crate::handlers::{AppState, ApiError, admin, health, invite};
use crate::providers::{Clock, InviteSender, KeyValueStore};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Build the full router: health checks plus everything under `/api`.
///
/// Unknown `/api` paths answer with a JSON 404. Cross-cutting layers
/// (CORS, tracing) are left to the binary.
pub fn build_router<S, I, C>(state: AppState<S, I, C>) -> Router
where
    S: KeyValueStore + 'static,
    I: InviteSender + 'static,
    C: Clock + 'static,
{
    let admin_routes = Router::new()
        .route(
            "/codes",
            get(admin::list_codes::<S, I, C>).post(admin::create_codes::<S, I, C>),
        )
        .route("/codes/:code", delete(admin::delete_code::<S, I, C>))
        .route("/logs", get(admin::list_logs::<S, I, C>));

    let api_routes = Router::new()
        .route("/invite", post(invite::redeem::<S, I, C>))
        .nest("/admin", admin_routes)
        .fallback(api_not_found);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check::<S, I, C>))
        .nest("/api", api_routes)
        .with_state(state)
}

async fn api_not_found() -> ApiError {
    ApiError::not_found()
}
