//! Axum HTTP handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | |
//! |---|---|---|---|
//! | `POST` | `/api/invite` | none | redeem a code |
//! | `GET` | `/api/admin/codes` | admin | list codes |
//! | `POST` | `/api/admin/codes` | admin | create or generate codes |
//! | `DELETE` | `/api/admin/codes/:code` | admin | delete a code |
//! | `GET` | `/api/admin/logs` | admin | operation log tail |
//! | `GET` | `/health` | none | liveness |
//! | `GET` | `/ready` | none | store ping |
//!
//! Errors are JSON: `{"success": false, "error": "..."}`.

pub mod admin;
pub mod error;
pub mod extractors;
pub mod health;
pub mod invite;

pub use error::ApiError;
pub use extractors::{AdminAuth, ClientIp};

use crate::coordinator::RedemptionCoordinator;
use std::sync::Arc;

/// Shared handler state.
#[derive(Debug)]
pub struct AppState<S, I, C> {
    /// Redemption coordinator; also owns the registry and log.
    pub coordinator: Arc<RedemptionCoordinator<S, I, C>>,

    /// Store handle for readiness checks.
    pub store: Arc<S>,

    /// Bearer token for admin routes. `None` disables them (500).
    pub admin_token: Option<Arc<str>>,
}

impl<S, I, C> AppState<S, I, C> {
    /// Bundle handler state.
    #[must_use]
    pub fn new(
        coordinator: RedemptionCoordinator<S, I, C>,
        store: Arc<S>,
        admin_token: Option<String>,
    ) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            store,
            admin_token: admin_token.filter(|t| !t.is_empty()).map(Arc::from),
        }
    }
}

impl<S, I, C> Clone for AppState<S, I, C> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            store: Arc::clone(&self.store),
            admin_token: self.admin_token.clone(),
        }
    }
}
