//! HTTP error responses.
//!
//! Bridges [`RedeemError`] to the JSON error body every endpoint uses:
//!
//! ```json
//! {"success": false, "error": "<message>", ...details}
//! ```

use crate::error::RedeemError;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use std::fmt;

/// `WWW-Authenticate` challenge sent with every 401.
const ADMIN_CHALLENGE: &str = r#"Bearer realm="admin""#;

/// Error returned by handlers.
///
/// The message is user-facing. Server-side failures are logged with their
/// internal detail when the response is built; the detail is never sent.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Map<String, Value>,
    internal: Option<String>,
}

impl ApiError {
    /// Create an error with a status and message.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: Map::new(),
            internal: None,
        }
    }

    /// Add a field to the response body beside `success` and `error`.
    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Attach internal detail for the server log.
    #[must_use]
    pub fn with_internal(mut self, detail: impl fmt::Display) -> Self {
        self.internal = Some(detail.to_string());
        self
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 401 Unauthorized, with the admin bearer challenge.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found")
    }

    /// 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<RedeemError> for ApiError {
    fn from(err: RedeemError) -> Self {
        match err {
            RedeemError::InvalidEmail
            | RedeemError::InvalidCodeFormat
            | RedeemError::InvalidCode
            | RedeemError::AlreadyUsed => Self::bad_request(err.to_string()),

            RedeemError::InUse => Self::new(StatusCode::CONFLICT, err.to_string()),

            RedeemError::CorruptRecord => Self::internal(err.to_string()),

            RedeemError::UpstreamSendFailure { message, data } => {
                Self::new(StatusCode::BAD_GATEWAY, message).with_detail("data", data)
            }

            RedeemError::Misconfigured(ref detail) => {
                Self::internal("Service misconfigured").with_internal(detail)
            }

            RedeemError::StoreUnavailable(ref detail) => {
                Self::internal("Store not configured or unreachable").with_internal(detail)
            }

            RedeemError::Store(ref detail) => {
                Self::internal("Internal server error").with_internal(detail)
            }

            RedeemError::RecordUpdateFailed(ref detail) => Self::internal(
                "Invite sent but the code could not be updated, contact an administrator",
            )
            .with_internal(detail),

            RedeemError::GenerationExhausted { created, .. } => {
                Self::internal("Failed to generate codes, please retry")
                    .with_detail("codes", created)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                message = %self.message,
                internal = self.internal.as_deref().unwrap_or(""),
                "Request failed"
            );
        }

        let mut body = Map::new();
        body.insert("success".to_string(), Value::Bool(false));
        body.insert("error".to_string(), Value::String(self.message));
        body.extend(self.details);

        let mut response = (self.status, Json(Value::Object(body))).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(ADMIN_CHALLENGE),
            );
        }
        response
    }
}
