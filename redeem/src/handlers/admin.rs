//! Admin endpoints: code management and the operation log.
//!
//! Every handler takes [`AdminAuth`], so a request without the admin
//! bearer token never reaches the store.

use super::AppState;
use super::error::ApiError;
use super::extractors::{AdminAuth, ClientIp};
use crate::constants::codes;
use crate::error::RedeemError;
use crate::oplog::{LogListing, OperationEvent, summarize_codes};
use crate::providers::{Clock, InviteSender, KeyValueStore};
use crate::types::{CodeListing, DeleteOutcome, RedemptionCode};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `POST /api/admin/codes` body.
///
/// Explicit codes (`codes` and/or `code`) take precedence; invalid entries
/// are dropped. Without any valid explicit code, `count` random codes of
/// `length` characters are generated.
#[derive(Debug, Default, Deserialize)]
struct CreateCodesRequest {
    #[serde(default)]
    codes: Value,
    #[serde(default)]
    code: Value,
    #[serde(default)]
    count: Value,
    #[serde(default)]
    length: Value,
}

impl CreateCodesRequest {
    /// Valid explicit codes, in request order. Duplicates are kept here
    /// and removed by the registry.
    fn explicit_codes(&self) -> Vec<RedemptionCode> {
        let listed = self.codes.as_array().map(Vec::as_slice).unwrap_or_default();
        listed
            .iter()
            .chain(std::iter::once(&self.code))
            .filter_map(Value::as_str)
            .filter_map(|raw| RedemptionCode::parse(raw).ok())
            .collect()
    }
}

/// Read a numeric field sent either as a number or a numeric string.
///
/// Missing, zero, or unparsable values fall back to `default`; the
/// result is clamped to `min..=max`.
fn bounded(value: &Value, default: usize, min: usize, max: usize) -> usize {
    let parsed = match value {
        #[allow(clippy::cast_possible_truncation)]
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    let value = match parsed {
        None | Some(0) => default,
        Some(n) if n < 0 => min,
        Some(n) => usize::try_from(n).unwrap_or(max),
    };
    value.clamp(min, max)
}

/// Successful list/create body.
#[derive(Debug, Serialize)]
pub struct CodesResponse<T> {
    /// Always `true`.
    pub success: bool,
    /// Listed or created codes.
    pub codes: Vec<T>,
}

/// `GET /api/admin/logs` body.
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    /// Always `true`.
    pub success: bool,
    /// Newest entries first.
    pub logs: Vec<LogListing>,
}

/// Body with only a success flag.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    /// Always `true`.
    pub success: bool,
}

/// List every code record, newest first.
///
/// # Errors
///
/// 500 if the store fails.
pub async fn list_codes<S, I, C>(
    _: AdminAuth,
    State(state): State<AppState<S, I, C>>,
) -> Result<Json<CodesResponse<CodeListing>>, ApiError>
where
    S: KeyValueStore,
    I: InviteSender,
    C: Clock,
{
    let codes = state.coordinator.registry().list().await?;
    Ok(Json(CodesResponse {
        success: true,
        codes,
    }))
}

/// Create explicit codes or generate random ones.
///
/// # Errors
///
/// - 409 with `created` and `skipped` if any explicit code already existed
/// - 500 with the partial `codes` if generation exhausted its attempts
/// - 500 if the store fails
pub async fn create_codes<S, I, C>(
    _: AdminAuth,
    State(state): State<AppState<S, I, C>>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> Result<Json<CodesResponse<String>>, ApiError>
where
    S: KeyValueStore,
    I: InviteSender,
    C: Clock,
{
    let request: CreateCodesRequest = serde_json::from_slice(&body).unwrap_or_default();
    let registry = state.coordinator.registry();
    let log = state.coordinator.log();

    let explicit = request.explicit_codes();
    if !explicit.is_empty() {
        let report = registry.create_many(&explicit).await?;
        if !report.created.is_empty() {
            log.append(OperationEvent::CodeCreate {
                ip: ip.clone(),
                count: report.created.len(),
                codes: summarize_codes(&report.created),
            })
            .await;
        }

        if !report.is_complete() {
            return Err(ApiError::new(StatusCode::CONFLICT, "Some codes already exist")
                .with_detail("created", report.created)
                .with_detail("skipped", report.skipped));
        }

        return Ok(Json(CodesResponse {
            success: true,
            codes: report.created,
        }));
    }

    let length = bounded(
        &request.length,
        codes::DEFAULT_GENERATED_LEN,
        codes::MIN_GENERATED_LEN,
        codes::MAX_GENERATED_LEN,
    );
    let count = bounded(&request.count, 1, 1, codes::MAX_GENERATED_COUNT);

    match registry.generate(count, length).await {
        Ok(created) => {
            log.append(OperationEvent::CodeCreate {
                ip,
                count: created.len(),
                codes: summarize_codes(&created),
            })
            .await;
            Ok(Json(CodesResponse {
                success: true,
                codes: created,
            }))
        }
        Err(RedeemError::GenerationExhausted { requested, created }) => {
            if !created.is_empty() {
                log.append(OperationEvent::CodeCreate {
                    ip,
                    count: created.len(),
                    codes: summarize_codes(&created),
                })
                .await;
            }
            Err(RedeemError::GenerationExhausted { requested, created }.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete one code, used or not.
///
/// # Errors
///
/// - 400 if the code is malformed
/// - 404 if no record exists
/// - 500 if the store fails
pub async fn delete_code<S, I, C>(
    _: AdminAuth,
    State(state): State<AppState<S, I, C>>,
    ClientIp(ip): ClientIp,
    Path(raw): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError>
where
    S: KeyValueStore,
    I: InviteSender,
    C: Clock,
{
    let code = RedemptionCode::parse(&raw).map_err(|_| ApiError::bad_request("Invalid code"))?;

    match state.coordinator.registry().delete(&code).await? {
        DeleteOutcome::Removed => {
            state
                .coordinator
                .log()
                .append(OperationEvent::CodeDelete {
                    ip,
                    code: code.into_inner(),
                })
                .await;
            Ok(Json(SuccessResponse { success: true }))
        }
        DeleteOutcome::NotFound => Err(ApiError::not_found()),
    }
}

/// The newest operation log entries.
///
/// # Errors
///
/// 500 if the store fails.
pub async fn list_logs<S, I, C>(
    _: AdminAuth,
    State(state): State<AppState<S, I, C>>,
) -> Result<Json<LogsResponse>, ApiError>
where
    S: KeyValueStore,
    I: InviteSender,
    C: Clock,
{
    let logs = state.coordinator.log().tail(None).await?;
    Ok(Json(LogsResponse {
        success: true,
        logs,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: Value) -> CreateCodesRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_explicit_codes_drop_invalid_entries() {
        let req = request(json!({
            "codes": ["AAA111", "bad code", 42, " BBB222 "],
            "code": "CCC333"
        }));
        let codes: Vec<_> = req
            .explicit_codes()
            .into_iter()
            .map(RedemptionCode::into_inner)
            .collect();
        assert_eq!(codes, vec!["AAA111", "BBB222", "CCC333"]);
    }

    #[test]
    fn test_no_explicit_codes() {
        assert!(request(json!({"count": 3})).explicit_codes().is_empty());
        assert!(request(json!({"codes": "AAA"})).explicit_codes().is_empty());
    }

    #[test]
    fn test_bounded_numbers() {
        assert_eq!(bounded(&Value::Null, 10, 6, 32), 10);
        assert_eq!(bounded(&json!(0), 10, 6, 32), 10);
        assert_eq!(bounded(&json!(3), 10, 6, 32), 6);
        assert_eq!(bounded(&json!(64), 10, 6, 32), 32);
        assert_eq!(bounded(&json!("12"), 10, 6, 32), 12);
        assert_eq!(bounded(&json!(-5), 1, 1, 200), 1);
        assert_eq!(bounded(&json!("lots"), 1, 1, 200), 1);
        assert_eq!(bounded(&json!(8.9), 10, 6, 32), 8);
    }
}
