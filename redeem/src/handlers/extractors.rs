//! Request extractors: client address and admin authorization.

use super::AppState;
use super::error::ApiError;
use crate::coordinator::UNKNOWN_CLIENT;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

/// Client address as reported by the proxy in front of the service.
///
/// # Priority
///
/// 1. `X-Forwarded-For` (first hop)
/// 2. `X-Real-IP`
/// 3. `"unknown"`
///
/// Used only for the operation log, so the value is not parsed or
/// trusted further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(extract_client_ip(&parts.headers)))
    }
}

fn extract_client_ip(headers: &HeaderMap) -> String {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    header_str("x-forwarded-for")
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| header_str("x-real-ip"))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Proof that the request carried the admin bearer token.
///
/// Rejects with 500 if no admin token is configured and 401 (with a
/// bearer challenge) if the header is missing or does not match. The
/// comparison is constant-time.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

#[async_trait]
impl<S, I, C> FromRequestParts<AppState<S, I, C>> for AdminAuth
where
    S: Send + Sync,
    I: Send + Sync,
    C: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, I, C>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token.as_deref() else {
            return Err(ApiError::internal("Admin token not configured"));
        };

        let provided = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token);

        match provided {
            Some(token) if constant_time_eq::constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
                Ok(Self)
            }
            _ => {
                tracing::warn!("Rejected admin request with missing or invalid token");
                Err(ApiError::unauthorized())
            }
        }
    }
}

/// Token from an `Authorization: Bearer <token>` value (scheme is
/// case-insensitive).
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let h = headers(&[
            ("x-forwarded-for", " 203.0.113.7 , 10.0.0.1"),
            ("x-real-ip", "10.0.0.2"),
        ]);
        assert_eq!(extract_client_ip(&h), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_fallback() {
        let h = headers(&[("x-real-ip", "10.0.0.2")]);
        assert_eq!(extract_client_ip(&h), "10.0.0.2");
    }

    #[test]
    fn test_unknown_client() {
        assert_eq!(extract_client_ip(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer secret"), Some("secret"));
        assert_eq!(bearer_token("bearer  secret "), Some("secret"));
        assert_eq!(bearer_token("Basic c2VjcmV0"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
    }
}
