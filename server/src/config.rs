//! Server configuration.
//!
//! Loaded from environment variables (after `.env`, if present) with
//! defaults for everything except secrets. Missing secrets do not stop the
//! server: the routes that need them answer with a 500 instead, so health
//! checks and the rest of the surface stay up.

use invite_redeem::{DEFAULT_INVITE_API_BASE_URL, InviteCredentials, RedeemConfig};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP listener configuration
    pub server: ServerConfig,
    /// Redis connection URL (`REDIS_URL`)
    pub redis_url: Option<String>,
    /// Bearer token for admin routes (`ADMIN_TOKEN`)
    pub admin_token: Option<String>,
    /// Upstream invite service
    pub invite: InviteServiceConfig,
    /// Lock, log and registry tunables
    pub redeem: RedeemConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (`HOST`, default `0.0.0.0`)
    pub host: String,
    /// Port to bind to (`PORT`, default 3000)
    pub port: u16,
    /// CORS preflight cache lifetime (`CORS_MAX_AGE_SECS`, default 600)
    pub cors_max_age: Duration,
}

/// Upstream invite service configuration.
#[derive(Debug, Clone)]
pub struct InviteServiceConfig {
    /// API root (`INVITE_API_BASE_URL`)
    pub base_url: String,
    /// Per-request timeout (`INVITE_TIMEOUT_SECS`, default 30)
    pub timeout: Duration,
    /// Account and token (`INVITE_ACCOUNT_ID`, `INVITE_TOKEN`)
    pub credentials: Option<InviteCredentials>,
}

impl Config {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    ///
    /// Unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let defaults = RedeemConfig::default();
        let redeem = defaults
            .clone()
            .with_lock_ttl(
                parse_var(&lookup, "LOCK_TTL_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.lock_ttl),
            )
            .with_log_capacity(
                parse_var(&lookup, "LOG_CAPACITY")
                    .unwrap_or(defaults.log_capacity)
                    .max(1),
            );

        Self {
            server: ServerConfig {
                host: non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_var(&lookup, "PORT").unwrap_or(3000),
                cors_max_age: Duration::from_secs(
                    parse_var(&lookup, "CORS_MAX_AGE_SECS").unwrap_or(600),
                ),
            },
            redis_url: non_empty("REDIS_URL"),
            admin_token: non_empty("ADMIN_TOKEN"),
            invite: InviteServiceConfig {
                base_url: non_empty("INVITE_API_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_INVITE_API_BASE_URL.to_string()),
                timeout: Duration::from_secs(
                    parse_var(&lookup, "INVITE_TIMEOUT_SECS").unwrap_or(30),
                ),
                credentials: InviteCredentials::from_parts(
                    lookup("INVITE_ACCOUNT_ID"),
                    lookup("INVITE_TOKEN"),
                ),
            },
            redeem,
        }
    }

    /// `host:port` to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server", &self.server)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "<set>"))
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<redacted>"))
            .field("invite", &self.invite)
            .field("redeem", &self.redeem)
            .finish()
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]);
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.server.cors_max_age, Duration::from_secs(600));
        assert!(config.redis_url.is_none());
        assert!(config.admin_token.is_none());
        assert!(config.invite.credentials.is_none());
        assert_eq!(config.invite.base_url, DEFAULT_INVITE_API_BASE_URL);
        assert_eq!(config.redeem, RedeemConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("REDIS_URL", "redis://cache:6379"),
            ("ADMIN_TOKEN", "s3cret"),
            ("INVITE_ACCOUNT_ID", "acct"),
            ("INVITE_TOKEN", "tok"),
            ("LOCK_TTL_MS", "5000"),
            ("LOG_CAPACITY", "50"),
        ]);
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
        assert!(config.invite.credentials.is_some());
        assert_eq!(config.redeem.lock_ttl, Duration::from_millis(5000));
        assert_eq!(config.redeem.log_capacity, 50);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = load(&[("PORT", "http"), ("REDIS_URL", "  "), ("LOG_CAPACITY", "0")]);
        assert_eq!(config.server.port, 3000);
        assert!(config.redis_url.is_none());
        assert_eq!(config.redeem.log_capacity, 1);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&[("ADMIN_TOKEN", "s3cret"), ("INVITE_TOKEN", "tok")]);
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
    }
}
