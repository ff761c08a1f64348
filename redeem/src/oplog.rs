//! Operation log.
//!
//! An audit trail of admin actions and redemption attempts, kept as a
//! capped list in the store (newest first). Writing to it is best-effort:
//! a failed append is logged and never fails the operation being recorded.

use crate::config::RedeemConfig;
use crate::constants::keys;
use crate::error::Result;
use crate::providers::{Clock, KeyValueStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of codes named in a `code_create` summary.
const SUMMARY_CODES: usize = 5;

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationEvent {
    /// Admin created codes.
    CodeCreate {
        /// Client address of the admin.
        ip: String,
        /// Number of codes created.
        count: usize,
        /// Summary of the created codes (see [`summarize_codes`]).
        codes: String,
    },
    /// Admin deleted a code.
    CodeDelete {
        /// Client address of the admin.
        ip: String,
        /// The deleted code.
        code: String,
    },
    /// A redemption sent an invite and consumed its code.
    RedeemSuccess {
        /// Redeemer email.
        email: String,
        /// Consumed code.
        code: String,
        /// Client address of the redeemer.
        ip: String,
    },
    /// A redemption attempt failed.
    RedeemFail {
        /// Email as submitted.
        email: String,
        /// Code as submitted.
        code: String,
        /// Client address of the redeemer.
        ip: String,
        /// Why it failed.
        reason: String,
    },
}

/// A stored log entry: the event plus when it was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The event, flattened beside `time`.
    #[serde(flatten)]
    pub event: OperationEvent,

    /// When it was recorded.
    pub time: DateTime<Utc>,
}

/// One row of a log tail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LogListing {
    /// A well-formed entry.
    Entry(LogEntry),
    /// A stored value that could not be parsed.
    Raw {
        /// The raw stored value.
        raw: String,
    },
}

/// Summarize created codes: the first five joined by `,`, with `...`
/// appended when there were more.
///
/// # Examples
///
/// ```
/// use invite_redeem::oplog::summarize_codes;
///
/// let codes: Vec<String> = ["A", "B", "C", "D", "E", "F"].map(String::from).to_vec();
/// assert_eq!(summarize_codes(&codes), "A,B,C,D,E...");
/// assert_eq!(summarize_codes(&codes[..2]), "A,B");
/// ```
#[must_use]
pub fn summarize_codes(codes: &[String]) -> String {
    let head = codes
        .iter()
        .take(SUMMARY_CODES)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",");
    if codes.len() > SUMMARY_CODES {
        format!("{head}...")
    } else {
        head
    }
}

/// Capped, newest-first operation log.
#[derive(Debug)]
pub struct OperationLog<S, C> {
    store: Arc<S>,
    clock: Arc<C>,
    capacity: usize,
    default_tail: usize,
}

impl<S, C> Clone for OperationLog<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            capacity: self.capacity,
            default_tail: self.default_tail,
        }
    }
}

impl<S: KeyValueStore, C: Clock> OperationLog<S, C> {
    /// Create a log over `store`. A zero capacity is raised to 1.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>, config: &RedeemConfig) -> Self {
        let capacity = if config.log_capacity == 0 {
            1
        } else {
            config.log_capacity
        };
        Self {
            store,
            clock,
            capacity,
            default_tail: config.log_tail,
        }
    }

    /// Record `event`, stamped with the current time.
    ///
    /// Never fails; write errors are logged and dropped.
    pub async fn append(&self, event: OperationEvent) {
        let entry = LogEntry {
            event,
            time: self.clock.now(),
        };

        let value = match serde_json::to_string(&entry) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize operation log entry");
                return;
            }
        };

        if let Err(e) = self
            .store
            .push_capped(keys::OPERATION_LOG, &value, self.capacity)
            .await
        {
            tracing::warn!(error = %e, "Failed to append operation log entry");
        }
    }

    /// The newest `count` entries (default tail size if `None`), newest
    /// first. Never more than the log capacity.
    ///
    /// # Errors
    ///
    /// Returns a store error if the list cannot be read.
    pub async fn tail(&self, count: Option<usize>) -> Result<Vec<LogListing>> {
        let count = count.unwrap_or(self.default_tail).min(self.capacity);
        let values = self.store.list_head(keys::OPERATION_LOG, count).await?;

        Ok(values
            .into_iter()
            .map(|raw| match serde_json::from_str::<LogEntry>(&raw) {
                Ok(entry) => LogListing::Entry(entry),
                Err(_) => LogListing::Raw { raw },
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::{FixedClock, MockKeyValueStore, test_time};
    use serde_json::json;

    fn log_with(
        config: &RedeemConfig,
    ) -> (Arc<MockKeyValueStore>, OperationLog<MockKeyValueStore, FixedClock>) {
        let store = Arc::new(MockKeyValueStore::new());
        let log = OperationLog::new(Arc::clone(&store), Arc::new(FixedClock::default()), config);
        (store, log)
    }

    fn delete_event(code: &str) -> OperationEvent {
        OperationEvent::CodeDelete {
            ip: "10.0.0.1".to_string(),
            code: code.to_string(),
        }
    }

    #[test]
    fn test_entry_wire_format() {
        let entry = LogEntry {
            event: OperationEvent::RedeemFail {
                email: "user@example.com".to_string(),
                code: "ABC".to_string(),
                ip: "unknown".to_string(),
                reason: "Redemption code is invalid".to_string(),
            },
            time: test_time(),
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({
                "type": "redeem_fail",
                "email": "user@example.com",
                "code": "ABC",
                "ip": "unknown",
                "reason": "Redemption code is invalid",
                "time": "2025-01-01T00:00:00Z"
            })
        );
    }

    #[tokio::test]
    async fn test_tail_is_newest_first() {
        let (_, log) = log_with(&RedeemConfig::default());
        log.append(delete_event("FIRST")).await;
        log.append(delete_event("SECOND")).await;

        let tail = log.tail(None).await.unwrap();
        assert_eq!(
            tail,
            vec![
                LogListing::Entry(LogEntry {
                    event: delete_event("SECOND"),
                    time: test_time()
                }),
                LogListing::Entry(LogEntry {
                    event: delete_event("FIRST"),
                    time: test_time()
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_log_never_exceeds_capacity() {
        let config = RedeemConfig::default().with_log_capacity(3);
        let (store, log) = log_with(&config);
        for i in 0..10 {
            log.append(delete_event(&format!("C{i}"))).await;
        }

        assert_eq!(store.peek_list("logs").len(), 3);
        assert_eq!(log.tail(Some(50)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_zero_capacity_keeps_latest_entry() {
        let config = RedeemConfig {
            log_capacity: 0,
            ..RedeemConfig::default()
        };
        let (store, log) = log_with(&config);
        log.append(delete_event("OLD")).await;
        log.append(delete_event("NEW")).await;

        assert_eq!(store.peek_list("logs").len(), 1);
        assert_eq!(
            log.tail(None).await.unwrap(),
            vec![LogListing::Entry(LogEntry {
                event: delete_event("NEW"),
                time: test_time()
            })]
        );
    }

    #[tokio::test]
    async fn test_append_failure_is_swallowed() {
        let (store, log) = log_with(&RedeemConfig::default());
        store.fail_list_writes(true);
        log.append(delete_event("X")).await;
        assert!(store.peek_list("logs").is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_entry_is_raw() {
        let (store, log) = log_with(&RedeemConfig::default());
        store.push_capped("logs", "garbage", 10).await.unwrap();

        assert_eq!(
            log.tail(None).await.unwrap(),
            vec![LogListing::Raw {
                raw: "garbage".to_string()
            }]
        );
    }

    #[test]
    fn test_summary_exactly_five() {
        let codes: Vec<String> = (1..=5).map(|i| format!("C{i}")).collect();
        assert_eq!(summarize_codes(&codes), "C1,C2,C3,C4,C5");
    }
}
