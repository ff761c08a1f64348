//! Redemption integration tests.
//!
//! Exercise the coordinator end to end against the in-memory store:
//!
//! - At most one invite per code under concurrent redemption
//! - Failed sends leave the code redeemable
//! - Used codes are final
//! - Lock release on every exit path, including a panicking sender

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::TimeDelta;
use invite_redeem::{
    InviteCredentials, InviteFailure, InviteReceipt, InviteSender, RedeemConfig, RedeemError,
    RedemptionCode, RedemptionCoordinator,
    mocks::{FixedClock, MockInviteSender, MockKeyValueStore, test_time},
    coordinator::PANIC_REASON,
    oplog::{LogListing, OperationEvent},
    types::{CodeListing, CodeRecord, EmailAddress},
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

type Coordinator<I = MockInviteSender> = RedemptionCoordinator<MockKeyValueStore, I, FixedClock>;

fn credentials() -> Option<InviteCredentials> {
    InviteCredentials::from_parts(Some("acct-1".into()), Some("secret".into()))
}

fn coordinator_with<I: InviteSender>(
    store: &Arc<MockKeyValueStore>,
    sender: I,
    clock: &FixedClock,
) -> Coordinator<I> {
    RedemptionCoordinator::new(
        Arc::clone(store),
        Arc::new(sender),
        Arc::new(clock.clone()),
        credentials(),
        &RedeemConfig::default(),
    )
}

async fn seed(coordinator: &Coordinator<impl InviteSender>, code: &str) {
    coordinator
        .registry()
        .create_one(&RedemptionCode::parse(code).unwrap())
        .await
        .expect("Failed to seed code");
}

fn record(store: &MockKeyValueStore, code: &str) -> CodeRecord {
    serde_json::from_str(&store.peek(&format!("code:{code}")).expect("record missing"))
        .expect("record unparsable")
}

#[tokio::test]
async fn test_redeem_marks_code_used() {
    // Arrange
    let store = Arc::new(MockKeyValueStore::new());
    let clock = FixedClock::default();
    let sender = MockInviteSender::new();
    sender.push_response(Ok(InviteReceipt {
        message: Some("invite sent".to_string()),
        data: Some(json!({"account_invites": [{"email_address": "user@example.com"}]})),
    }));
    let coordinator = coordinator_with(&store, sender.clone(), &clock);
    seed(&coordinator, "ABC123XYZ").await;
    clock.advance(TimeDelta::minutes(10));

    // Act
    let outcome = coordinator
        .redeem("ABC123XYZ", "user@example.com", Some("198.51.100.4"))
        .await
        .expect("redemption failed");

    // Assert
    assert_eq!(outcome.code.as_str(), "ABC123XYZ");
    assert_eq!(outcome.message.as_deref(), Some("invite sent"));
    assert_eq!(sender.sent_to(), vec!["user@example.com"]);

    let stored = record(&store, "ABC123XYZ");
    assert!(stored.used);
    assert_eq!(stored.used_by.as_deref(), Some("user@example.com"));
    assert_eq!(stored.used_at, Some(test_time() + TimeDelta::minutes(10)));
    assert_eq!(stored.created_at, Some(test_time()));
    assert!(!store.contains("code_lock:ABC123XYZ"));
}

#[tokio::test]
async fn test_record_without_timestamp_is_redeemable() {
    let store = Arc::new(MockKeyValueStore::new());
    let clock = FixedClock::default();
    let sender = MockInviteSender::new();
    let coordinator = coordinator_with(&store, sender.clone(), &clock);
    store.insert_raw(
        "code:LEGACY1",
        r#"{"used":false,"usedAt":null,"usedBy":null,"batch":"2023-q4"}"#,
    );

    let listed = coordinator.registry().list().await.unwrap();
    assert!(matches!(
        &listed[..],
        [CodeListing::Record { code, record }]
            if code == "LEGACY1" && record.created_at.is_none()
    ));

    coordinator
        .redeem("LEGACY1", "user@example.com", None)
        .await
        .expect("record without createdAt should redeem");

    let stored = record(&store, "LEGACY1");
    assert!(stored.used);
    assert_eq!(stored.used_by.as_deref(), Some("user@example.com"));
    assert_eq!(stored.used_at, Some(test_time()));
    assert_eq!(stored.created_at, None);
    assert_eq!(stored.extra["batch"], "2023-q4");
    assert_eq!(sender.call_count(), 1);

    let second = coordinator
        .redeem("LEGACY1", "other@example.com", None)
        .await;
    assert_eq!(second, Err(RedeemError::AlreadyUsed));
}

#[tokio::test]
async fn test_non_object_record_is_corrupt() {
    let store = Arc::new(MockKeyValueStore::new());
    store.insert_raw("code:ARRAY1", "[]");
    let sender = MockInviteSender::new();
    let coordinator = coordinator_with(&store, sender.clone(), &FixedClock::default());

    let result = coordinator.redeem("ARRAY1", "user@example.com", None).await;

    assert_eq!(result, Err(RedeemError::CorruptRecord));
    assert_eq!(sender.call_count(), 0);
}

#[tokio::test]
async fn test_used_code_is_final() {
    let store = Arc::new(MockKeyValueStore::new());
    let clock = FixedClock::default();
    let sender = MockInviteSender::new();
    let coordinator = coordinator_with(&store, sender.clone(), &clock);
    seed(&coordinator, "ABC123XYZ").await;

    coordinator
        .redeem("ABC123XYZ", "user@example.com", None)
        .await
        .unwrap();
    let after_first = store.peek("code:ABC123XYZ");

    clock.advance(TimeDelta::hours(1));
    let second = coordinator
        .redeem("ABC123XYZ", "other@example.com", None)
        .await;

    assert_eq!(second, Err(RedeemError::AlreadyUsed));
    assert_eq!(store.peek("code:ABC123XYZ"), after_first);
    assert_eq!(sender.call_count(), 1);
}

#[tokio::test]
async fn test_concurrent_redemptions_send_once() {
    // Arrange: a slow sender keeps the first redemption inside its lock
    let store = Arc::new(MockKeyValueStore::new());
    let clock = FixedClock::default();
    let sender = MockInviteSender::new().with_latency(Duration::from_millis(200));
    let coordinator = Arc::new(coordinator_with(&store, sender.clone(), &clock));
    seed(&coordinator, "RACE01").await;

    // Act
    let attempts = 8;
    let handles: Vec<_> = (0..attempts)
        .map(|i| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .redeem("RACE01", &format!("user{i}@example.com"), None)
                    .await
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    // Assert
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let in_use = results
        .iter()
        .filter(|r| matches!(r, Err(RedeemError::InUse)))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(in_use, attempts - 1);
    assert_eq!(sender.call_count(), 1);
    assert!(record(&store, "RACE01").used);
}

#[tokio::test]
async fn test_failed_send_keeps_code_redeemable() {
    let store = Arc::new(MockKeyValueStore::new());
    let clock = FixedClock::default();
    let sender = MockInviteSender::new();
    sender.push_response(Err(InviteFailure {
        message: "Upstream timeout".to_string(),
        data: Some(json!({"status": 504})),
    }));
    let coordinator = coordinator_with(&store, sender.clone(), &clock);
    seed(&coordinator, "RETRY1").await;

    let first = coordinator.redeem("RETRY1", "user@example.com", None).await;
    assert_eq!(
        first,
        Err(RedeemError::UpstreamSendFailure {
            message: "Upstream timeout".to_string(),
            data: Some(json!({"status": 504})),
        })
    );
    assert!(!record(&store, "RETRY1").used);

    let second = coordinator.redeem("RETRY1", "user@example.com", None).await;
    assert!(second.is_ok());
    assert_eq!(sender.call_count(), 2);
}

#[tokio::test]
async fn test_validation_precedes_store_access() {
    let store = Arc::new(MockKeyValueStore::new());
    let sender = MockInviteSender::new();
    let coordinator = coordinator_with(&store, sender.clone(), &FixedClock::default());

    let too_long = "X".repeat(65);
    let cases = [
        ("ABC123", "not-an-email", RedeemError::InvalidEmail),
        ("ABC123", "a b@example.com", RedeemError::InvalidEmail),
        ("ABC123", "user@localhost", RedeemError::InvalidEmail),
        ("", "user@example.com", RedeemError::InvalidCodeFormat),
        ("bad code", "user@example.com", RedeemError::InvalidCodeFormat),
        (too_long.as_str(), "user@example.com", RedeemError::InvalidCodeFormat),
    ];

    for (code, email, expected) in cases {
        assert_eq!(coordinator.redeem(code, email, None).await, Err(expected));
    }

    assert!(store.commands().is_empty());
    assert_eq!(sender.call_count(), 0);
}

#[tokio::test]
async fn test_corrupt_record_needs_operator() {
    let store = Arc::new(MockKeyValueStore::new());
    store.insert_raw("code:BROKEN", "{not json");
    let sender = MockInviteSender::new();
    let coordinator = coordinator_with(&store, sender.clone(), &FixedClock::default());

    let result = coordinator.redeem("BROKEN", "user@example.com", None).await;

    assert_eq!(result, Err(RedeemError::CorruptRecord));
    assert_eq!(store.peek("code:BROKEN").as_deref(), Some("{not json"));
    assert_eq!(sender.call_count(), 0);
    assert!(!store.contains("code_lock:BROKEN"));
}

#[tokio::test]
async fn test_busy_lock_reports_in_use() {
    let store = Arc::new(MockKeyValueStore::new());
    let coordinator = coordinator_with(&store, MockInviteSender::new(), &FixedClock::default());
    seed(&coordinator, "HELD01").await;
    store.insert_raw("code_lock:HELD01", "someone-else");

    let result = coordinator.redeem("HELD01", "user@example.com", None).await;

    assert_eq!(result, Err(RedeemError::InUse));
    assert_eq!(
        store.peek("code_lock:HELD01").as_deref(),
        Some("someone-else")
    );
}

#[tokio::test]
async fn test_store_outage_is_reported() {
    let store = Arc::new(MockKeyValueStore::new());
    let coordinator = coordinator_with(&store, MockInviteSender::new(), &FixedClock::default());
    store.set_unavailable(true);

    let result = coordinator.redeem("ABC123", "user@example.com", None).await;
    assert!(matches!(result, Err(RedeemError::StoreUnavailable(_))));
}

#[tokio::test]
async fn test_every_attempt_logs_once() {
    let store = Arc::new(MockKeyValueStore::new());
    let coordinator = coordinator_with(&store, MockInviteSender::new(), &FixedClock::default());
    seed(&coordinator, "LOG001").await;

    coordinator
        .redeem("LOG001", "user@example.com", Some("10.1.1.1"))
        .await
        .unwrap();
    let _ = coordinator
        .redeem("LOG001", "user@example.com", Some("10.1.1.1"))
        .await;
    let _ = coordinator
        .redeem("MISSING", "user@example.com", Some("10.1.1.1"))
        .await;
    let _ = coordinator.redeem("LOG001", "nope", Some("10.1.1.1")).await;

    let tail = coordinator.log().tail(None).await.unwrap();
    let reasons: Vec<_> = tail
        .iter()
        .map(|listing| match listing {
            LogListing::Entry(entry) => match &entry.event {
                OperationEvent::RedeemFail { reason, .. } => reason.clone(),
                OperationEvent::RedeemSuccess { .. } => "success".to_string(),
                other => panic!("unexpected event {other:?}"),
            },
            LogListing::Raw { raw } => panic!("unexpected raw entry {raw}"),
        })
        .collect();

    assert_eq!(
        reasons,
        vec![
            RedeemError::InvalidCode.to_string(),
            RedeemError::AlreadyUsed.to_string(),
            "success".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_log_outage_does_not_fail_redemption() {
    let store = Arc::new(MockKeyValueStore::new());
    let coordinator = coordinator_with(&store, MockInviteSender::new(), &FixedClock::default());
    seed(&coordinator, "QUIET1").await;
    store.fail_list_writes(true);

    assert!(coordinator
        .redeem("QUIET1", "user@example.com", None)
        .await
        .is_ok());
    assert!(store.peek_list("logs").is_empty());
}

/// Sender that panics mid-send.
struct PanickingSender;

impl InviteSender for PanickingSender {
    async fn send_invite(
        &self,
        _email: &EmailAddress,
        _credentials: &InviteCredentials,
    ) -> Result<InviteReceipt, InviteFailure> {
        tokio::task::yield_now().await;
        panic!("invite client exploded");
    }
}

#[tokio::test]
async fn test_panicking_sender_still_releases_lock() {
    let store = Arc::new(MockKeyValueStore::new());
    let coordinator = Arc::new(coordinator_with(&store, PanickingSender, &FixedClock::default()));
    seed(&coordinator, "BOOM01").await;

    let task = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.redeem("BOOM01", "user@example.com", None).await })
    };

    let join = task.await;
    assert!(join.unwrap_err().is_panic());
    assert!(!store.contains("code_lock:BOOM01"));
    assert!(!record(&store, "BOOM01").used);

    let tail = coordinator.log().tail(None).await.unwrap();
    assert_eq!(tail.len(), 1);
    assert!(matches!(
        &tail[0],
        LogListing::Entry(entry) if entry.event == OperationEvent::RedeemFail {
            email: "user@example.com".to_string(),
            code: "BOOM01".to_string(),
            ip: "unknown".to_string(),
            reason: PANIC_REASON.to_string(),
        }
    ));
}
