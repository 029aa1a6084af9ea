//! Tests for the libsql history store

use beacon::{
    AlertRecord, ChannelDelivery, CheckResult, DeliveryOutcome, Health, HistoryStore, Target, TargetId,
    TargetState,
};
use chrono::{Duration, Utc};
use history::{LibsqlHistory, RetentionCleanup, RetentionPolicy, migrations, open_pool};
use tempfile::{TempDir, tempdir};

/// Helper to open a fresh database; keep the TempDir alive for the test
async fn create_test_history() -> (LibsqlHistory, TempDir) {
    let temp_dir = tempdir().unwrap();
    let history = LibsqlHistory::open(temp_dir.path().join("history.db")).await.unwrap();
    (history, temp_dir)
}

fn site() -> Target {
    Target::http("site", "https://example.com")
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("history.db");

    let pool = open_pool(&path, 2).await.unwrap();
    drop(pool);
    let pool = open_pool(&path, 2).await.unwrap();

    let conn = pool.get().await.unwrap();
    assert_eq!(migrations::current_version(&conn).await.unwrap(), 3);
}

#[tokio::test]
async fn test_append_and_read_back_newest_first() {
    let (history, _dir) = create_test_history().await;
    let target = site();
    let start = Utc::now() - Duration::minutes(5);

    history
        .append(&CheckResult::success(&target, 120, Some(200)).at(start))
        .await
        .unwrap();
    history
        .append(&CheckResult::failure(&target, "HTTP check failed with status code: 503")
            .with_status_code(503)
            .at(start + Duration::seconds(30)))
        .await
        .unwrap();

    let recent = history.recent(&target.id, 10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert!(!recent[0].is_success());
    assert_eq!(recent[0].status_code, Some(503));
    assert_eq!(recent[0].error.as_deref(), Some("HTTP check failed with status code: 503"));
    assert!(recent[1].is_success());
    assert_eq!(recent[1].latency_ms, Some(120));
    assert_eq!(recent[1].address, "https://example.com");

    let limited = history.recent(&target.id, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert!(history.recent(&TargetId::from("other"), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_latest_checks_span_targets() {
    let (history, _dir) = create_test_history().await;
    let a = Target::http("a", "https://a.example.com");
    let b = Target::tcp("b", "db.internal:5432");
    let now = Utc::now();

    history.append(&CheckResult::success(&a, 5, Some(200)).at(now - Duration::seconds(2))).await.unwrap();
    history.append(&CheckResult::success(&b, 3, None).at(now - Duration::seconds(1))).await.unwrap();

    let latest = history.latest_checks(10).await.unwrap();
    let names: Vec<_> = latest.iter().map(|c| c.target.as_str().to_string()).collect();
    assert_eq!(names, vec!["b", "a"]);
    assert_eq!(latest[0].status_code, None);
}

#[tokio::test]
async fn test_state_upsert_and_discard() {
    let (history, _dir) = create_test_history().await;
    let id = TargetId::from("site");
    assert_eq!(history.current_state(&id).await.unwrap(), None);

    let transitioned = Utc::now() - Duration::minutes(1);
    let down = TargetState {
        health: Health::Down,
        consecutive_failures: 0,
        consecutive_successes: 0,
        last_transition_at: Some(transitioned),
        last_alert_at: Some(transitioned),
    };
    history.save_state(&id, &down).await.unwrap();

    let recovering = TargetState { consecutive_successes: 1, ..down.clone() };
    history.save_state(&id, &recovering).await.unwrap();

    let stored = history.current_state(&id).await.unwrap().unwrap();
    assert_eq!(stored.health, Health::Down);
    assert_eq!(stored.consecutive_successes, 1);
    assert_eq!(
        stored.last_transition_at.map(|t| t.timestamp_millis()),
        Some(transitioned.timestamp_millis())
    );
    assert_eq!(history.states().await.unwrap().len(), 1);

    history.discard_state(&id).await.unwrap();
    assert_eq!(history.current_state(&id).await.unwrap(), None);
    assert!(history.states().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_alert_records_keep_deliveries() {
    let (history, _dir) = create_test_history().await;
    let record = AlertRecord {
        target: TargetId::from("site"),
        health: Health::Down,
        timestamp: Utc::now(),
        deliveries: vec![
            ChannelDelivery {
                channel: "telegram".into(),
                outcome: DeliveryOutcome::Delivered { attempts: 2 },
            },
            ChannelDelivery {
                channel: "email".into(),
                outcome: DeliveryOutcome::Failed { attempts: 5, error: "transport error: refused".into() },
            },
        ],
    };

    history.record_alert(&record).await.unwrap();

    let alerts = history.recent_alerts(10).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].deliveries, record.deliveries);
    assert!(alerts[0].delivered_to("telegram"));
    assert_eq!(alerts[0].failures().count(), 1);
}

#[tokio::test]
async fn test_retention_removes_only_expired_rows() {
    let (history, _dir) = create_test_history().await;
    let target = site();
    let now = Utc::now();

    history.append(&CheckResult::success(&target, 1, Some(200)).at(now - Duration::days(40))).await.unwrap();
    history.append(&CheckResult::success(&target, 2, Some(200)).at(now - Duration::days(1))).await.unwrap();
    history
        .record_alert(&AlertRecord {
            target: target.id.clone(),
            health: Health::Up,
            timestamp: now - Duration::days(45),
            deliveries: Vec::new(),
        })
        .await
        .unwrap();

    let cleanup = RetentionCleanup::new(history.clone(), RetentionPolicy::days(30));
    let report = cleanup.cleanup_expired().await.unwrap();
    assert_eq!(report.checks, 1);
    assert_eq!(report.alerts, 1);

    let remaining = history.recent(&target.id, 10).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].latency_ms, Some(2));
    assert!(history.recent_alerts(10).await.unwrap().is_empty());
}
