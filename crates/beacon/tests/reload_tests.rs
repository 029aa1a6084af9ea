//! Registry reloads against a running engine

mod common;

use beacon::{ConfigError, Engine, EngineError, Health, HistoryStore, MemoryHistory, Registry, TargetId};
use common::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_removed_target_stops_alerting_and_restarts_unknown() {
    init_tracing();
    let prober = Arc::new(ScriptedProber::new(down("refused")));
    let channel = RecordingChannel::new("ops");
    let store = Arc::new(MemoryHistory::new(64));
    let mut engine = Engine::new(prober, store.clone(), vec![channel.clone()], config());
    let mut alerts = engine.subscribe_alerts();

    let a = http("a", 10, 1, 1);
    let b = http("b", 10, 1, 1);
    engine.start(Registry::new([a.clone(), b.clone()]).unwrap()).await.unwrap();

    alerts.recv().await.unwrap();
    alerts.recv().await.unwrap();
    assert_eq!(channel.sent_for("b").len(), 1);

    let diff = engine.reload(Registry::new([a.clone()]).unwrap()).await.unwrap();
    assert_eq!(diff.removed, vec![TargetId::from("b")]);
    assert_eq!(diff.unchanged, 1);
    assert!(engine.status(&TargetId::from("b")).is_none());
    assert_eq!(store.current_state(&TargetId::from("b")).await.unwrap(), None);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(channel.sent_for("b").len(), 1);

    engine.reload(Registry::new([a, b]).unwrap()).await.unwrap();
    let status = engine.status(&TargetId::from("b")).unwrap();
    assert_eq!(status.state.health, Health::Unknown);
    assert_eq!(status.state.consecutive_failures, 0);

    let record = alerts.recv().await.unwrap();
    assert_eq!(record.target, TargetId::from("b"));
    assert_eq!(record.health, Health::Down);
    engine.stop().await;

    let sent = channel.sent_for("b");
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].previous, Health::Unknown);
    assert_eq!(channel.sent_for("a").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_changed_target_keeps_counters() {
    let prober = Arc::new(ScriptedProber::new(down("refused")));
    let channel = RecordingChannel::new("ops");
    let mut engine = Engine::new(prober, Arc::new(MemoryHistory::new(64)), vec![channel.clone()], config());
    let mut alerts = engine.subscribe_alerts();

    engine.start(Registry::new([http("api", 10, 3, 1)]).unwrap()).await.unwrap();

    // t=0 and t=10 fail, leaving one failure to go
    tokio::time::sleep(Duration::from_secs(15)).await;
    let status = engine.status(&TargetId::from("api")).unwrap();
    assert_eq!(status.state.consecutive_failures, 2);

    let faster = http("api", 2, 3, 1).with_timeout(Duration::from_secs(1));
    let diff = engine.reload(Registry::new([faster]).unwrap()).await.unwrap();
    assert_eq!(diff.changed.len(), 1);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let status = engine.status(&TargetId::from("api")).unwrap();
    assert_eq!(status.target.interval, Duration::from_secs(2));
    assert_eq!(status.state.consecutive_failures, 2);

    // The rebuilt timer fires two seconds after the reload
    let record = alerts.recv().await.unwrap();
    assert_eq!(record.health, Health::Down);
    assert_eq!(channel.sent().len(), 1);
    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_reload_keeps_last_good_registry() {
    let prober = Arc::new(ScriptedProber::new(up()));
    let mut engine = Engine::new(
        prober,
        Arc::new(MemoryHistory::new(8)),
        vec![RecordingChannel::new("ops")],
        config(),
    );
    engine.start(Registry::new([http("web", 10, 1, 1)]).unwrap()).await.unwrap();

    let misrouted = http("other", 10, 1, 1).with_channels(["ops", "pager"]);
    let err = engine.reload(Registry::new([misrouted]).unwrap()).await.unwrap_err();
    assert!(matches!(err, EngineError::Config(ConfigError::UnknownChannel { ref channel, .. }) if channel == "pager"));

    let registry = engine.registry();
    assert!(registry.contains(&TargetId::from("web")));
    assert!(!registry.contains(&TargetId::from("other")));
    assert!(engine.status(&TargetId::from("web")).is_some());
    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_reload_requires_running_engine() {
    let prober = Arc::new(ScriptedProber::new(up()));
    let mut engine = Engine::new(prober, Arc::new(MemoryHistory::new(8)), Vec::new(), config());

    let err = engine.reload(Registry::empty()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotRunning));
}
