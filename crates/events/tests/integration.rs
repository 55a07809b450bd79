//! Integration tests for events

use kiln_events::*;
use kiln_types::BuildStep;
use std::time::Duration;

#[tokio::test]
async fn test_sender_emits_with_meta() {
    let (tx, mut rx) = channel();

    tx.emit_error("test error");
    tx.emit_debug("test debug");

    let first = rx.recv().await.unwrap();
    assert!(matches!(
        first.event,
        AppEvent::General(GeneralEvent::Error { .. })
    ));
    assert_eq!(first.meta.level, EventLevel::Error);
    assert_eq!(first.meta.source, EventSource::GENERAL);

    let second = rx.recv().await.unwrap();
    assert_eq!(second.meta.level, EventLevel::Debug);
}

#[tokio::test]
async fn test_dropped_receiver() {
    let (tx, rx) = channel();
    drop(rx);

    // Should not panic when receiver is dropped
    tx.emit_warning("ignored");
}

#[tokio::test]
async fn test_correlated_emitter_tags_session() {
    let (tx, mut rx) = channel();
    let emitter = CorrelatedEmitter::new(Some(tx), "session-1");

    emitter.emit(AppEvent::Build(BuildEvent::StepStarted {
        node: "a/1.0.0".to_string(),
        step: BuildStep::Configure,
    }));

    let message = rx.recv().await.unwrap();
    assert_eq!(message.meta.correlation_id.as_deref(), Some("session-1"));
    assert_eq!(message.meta.source, EventSource::BUILD);
}

#[test]
fn test_emitter_without_sender_is_silent() {
    let emitter = CorrelatedEmitter::new(None, "nobody");
    emitter.emit_operation_started("resolve");
}

#[test]
fn test_failure_levels() {
    let failed = AppEvent::Build(BuildEvent::NodeFailed {
        node: "b/1.0.0".to_string(),
        step: BuildStep::Build,
        failure: FailureContext::new(Some("build.step_failed"), "boom", None::<String>, false),
    });
    assert_eq!(failed.log_level(), tracing::Level::ERROR);

    let skipped = AppEvent::Build(BuildEvent::NodeSkipped {
        node: "a/1.0.0".to_string(),
        dependency: "b/1.0.0".to_string(),
    });
    assert_eq!(skipped.log_level(), tracing::Level::WARN);

    let done = AppEvent::Build(BuildEvent::SessionCompleted {
        session_id: "s".to_string(),
        installed: 3,
        failed: 0,
        steps_executed: 15,
        duration: Duration::from_secs(1),
    });
    assert_eq!(done.log_level(), tracing::Level::INFO);
    assert_eq!(done.log_target(), "kiln::events::build");
}

#[test]
fn test_event_serialization_is_tagged() {
    let event = AppEvent::Cache(CacheEvent::Lookup {
        identity: "abc".to_string(),
        hit: true,
    });
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["domain"], "cache");
    assert_eq!(json["event"]["type"], "lookup");
}
