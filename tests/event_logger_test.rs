mod common;

use common::{
    SDK_KEY, ScriptedTransport, endpoint, flush_config, logger_harness,
    logger_harness_with_storage, wait_for_requests,
};
use rask_event_logger::domain::{
    Event, EventUser, GATE_EXPOSURE_EVENT, NON_EXPOSED_CHECKS_EVENT,
};
use rask_event_logger::host::{HostLifecycle, Visibility};
use rask_event_logger::logger::{
    EventLogger, LoggerContext, LoggerOptions, LoggingEnabledOption, failed_logs_storage_key,
};
use rask_event_logger::sender::{EventSender, SenderConfig};
use rask_event_logger::storage::{InMemoryStorage, StorageProvider};
use serde_json::json;
use std::sync::Arc;

fn gate_exposure(gate: &str) -> Event {
    Event::at(GATE_EXPOSURE_EVENT, 1)
        .with_user(EventUser::with_user_id("user-1"))
        .with_metadata("gate", gate)
        .with_metadata("gateValue", "true")
        .with_metadata("ruleID", "rule-1")
}

#[tokio::test]
async fn test_duplicate_exposures_are_summarized_on_flush() {
    let harness = logger_harness(ScriptedTransport::always(200), LoggingEnabledOption::Always);

    harness.logger.enqueue(gate_exposure("new_checkout"));
    harness.logger.enqueue(gate_exposure("new_checkout"));
    harness.logger.enqueue(gate_exposure("dark_mode"));
    harness.logger.flush().await;

    let requests = harness.transport.requests();
    assert_eq!(requests.len(), 1);

    let events = &requests[0].data.events;
    let exposures = events
        .iter()
        .filter(|e| e.event_name == GATE_EXPOSURE_EVENT)
        .count();
    assert_eq!(exposures, 2);

    let summary = events
        .iter()
        .find(|e| e.event_name == NON_EXPOSED_CHECKS_EVENT)
        .expect("summary event");
    assert_eq!(
        summary.metadata.as_ref().unwrap()["checks"],
        json!({ "new_checkout": 1 })
    );
    assert_eq!(harness.logger.non_exposure_count("new_checkout"), 0);
}

#[tokio::test]
async fn test_manual_non_exposure_counts_ride_along() {
    let harness = logger_harness(ScriptedTransport::always(200), LoggingEnabledOption::Always);

    harness.logger.increment_non_exposure_count("holdout_gate");
    harness.logger.increment_non_exposure_count("holdout_gate");
    harness.logger.enqueue(Event::at("purchase", 1));
    harness.logger.flush().await;

    assert_eq!(
        harness.transport.sent_event_names(),
        vec!["purchase".to_string(), NON_EXPOSED_CHECKS_EVENT.to_string()]
    );
}

#[tokio::test]
async fn test_disabled_logging_persists_then_replays_on_enable() {
    let harness = logger_harness(ScriptedTransport::always(200), LoggingEnabledOption::Disabled);
    harness.logger.start().await;

    harness.logger.enqueue(Event::at("purchase", 1));
    assert_eq!(harness.logger.coordinator().pending_event_count(), 0);

    let stored = harness.logger.failure_buffer().load().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].event_name, "purchase");

    let key = failed_logs_storage_key(SDK_KEY);
    assert!(harness.storage.get_item(&key).await.unwrap().is_some());

    harness
        .logger
        .set_logging_enabled(LoggingEnabledOption::Always)
        .await;

    assert_eq!(harness.transport.sent_event_names(), vec!["purchase".to_string()]);
    assert!(harness.storage.get_item(&key).await.unwrap().is_none());
    assert!(harness.logger.failure_buffer().load().await.is_empty());
}

#[tokio::test]
async fn test_failed_foreground_replay_keeps_events() {
    let harness = logger_harness(ScriptedTransport::always(503), LoggingEnabledOption::Disabled);

    harness.logger.enqueue(Event::at("purchase", 1));
    harness
        .logger
        .set_logging_enabled(LoggingEnabledOption::Always)
        .await;

    assert_eq!(harness.transport.request_count(), 1);
    assert_eq!(harness.logger.failure_buffer().load().await.len(), 1);
}

#[tokio::test]
async fn test_foreground_replay_keeps_events_persisted_while_in_flight() {
    let (transport, gate) = ScriptedTransport::gated(200);
    let harness = logger_harness(transport, LoggingEnabledOption::Disabled);

    harness.logger.enqueue(Event::at("offline_1", 1));
    harness.logger.failure_buffer().persist().await;

    let replay = tokio::spawn({
        let logger = harness.logger.clone();
        async move { logger.set_logging_enabled(LoggingEnabledOption::Always).await }
    });
    wait_for_requests(&harness.transport, 1).await;

    // Disabled again before the replay's response arrives.
    harness
        .logger
        .set_logging_enabled(LoggingEnabledOption::Disabled)
        .await;
    harness.logger.enqueue(Event::at("offline_2", 2));
    harness.logger.failure_buffer().persist().await;

    gate.add_permits(1);
    replay.await.unwrap();

    assert_eq!(harness.transport.sent_event_names(), vec!["offline_1".to_string()]);
    let names: Vec<_> = harness
        .logger
        .failure_buffer()
        .load()
        .await
        .into_iter()
        .map(|e| e.event_name)
        .collect();
    assert_eq!(names, vec!["offline_2".to_string()]);
}

#[tokio::test]
async fn test_startup_replay_restores_events_when_send_fails() {
    let storage = Arc::new(InMemoryStorage::new());
    let persisted = vec![Event::at("left_over_1", 1), Event::at("left_over_2", 2)];
    storage
        .set_item(
            &failed_logs_storage_key(SDK_KEY),
            &serde_json::to_string(&persisted).unwrap(),
        )
        .await
        .unwrap();

    let harness = logger_harness_with_storage(
        ScriptedTransport::always(500),
        LoggingEnabledOption::Always,
        storage,
    );
    harness.logger.start().await;

    assert_eq!(harness.transport.request_count(), 1);
    let restored = harness.logger.failure_buffer().load().await;
    assert_eq!(restored, persisted);
}

#[tokio::test]
async fn test_startup_replay_clears_storage_on_success() {
    let storage = Arc::new(InMemoryStorage::new());
    storage
        .set_item(
            &failed_logs_storage_key(SDK_KEY),
            &serde_json::to_string(&vec![Event::at("left_over", 1)]).unwrap(),
        )
        .await
        .unwrap();

    let harness = logger_harness_with_storage(
        ScriptedTransport::always(202),
        LoggingEnabledOption::Always,
        storage,
    );
    harness.logger.start().await;

    assert_eq!(harness.transport.sent_event_names(), vec!["left_over".to_string()]);
    assert!(harness.storage.is_empty());
}

#[tokio::test]
async fn test_background_visibility_flushes_registered_loggers() {
    let harness = logger_harness(ScriptedTransport::always(200), LoggingEnabledOption::Always);
    let dispatcher = harness.registry.attach(&harness.lifecycle);

    harness.logger.start().await;
    assert_eq!(harness.registry.len(), 1);

    harness.logger.enqueue(Event::at("page_view", 1));
    harness.lifecycle.set_visibility(Visibility::Background);

    wait_for_requests(&harness.transport, 1).await;
    assert_eq!(harness.transport.sent_event_names(), vec!["page_view".to_string()]);

    dispatcher.abort();
}

#[tokio::test]
async fn test_shutdown_flushes_and_unregisters() {
    let harness = logger_harness(ScriptedTransport::always(200), LoggingEnabledOption::Always);
    harness.logger.start().await;

    harness.logger.enqueue(Event::at("checkout", 1));
    harness.logger.shutdown().await;

    assert_eq!(harness.transport.sent_event_names(), vec!["checkout".to_string()]);
    assert!(harness.registry.is_empty());
    assert!(!harness.logger.coordinator().is_running());
}

#[tokio::test]
async fn test_current_page_and_private_attributes_are_normalized() {
    let harness = logger_harness(ScriptedTransport::always(200), LoggingEnabledOption::Always);
    harness
        .lifecycle
        .set_current_page(Some("/checkout".to_string()));

    let mut user = EventUser::with_user_id("user-1");
    user.private_attributes = Some(
        json!({ "email": "a@example.com" })
            .as_object()
            .cloned()
            .unwrap(),
    );
    harness
        .logger
        .enqueue(Event::at("purchase", 1).with_user(user));
    harness.logger.flush().await;

    let event = harness.transport.requests()[0].data.events[0].clone();
    assert!(event.user.unwrap().private_attributes.is_none());
    assert_eq!(
        event.sdk_metadata.unwrap()["currentPage"],
        json!("/checkout")
    );
}

#[test]
fn test_enqueue_without_runtime_does_not_panic() {
    let lifecycle = Arc::new(HostLifecycle::new(true));
    let transport = Arc::new(ScriptedTransport::always(200));
    let sender = EventSender::new(
        SenderConfig::new(SDK_KEY, endpoint()),
        transport.clone(),
        lifecycle.clone(),
    );
    let logger = EventLogger::new(
        LoggerOptions {
            logging_enabled: LoggingEnabledOption::Always,
            flush: flush_config(1),
            ..LoggerOptions::default()
        },
        sender,
        LoggerContext::new(lifecycle, Arc::new(InMemoryStorage::new())),
    );

    // First enqueue lands inside the quick-flush window and fills a batch.
    logger.enqueue(Event::at("purchase", 1));
    logger.enqueue(Event::at("refund", 2));

    assert_eq!(logger.coordinator().pending_event_count(), 2);
    assert_eq!(transport.request_count(), 0);
}
