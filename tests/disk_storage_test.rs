mod common;

use common::{SDK_KEY, START_MS, ScriptedTransport, endpoint};
use rask_event_logger::domain::Event;
use rask_event_logger::flush::{ManualClock, ManualScheduler};
use rask_event_logger::host::HostLifecycle;
use rask_event_logger::logger::{
    EventLogger, FailureBuffer, LoggerContext, LoggerOptions, LoggingEnabledOption,
};
use rask_event_logger::sender::{EventSender, SenderConfig};
use rask_event_logger::storage::{DiskStorage, DiskStorageConfig, StorageProvider};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::assert_ok;

fn disk_storage(dir: &TempDir) -> Arc<DiskStorage> {
    Arc::new(DiskStorage::new(DiskStorageConfig {
        storage_path: dir.path().join("events"),
        ..DiskStorageConfig::default()
    }))
}

fn logger_on_disk(
    storage: Arc<DiskStorage>,
    transport: Arc<ScriptedTransport>,
    mode: LoggingEnabledOption,
) -> EventLogger {
    let clock = Arc::new(ManualClock::new(START_MS));
    let lifecycle = Arc::new(HostLifecycle::new(true));
    let sender = EventSender::new(
        SenderConfig::new(SDK_KEY, endpoint()),
        transport,
        lifecycle.clone(),
    );
    let context = LoggerContext::new(lifecycle, storage)
        .with_scheduler(Arc::new(ManualScheduler::new(clock.clone())))
        .with_clock(clock);

    EventLogger::new(
        LoggerOptions {
            logging_enabled: mode,
            ..LoggerOptions::default()
        },
        sender,
        context,
    )
}

#[tokio::test]
async fn test_events_persisted_while_disabled_survive_restart() {
    let dir = TempDir::new().unwrap();

    let first_transport = Arc::new(ScriptedTransport::always(200));
    let first = logger_on_disk(
        disk_storage(&dir),
        first_transport.clone(),
        LoggingEnabledOption::Disabled,
    );
    first.enqueue(Event::at("offline_purchase", 1));
    first.failure_buffer().persist().await;
    first.shutdown().await;
    assert_eq!(first_transport.request_count(), 0);

    let second_transport = Arc::new(ScriptedTransport::always(200));
    let second = logger_on_disk(
        disk_storage(&dir),
        second_transport.clone(),
        LoggingEnabledOption::Always,
    );
    second.start().await;

    assert_eq!(
        second_transport.sent_event_names(),
        vec!["offline_purchase".to_string()]
    );
    assert!(second.failure_buffer().load().await.is_empty());
    second.shutdown().await;
}

#[tokio::test]
async fn test_failure_buffer_keeps_newest_events() {
    let dir = TempDir::new().unwrap();
    let buffer = Arc::new(FailureBuffer::new(disk_storage(&dir), SDK_KEY, 3));

    for i in 0..5 {
        buffer.stage(Event::at(format!("event_{i}"), i));
    }
    buffer.persist().await;

    let names: Vec<_> = buffer
        .load()
        .await
        .into_iter()
        .map(|e| e.event_name)
        .collect();
    assert_eq!(names, vec!["event_2", "event_3", "event_4"]);
}

#[tokio::test]
async fn test_corrupt_file_is_discarded() {
    let dir = TempDir::new().unwrap();
    let storage = disk_storage(&dir);
    let buffer = FailureBuffer::new(storage.clone(), SDK_KEY, 10);

    assert_ok!(storage.set_item(buffer.storage_key(), "{not json").await);
    assert!(buffer.load().await.is_empty());

    buffer.restore(vec![Event::at("recovered", 1)]).await;
    let raw = storage.get_item(buffer.storage_key()).await.unwrap().unwrap();
    assert!(raw.contains("recovered"));
}

#[tokio::test]
async fn test_keys_are_sanitized_into_storage_dir() {
    let dir = TempDir::new().unwrap();
    let storage = disk_storage(&dir);

    assert_ok!(storage.set_item("../escape/attempt", "[]").await);

    assert!(storage.is_ready());
    assert!(dir.path().join("events").is_dir());
    assert!(!dir.path().join("escape").exists());
    assert_eq!(
        storage.get_item("../escape/attempt").await.unwrap().as_deref(),
        Some("[]")
    );
}
