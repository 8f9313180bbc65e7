use super::dedup::{DEDUPE_WINDOW, ExposureDeduper, MAX_DEDUPE_KEYS, exposure_dedupe_key};
use super::failure_buffer::{FailureBuffer, MAX_FAILED_LOGS};
use super::non_exposed::NonExposedChecks;
use super::registry::LoggerRegistry;
use crate::domain::Event;
use crate::flush::{
    Clock, FlushConfig, FlushCoordinator, Scheduler, SystemClock, TokioScheduler,
};
use crate::host::{HostLifecycle, Visibility};
use crate::sender::EventSender;
use crate::storage::StorageProvider;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingEnabledOption {
    /// Events are persisted locally instead of sent.
    Disabled,
    #[default]
    InteractiveOnly,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplayTrigger {
    Startup,
    Foreground,
}

#[derive(Debug, Clone)]
pub struct LoggerOptions {
    pub logging_enabled: LoggingEnabledOption,
    pub dedupe_window: Duration,
    pub max_dedupe_keys: usize,
    pub max_failed_logs: usize,
    pub flush: FlushConfig,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            logging_enabled: LoggingEnabledOption::default(),
            dedupe_window: DEDUPE_WINDOW,
            max_dedupe_keys: MAX_DEDUPE_KEYS,
            max_failed_logs: MAX_FAILED_LOGS,
            flush: FlushConfig::default(),
        }
    }
}

/// Host-side collaborators of a logger.
#[derive(Clone)]
pub struct LoggerContext {
    pub lifecycle: Arc<HostLifecycle>,
    pub storage: Arc<dyn StorageProvider>,
    pub scheduler: Arc<dyn Scheduler>,
    pub clock: Arc<dyn Clock>,
    pub registry: Option<Arc<LoggerRegistry>>,
}

impl LoggerContext {
    pub fn new(lifecycle: Arc<HostLifecycle>, storage: Arc<dyn StorageProvider>) -> Self {
        Self {
            lifecycle,
            storage,
            scheduler: Arc::new(TokioScheduler),
            clock: Arc::new(SystemClock),
            registry: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_registry(mut self, registry: Arc<LoggerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }
}

struct LoggerInner {
    coordinator: FlushCoordinator,
    lifecycle: Arc<HostLifecycle>,
    clock: Arc<dyn Clock>,
    registry: Option<Arc<LoggerRegistry>>,
    failure_buffer: Arc<FailureBuffer>,
    deduper: Mutex<ExposureDeduper>,
    non_exposed: Arc<NonExposedChecks>,
    logging_enabled: RwLock<LoggingEnabledOption>,
    started: AtomicBool,
}

/// Entry point for producers.
///
/// `enqueue` never blocks and never fails. Exposures are deduplicated,
/// admission follows the logging mode, and while logging is disabled events
/// go to the failure buffer instead of the network.
#[derive(Clone)]
pub struct EventLogger {
    inner: Arc<LoggerInner>,
}

impl EventLogger {
    pub fn new(options: LoggerOptions, sender: EventSender, context: LoggerContext) -> Self {
        let sdk_key = sender.sdk_key().to_string();
        let coordinator = FlushCoordinator::new(
            options.flush.clone(),
            Arc::new(sender),
            context.scheduler,
            Arc::clone(&context.clock),
        );

        let non_exposed = Arc::new(NonExposedChecks::new());
        let checks = Arc::clone(&non_exposed);
        coordinator.set_prepare_hook(Arc::new(move || checks.take_summary_event()));

        let inner = LoggerInner {
            coordinator,
            lifecycle: context.lifecycle,
            clock: context.clock,
            registry: context.registry,
            failure_buffer: Arc::new(FailureBuffer::new(
                context.storage,
                &sdk_key,
                options.max_failed_logs,
            )),
            deduper: Mutex::new(ExposureDeduper::new(
                options.dedupe_window,
                options.max_dedupe_keys,
            )),
            non_exposed,
            logging_enabled: RwLock::new(options.logging_enabled),
            started: AtomicBool::new(false),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn sdk_key(&self) -> &str {
        self.inner.coordinator.sender().sdk_key()
    }

    pub fn coordinator(&self) -> &FlushCoordinator {
        &self.inner.coordinator
    }

    pub fn failure_buffer(&self) -> &Arc<FailureBuffer> {
        &self.inner.failure_buffer
    }

    pub fn logging_enabled(&self) -> LoggingEnabledOption {
        *self.inner.logging_enabled.read()
    }

    pub fn non_exposure_count(&self, name: &str) -> u64 {
        self.inner.non_exposed.count(name)
    }

    /// Register with the host, start the flush cycle and replay anything
    /// persisted by an earlier run.
    pub async fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(registry) = &self.inner.registry {
            registry.register(self.clone());
        }
        self.inner.coordinator.start_scheduled_flush_cycle();
        info!(sdk_key_hash = %crate::domain::djb2(self.sdk_key()), "Event logger started");

        self.retry_failed_logs(ReplayTrigger::Startup).await;
    }

    pub fn enqueue(&self, event: Event) {
        if event.is_exposure() && !self.should_log_exposure(&event) {
            return;
        }

        let event = event.normalized(self.inner.lifecycle.current_page().as_deref());

        match self.logging_enabled() {
            LoggingEnabledOption::Disabled => {
                self.inner.failure_buffer.stage(event);
            }
            LoggingEnabledOption::InteractiveOnly if !self.inner.lifecycle.is_interactive() => {
                debug!(event = %event.event_name, "Dropping event outside interactive host");
            }
            _ => self.inner.coordinator.add_pending(event),
        }
    }

    pub fn increment_non_exposure_count(&self, name: &str) {
        self.inner.non_exposed.increment(name);
    }

    pub async fn flush(&self) {
        self.inner.coordinator.process_manual_flush().await;
    }

    pub async fn shutdown(&self) {
        self.inner.coordinator.process_shutdown().await;
        self.inner.started.store(false, Ordering::SeqCst);

        if let Some(registry) = &self.inner.registry {
            registry.unregister(self.sdk_key());
        }
        info!(
            dropped_events = self.inner.coordinator.dropped_event_count(),
            "Event logger shut down"
        );
    }

    /// Switch the logging mode. Leaving `Disabled` replays persisted events.
    pub async fn set_logging_enabled(&self, mode: LoggingEnabledOption) {
        let previous = std::mem::replace(&mut *self.inner.logging_enabled.write(), mode);
        debug!(?previous, ?mode, "Logging mode changed");

        if previous == LoggingEnabledOption::Disabled && mode != LoggingEnabledOption::Disabled {
            self.retry_failed_logs(ReplayTrigger::Foreground).await;
        }
    }

    pub async fn on_visibility_change(&self, visibility: Visibility) {
        match visibility {
            Visibility::Background => self.flush().await,
            Visibility::Foreground => self.retry_failed_logs(ReplayTrigger::Foreground).await,
        }
    }

    fn should_log_exposure(&self, event: &Event) -> bool {
        let key = exposure_dedupe_key(self.sdk_key(), event);
        let now = self.inner.clock.now_ms();

        if self.inner.deduper.lock().check_and_record(&key, now) {
            return true;
        }

        let check_name = event
            .metadata_str("gate")
            .or_else(|| event.metadata_str("config"))
            .unwrap_or_else(|| event.event_name.clone());
        self.increment_non_exposure_count(&check_name);
        false
    }

    async fn retry_failed_logs(&self, trigger: ReplayTrigger) {
        if self.logging_enabled() == LoggingEnabledOption::Disabled {
            return;
        }

        let events = self.inner.failure_buffer.load().await;
        if events.is_empty() {
            return;
        }

        if trigger == ReplayTrigger::Startup {
            self.inner.failure_buffer.clear().await;
        }

        let count = events.len();
        let result = self.inner.coordinator.send_direct(events.clone()).await;

        if result.success {
            if trigger == ReplayTrigger::Foreground {
                self.inner.failure_buffer.remove_delivered(&events).await;
            }
            info!(events = count, ?trigger, "Replayed persisted events");
            return;
        }

        warn!(
            events = count,
            ?trigger,
            status_code = result.status_code,
            "Replay of persisted events failed"
        );
        if trigger == ReplayTrigger::Startup {
            self.inner.failure_buffer.restore(events).await;
        }
    }
}

impl std::fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogger")
            .field("logging_enabled", &self.logging_enabled())
            .field("coordinator", &self.inner.coordinator)
            .field("started", &self.inner.started.load(Ordering::SeqCst))
            .finish()
    }
}
