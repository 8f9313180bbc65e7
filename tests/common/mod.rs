#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rask_event_logger::flush::{FlushConfig, FlushCoordinator, ManualClock, ManualScheduler};
use rask_event_logger::host::HostLifecycle;
use rask_event_logger::logger::{
    EventLogger, LoggerContext, LoggerOptions, LoggerRegistry, LoggingEnabledOption,
};
use rask_event_logger::sender::{
    BeaconTransport, EventSender, LogEventRequest, RequestTransport, SenderConfig,
    TransportError, TransportResponse,
};
use rask_event_logger::storage::InMemoryStorage;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

pub const SDK_KEY: &str = "client-test-key";
pub const START_MS: i64 = 1_700_000_000_000;

pub fn endpoint() -> Url {
    Url::parse("https://events.example.com/v1/rgstr").unwrap()
}

/// Request transport that answers from a script and records what it saw.
///
/// Status codes are taken from the front of the script, then `default_code`.
/// Any request carrying an event named in `failing_events` gets `failing_code`.
pub struct ScriptedTransport {
    default_code: u16,
    script: Mutex<VecDeque<u16>>,
    failing_events: Mutex<HashSet<String>>,
    failing_code: u16,
    requests: Mutex<Vec<LogEventRequest>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedTransport {
    pub fn always(code: u16) -> Self {
        Self {
            default_code: code,
            script: Mutex::new(VecDeque::new()),
            failing_events: Mutex::new(HashSet::new()),
            failing_code: 400,
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn scripted(codes: impl IntoIterator<Item = u16>, then: u16) -> Self {
        let transport = Self::always(then);
        transport.script.lock().extend(codes);
        transport
    }

    /// Requests block until permits are added to the returned semaphore.
    pub fn gated(code: u16) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let transport = Self {
            gate: Some(gate.clone()),
            ..Self::always(code)
        };
        (transport, gate)
    }

    pub fn fail_events_named(self, name: &str, code: u16) -> Self {
        self.failing_events.lock().insert(name.to_string());
        Self {
            failing_code: code,
            ..self
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<LogEventRequest> {
        self.requests.lock().clone()
    }

    pub fn sent_event_names(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .flat_map(|r| r.data.events.iter().map(|e| e.event_name.clone()))
            .collect()
    }

    fn next_code(&self, request: &LogEventRequest) -> u16 {
        let failing = self.failing_events.lock();
        if request
            .data
            .events
            .iter()
            .any(|e| failing.contains(&e.event_name))
        {
            return self.failing_code;
        }
        self.script.lock().pop_front().unwrap_or(self.default_code)
    }
}

#[async_trait]
impl RequestTransport for ScriptedTransport {
    async fn post(&self, request: &LogEventRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push(request.clone());

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| TransportError::Failure(e.to_string()))?
                .forget();
        }

        Ok(TransportResponse {
            code: self.next_code(request),
            body: None,
        })
    }
}

/// Beacon that accepts every hand-off and counts them.
#[derive(Default)]
pub struct CountingBeacon {
    pub supported: bool,
    sent: AtomicUsize,
}

impl CountingBeacon {
    pub fn supported() -> Self {
        Self {
            supported: true,
            sent: AtomicUsize::new(0),
        }
    }

    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BeaconTransport for CountingBeacon {
    fn is_beacon_supported(&self) -> bool {
        self.supported
    }

    async fn beacon(&self, _request: &LogEventRequest) -> Result<bool, TransportError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

pub struct CoordinatorHarness {
    pub coordinator: FlushCoordinator,
    pub scheduler: Arc<ManualScheduler>,
    pub clock: Arc<ManualClock>,
    pub transport: Arc<ScriptedTransport>,
}

pub fn coordinator_harness(transport: ScriptedTransport, config: FlushConfig) -> CoordinatorHarness {
    let clock = Arc::new(ManualClock::new(START_MS));
    let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
    let transport = Arc::new(transport);

    let sender = EventSender::new(
        SenderConfig::new(SDK_KEY, endpoint()),
        transport.clone(),
        Arc::new(HostLifecycle::default()),
    );
    let coordinator = FlushCoordinator::new(config, Arc::new(sender), scheduler.clone(), clock.clone());

    CoordinatorHarness {
        coordinator,
        scheduler,
        clock,
        transport,
    }
}

pub fn flush_config(batch_size: usize) -> FlushConfig {
    FlushConfig {
        batch_size,
        ..FlushConfig::default()
    }
}

pub struct LoggerHarness {
    pub logger: EventLogger,
    pub lifecycle: Arc<HostLifecycle>,
    pub registry: Arc<LoggerRegistry>,
    pub storage: Arc<InMemoryStorage>,
    pub scheduler: Arc<ManualScheduler>,
    pub clock: Arc<ManualClock>,
    pub transport: Arc<ScriptedTransport>,
}

pub fn logger_harness(transport: ScriptedTransport, mode: LoggingEnabledOption) -> LoggerHarness {
    logger_harness_with_storage(transport, mode, Arc::new(InMemoryStorage::new()))
}

pub fn logger_harness_with_storage(
    transport: ScriptedTransport,
    mode: LoggingEnabledOption,
    storage: Arc<InMemoryStorage>,
) -> LoggerHarness {
    let clock = Arc::new(ManualClock::new(START_MS));
    let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
    let transport = Arc::new(transport);
    let lifecycle = Arc::new(HostLifecycle::new(true));
    let registry = Arc::new(LoggerRegistry::new());

    let sender = EventSender::new(
        SenderConfig::new(SDK_KEY, endpoint()),
        transport.clone(),
        lifecycle.clone(),
    );
    let context = LoggerContext::new(lifecycle.clone(), storage.clone())
        .with_scheduler(scheduler.clone())
        .with_clock(clock.clone())
        .with_registry(registry.clone());

    let logger = EventLogger::new(
        LoggerOptions {
            logging_enabled: mode,
            ..LoggerOptions::default()
        },
        sender,
        context,
    );

    LoggerHarness {
        logger,
        lifecycle,
        registry,
        storage,
        scheduler,
        clock,
        transport,
    }
}

/// Yield to spawned tasks until the transport has seen `count` requests.
pub async fn wait_for_requests(transport: &ScriptedTransport, count: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while transport.request_count() < count {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "expected {count} requests, saw {}",
            transport.request_count()
        )
    });
}

/// Give spawned tasks a chance to run.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
