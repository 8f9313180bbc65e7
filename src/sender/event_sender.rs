use super::notifications::{Notification, NotificationEmitter, NotificationName};
use super::request::{DEFAULT_TRANSPORT_RETRIES, LogEventRequest, SdkMetadata, SendResult};
use super::strategy::{BeaconDelivery, DeliveryStrategy, ReliableDelivery};
use super::transport::{BeaconTransport, RequestTransport};
use crate::buffer::Batch;
use crate::domain::Event;
use crate::host::UnloadProbe;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub sdk_key: String,
    pub url: Url,
    pub sdk_metadata: SdkMetadata,
    pub transport_retries: u32,
}

impl SenderConfig {
    pub fn new(sdk_key: impl Into<String>, url: Url) -> Self {
        Self {
            sdk_key: sdk_key.into(),
            url,
            sdk_metadata: SdkMetadata::default(),
            transport_retries: DEFAULT_TRANSPORT_RETRIES,
        }
    }
}

/// Sends one batch through whichever transport fits the host's current state.
///
/// The sender never touches the queue and never fails: every transport error
/// is folded into a `SendResult` with status `-1`.
pub struct EventSender {
    config: SenderConfig,
    reliable: ReliableDelivery,
    beacon: Option<BeaconDelivery>,
    unload_probe: Arc<dyn UnloadProbe>,
    emitter: Arc<NotificationEmitter>,
    has_transport_override: bool,
}

impl EventSender {
    pub fn new(
        config: SenderConfig,
        transport: Arc<dyn RequestTransport>,
        unload_probe: Arc<dyn UnloadProbe>,
    ) -> Self {
        Self {
            config,
            reliable: ReliableDelivery::new(transport),
            beacon: None,
            unload_probe,
            emitter: Arc::new(NotificationEmitter::new()),
            has_transport_override: false,
        }
    }

    pub fn with_beacon(mut self, beacon: Arc<dyn BeaconTransport>) -> Self {
        self.beacon = Some(BeaconDelivery::new(beacon));
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<NotificationEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Mark the reliable transport as caller-supplied. The beacon is never
    /// used while an override is in place.
    pub fn with_transport_override(mut self, has_override: bool) -> Self {
        self.has_transport_override = has_override;
        self
    }

    pub fn emitter(&self) -> &Arc<NotificationEmitter> {
        &self.emitter
    }

    pub fn sdk_key(&self) -> &str {
        &self.config.sdk_key
    }

    pub async fn send_batch(&self, batch: &Batch) -> SendResult {
        debug!(
            batch_id = batch.id(),
            size = batch.size(),
            attempts = batch.attempts(),
            "Sending batch"
        );
        self.send_events(batch.events()).await
    }

    pub async fn send_events(&self, events: &[Event]) -> SendResult {
        if events.is_empty() {
            return SendResult {
                success: true,
                status_code: 0,
            };
        }

        self.emitter.emit(Notification {
            name: NotificationName::PreLogsFlushed,
            events,
        });

        let request = LogEventRequest::new(
            self.config.sdk_key.clone(),
            self.config.url.clone(),
            events.to_vec(),
            self.config.sdk_metadata.clone(),
        )
        .with_retries(self.config.transport_retries);

        let strategy = self.select_strategy();
        let result = match strategy.deliver(&request).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    strategy = strategy.name(),
                    events = events.len(),
                    error = %e,
                    "Event delivery failed"
                );
                SendResult::failure()
            }
        };

        if result.success {
            self.emitter.emit(Notification {
                name: NotificationName::LogsFlushed,
                events,
            });
        } else {
            debug!(
                strategy = strategy.name(),
                status_code = result.status_code,
                "Event delivery was not accepted"
            );
        }

        result
    }

    fn select_strategy(&self) -> &dyn DeliveryStrategy {
        if let Some(beacon) = &self.beacon
            && !self.has_transport_override
            && self.unload_probe.is_unloading()
            && beacon.is_available()
        {
            return beacon;
        }
        &self.reliable
    }
}

impl std::fmt::Debug for EventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender")
            .field("config", &self.config)
            .field("has_beacon", &self.beacon.is_some())
            .field("has_transport_override", &self.has_transport_override)
            .finish()
    }
}
