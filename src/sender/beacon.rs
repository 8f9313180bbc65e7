use super::client::HttpTransport;
use super::request::LogEventRequest;
use super::transport::{BeaconTransport, RequestTransport, TransportError};
use async_trait::async_trait;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Fire-and-forget delivery: hands the request to a detached task and
/// reports only whether the hand-off happened.
#[derive(Debug, Clone)]
pub struct HttpBeacon {
    transport: HttpTransport,
}

impl HttpBeacon {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl BeaconTransport for HttpBeacon {
    fn is_beacon_supported(&self) -> bool {
        Handle::try_current().is_ok()
    }

    async fn beacon(&self, request: &LogEventRequest) -> Result<bool, TransportError> {
        let handle = Handle::try_current()
            .map_err(|e| TransportError::BeaconUnavailable(e.to_string()))?;

        // A beacon gets one shot; nobody is around to wait for retries.
        let request = request.clone().with_retries(0);
        let transport = self.transport.clone();
        let events = request.event_count();

        handle.spawn(async move {
            match transport.post(&request).await {
                Ok(response) => debug!(status = response.code, events, "Beacon delivered"),
                Err(e) => warn!(error = %e, events, "Beacon delivery failed"),
            }
        });

        Ok(true)
    }
}
