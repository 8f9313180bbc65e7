use super::request::{BEACON_SUCCESS_STATUS, LogEventRequest, SendResult};
use super::transport::{BeaconTransport, RequestTransport, TransportError};
use crate::reliability::{NETWORK_FAILURE_STATUS, is_success_status};
use async_trait::async_trait;
use std::sync::Arc;

/// One way of getting a request to the server.
#[async_trait]
pub trait DeliveryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, request: &LogEventRequest) -> Result<SendResult, TransportError>;
}

/// Request/response delivery. Success is a 2xx answer.
pub struct ReliableDelivery {
    transport: Arc<dyn RequestTransport>,
}

impl ReliableDelivery {
    pub fn new(transport: Arc<dyn RequestTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl DeliveryStrategy for ReliableDelivery {
    fn name(&self) -> &'static str {
        "reliable"
    }

    async fn deliver(&self, request: &LogEventRequest) -> Result<SendResult, TransportError> {
        let response = self.transport.post(request).await?;
        let status_code = i32::from(response.code);

        Ok(SendResult {
            success: is_success_status(status_code),
            status_code,
        })
    }
}

/// Fire-and-forget delivery. A dispatched request counts as a 200.
pub struct BeaconDelivery {
    transport: Arc<dyn BeaconTransport>,
}

impl BeaconDelivery {
    pub fn new(transport: Arc<dyn BeaconTransport>) -> Self {
        Self { transport }
    }

    pub fn is_available(&self) -> bool {
        self.transport.is_beacon_supported()
    }
}

#[async_trait]
impl DeliveryStrategy for BeaconDelivery {
    fn name(&self) -> &'static str {
        "beacon"
    }

    async fn deliver(&self, request: &LogEventRequest) -> Result<SendResult, TransportError> {
        let dispatched = self.transport.beacon(request).await?;

        Ok(SendResult {
            success: dispatched,
            status_code: if dispatched {
                BEACON_SUCCESS_STATUS
            } else {
                NETWORK_FAILURE_STATUS
            },
        })
    }
}
