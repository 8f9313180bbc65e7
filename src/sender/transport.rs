use super::request::{LogEventRequest, TransportResponse};
use super::serialization::SerializationError;
use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] SerializationError),
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(String),
    #[error("Beacon unavailable: {0}")]
    BeaconUnavailable(String),
    #[error("Transport failure: {0}")]
    Failure(String),
}

impl TransportError {
    /// Errors that may clear up on their own: timeouts and connection trouble.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::RequestError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            TransportError::Failure(_) => true,
            _ => false,
        }
    }
}

/// Request/response transport. One call is one logical delivery; any
/// socket-level retrying happens inside the implementation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RequestTransport: Send + Sync {
    async fn post(&self, request: &LogEventRequest) -> Result<TransportResponse, TransportError>;
}

/// Best-effort transport for use while the host is going away. It can only
/// report whether the request was handed off, never the server's answer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BeaconTransport: Send + Sync {
    fn is_beacon_supported(&self) -> bool;

    async fn beacon(&self, request: &LogEventRequest) -> Result<bool, TransportError>;
}
