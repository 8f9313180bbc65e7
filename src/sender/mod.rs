pub mod beacon;
pub mod client;
pub mod event_sender;
pub mod notifications;
pub mod request;
pub mod serialization;
pub mod strategy;
pub mod transport;

pub use beacon::HttpBeacon;
pub use client::{ClientStats, ConnectionStats, HttpTransport, TransportConfig};
pub use event_sender::{EventSender, SenderConfig};
pub use notifications::{Notification, NotificationEmitter, NotificationListener, NotificationName};
pub use request::{
    BEACON_SUCCESS_STATUS, Credentials, DEFAULT_TRANSPORT_RETRIES, LogEventPayload,
    LogEventRequest, SdkMetadata, SendResult, TransportResponse,
};
pub use serialization::{EncodedPayload, PayloadSerializer, SerializationError};
pub use strategy::{BeaconDelivery, DeliveryStrategy, ReliableDelivery};
pub use transport::{BeaconTransport, RequestTransport, TransportError};
