//! Domain layer for rask-event-logger.
//!
//! Contains the canonical types shared across all modules:
//! - `Event`: The pipeline's core data type, immutable once normalized
//! - `EventUser`: User context attached to an event

pub mod event;
pub mod hashing;

pub use event::{
    CONFIG_EXPOSURE_EVENT, Event, EventUser, GATE_EXPOSURE_EVENT, LAYER_EXPOSURE_EVENT,
    NON_EXPOSED_CHECKS_EVENT,
};
pub use hashing::{djb2, user_storage_key};
