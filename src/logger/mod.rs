pub mod dedup;
pub mod event_logger;
pub mod failure_buffer;
pub mod non_exposed;
pub mod registry;

pub use dedup::{DEDUPE_WINDOW, ExposureDeduper, MAX_DEDUPE_KEYS, exposure_dedupe_key};
pub use event_logger::{EventLogger, LoggerContext, LoggerOptions, LoggingEnabledOption};
pub use failure_buffer::{FailureBuffer, MAX_FAILED_LOGS, failed_logs_storage_key};
pub use non_exposed::NonExposedChecks;
pub use registry::LoggerRegistry;
