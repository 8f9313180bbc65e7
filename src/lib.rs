#![deny(rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_lossless,            // Infallible casts are clear enough with `as`
    clippy::cast_possible_truncation, // Millisecond durations fit comfortably in u64/i64
    clippy::cast_possible_wrap,       // Safe in non-negative contexts
    clippy::cast_precision_loss,      // Acceptable for jitter math
    clippy::cast_sign_loss,           // Safe where values are known non-negative
    clippy::missing_errors_doc,       // Internal API
    clippy::missing_panics_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. SenderConfig in sender module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

pub mod app;
pub mod buffer;
pub mod domain;
pub mod flush;
pub mod host;
pub mod logger;
pub mod reliability;
pub mod sender;
pub mod storage;

// Re-export main types for easy access
pub use app::{App, Config};
pub use domain::{Event, EventUser};
pub use flush::{FlushCoordinator, FlushType};
pub use host::{HostLifecycle, Visibility};
pub use logger::{EventLogger, LoggerContext, LoggerOptions, LoggingEnabledOption};
pub use sender::{EventSender, SenderConfig};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
