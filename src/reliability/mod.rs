pub mod flush_interval;
pub mod retry;

pub use flush_interval::{FlushInterval, MAX_FLUSH_INTERVAL, MIN_FLUSH_INTERVAL};
pub use retry::{
    MAX_RETRY_ATTEMPTS, NETWORK_FAILURE_STATUS, RetryConfig, RetryPolicy, RetryStrategy,
    is_retryable_status, is_success_status,
};
