use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A send attempt that never produced an HTTP status.
pub const NETWORK_FAILURE_STATUS: i32 = -1;

/// Batches that already failed this many times are dropped instead of requeued.
pub const MAX_RETRY_ATTEMPTS: u32 = 5;

const RETRYABLE_STATUS_CODES: &[i32] = &[
    NETWORK_FAILURE_STATUS,
    408,
    429,
    500,
    502,
    503,
    504,
    522,
    524,
    599,
];

/// Transient failures worth another attempt; everything else non-2xx is a
/// permanent rejection.
pub fn is_retryable_status(status_code: i32) -> bool {
    RETRYABLE_STATUS_CODES.contains(&status_code)
}

pub fn is_success_status(status_code: i32) -> bool {
    (200..300).contains(&status_code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    #[default]
    ExponentialBackoff,
    LinearBackoff,
    FixedDelay,
}

/// Delay policy for socket-level retries inside a single transport call.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: RetryStrategy,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            strategy: RetryStrategy::ExponentialBackoff,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.config.base_delay.as_millis() as u64;
        let base_delay = match self.config.strategy {
            RetryStrategy::ExponentialBackoff => {
                let multiplier = 2_u64.saturating_pow(attempt);
                Duration::from_millis(base_ms.saturating_mul(multiplier))
            }
            RetryStrategy::LinearBackoff => {
                Duration::from_millis(base_ms.saturating_mul(attempt as u64 + 1))
            }
            RetryStrategy::FixedDelay => self.config.base_delay,
        };

        let capped_delay = std::cmp::min(base_delay, self.config.max_delay);

        if self.config.jitter {
            Self::apply_jitter(capped_delay)
        } else {
            capped_delay
        }
    }

    fn apply_jitter(delay: Duration) -> Duration {
        let mut rng = rand::rng();
        let jitter_factor = rng.random_range(0.5..1.5); // ±50% jitter
        let jittered_millis = (delay.as_millis() as f64 * jitter_factor) as u64;
        Duration::from_millis(jittered_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        for code in [NETWORK_FAILURE_STATUS, 408, 429, 500, 503, 599] {
            assert!(is_retryable_status(code), "{code} should be retryable");
        }
        for code in [400, 401, 403, 404, 413, 501] {
            assert!(!is_retryable_status(code), "{code} should not be retryable");
        }
        assert!(is_success_status(200));
        assert!(is_success_status(202));
        assert!(!is_success_status(302));
        assert!(!is_success_status(NETWORK_FAILURE_STATUS));
    }

    #[test]
    fn test_exponential_backoff_timing() {
        let policy = RetryPolicy::new(RetryConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            strategy: RetryStrategy::ExponentialBackoff,
            jitter: false,
        });

        let delays: Vec<_> = (0..5).map(|attempt| policy.calculate_delay(attempt)).collect();

        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[2], Duration::from_millis(400));
        assert_eq!(delays[3], Duration::from_millis(800));
        assert_eq!(delays[4], Duration::from_millis(1600));
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy::new(RetryConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            strategy: RetryStrategy::ExponentialBackoff,
            jitter: false,
        });

        assert_eq!(policy.calculate_delay(10), Duration::from_secs(5));
        assert_eq!(policy.calculate_delay(70), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_within_half_band() {
        let policy = RetryPolicy::new(RetryConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            strategy: RetryStrategy::ExponentialBackoff,
            jitter: true,
        });

        for _ in 0..50 {
            let delay = policy.calculate_delay(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(300));
        }
    }

    #[test]
    fn test_linear_and_fixed_strategies() {
        let linear = RetryPolicy::new(RetryConfig {
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            strategy: RetryStrategy::LinearBackoff,
            jitter: false,
        });
        assert_eq!(linear.calculate_delay(0), Duration::from_millis(50));
        assert_eq!(linear.calculate_delay(3), Duration::from_millis(200));

        let fixed = RetryPolicy::new(RetryConfig {
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            strategy: RetryStrategy::FixedDelay,
            jitter: false,
        });
        assert_eq!(fixed.calculate_delay(7), Duration::from_millis(50));
    }
}
