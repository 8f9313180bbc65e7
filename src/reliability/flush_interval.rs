use crate::flush::Clock;
use std::sync::Arc;
use std::time::Duration;

pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1_000);
pub const MAX_FLUSH_INTERVAL: Duration = Duration::from_millis(60_000);

/// Adaptive backoff between scheduled flushes.
///
/// Pure policy: no timers, no I/O. The interval doubles on failure and halves
/// on success, always staying within `[min, max]`. Independently of the
/// interval, `max` also acts as a failsafe: a flush is due at least once per
/// `max` since the last attempt.
pub struct FlushInterval {
    clock: Arc<dyn Clock>,
    min_ms: i64,
    max_ms: i64,
    current_ms: i64,
    last_attempt_ms: i64,
}

impl FlushInterval {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_bounds(clock, MIN_FLUSH_INTERVAL, MAX_FLUSH_INTERVAL)
    }

    pub fn with_bounds(clock: Arc<dyn Clock>, min: Duration, max: Duration) -> Self {
        let min_ms = (min.as_millis() as i64).max(1);
        let max_ms = (max.as_millis() as i64).max(min_ms);
        let last_attempt_ms = clock.now_ms();

        Self {
            clock,
            min_ms,
            max_ms,
            current_ms: min_ms,
            last_attempt_ms,
        }
    }

    pub fn mark_flush_attempt(&mut self) {
        self.last_attempt_ms = self.clock.now_ms();
    }

    pub fn adjust_for_success(&mut self) {
        self.current_ms = (self.current_ms / 2).max(self.min_ms);
    }

    pub fn adjust_for_failure(&mut self) {
        self.current_ms = self.current_ms.saturating_mul(2).min(self.max_ms);
    }

    pub fn current_interval(&self) -> Duration {
        Duration::from_millis(self.current_ms as u64)
    }

    pub fn has_completely_recovered_from_backoff(&self) -> bool {
        self.current_ms == self.min_ms
    }

    pub fn has_reached_max_interval(&self) -> bool {
        self.elapsed_ms() >= self.max_ms
    }

    pub fn time_till_max_interval(&self) -> Duration {
        Self::non_negative(self.max_ms - self.elapsed_ms())
    }

    /// Cooldown before the next scheduled flush may run.
    pub fn time_until_next_flush(&self) -> Duration {
        Self::non_negative(self.current_ms - self.elapsed_ms())
    }

    fn elapsed_ms(&self) -> i64 {
        self.clock.now_ms() - self.last_attempt_ms
    }

    fn non_negative(ms: i64) -> Duration {
        Duration::from_millis(ms.max(0) as u64)
    }
}

impl std::fmt::Debug for FlushInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushInterval")
            .field("current_ms", &self.current_ms)
            .field("min_ms", &self.min_ms)
            .field("max_ms", &self.max_ms)
            .field("last_attempt_ms", &self.last_attempt_ms)
            .finish()
    }
}
