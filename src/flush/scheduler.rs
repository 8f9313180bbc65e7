use super::clock::{Clock, ManualClock};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Work to run when a timer fires. The returned future is driven to
/// completion by the scheduler.
pub type TimerCallback = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send + 'static>;

/// Handle to an armed timer. Dropping the handle does not cancel the timer.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// One-shot timers.
pub trait Scheduler: Send + Sync {
    fn arm(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;
}

/// Timers backed by the tokio runtime.
///
/// Arming outside a runtime returns an already-cancelled handle; the timer
/// never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn arm(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let token = CancellationToken::new();

        let Ok(handle) = Handle::try_current() else {
            debug!(delay_ms = delay.as_millis() as u64, "No runtime; timer not armed");
            token.cancel();
            return TimerHandle::new(token);
        };

        let cancelled = token.clone();
        handle.spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    callback().await;
                }
            }
        });

        TimerHandle::new(token)
    }
}

struct PendingTimer {
    due_ms: i64,
    seq: u64,
    token: CancellationToken,
    callback: TimerCallback,
}

/// Deterministic scheduler: timers fire only inside [`ManualScheduler::advance`].
///
/// Shares a [`ManualClock`] with the code under test so that "time passing"
/// and "timers firing" stay consistent.
pub struct ManualScheduler {
    clock: Arc<ManualClock>,
    timers: Mutex<Vec<PendingTimer>>,
    next_seq: Mutex<u64>,
}

impl ManualScheduler {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            timers: Mutex::new(Vec::new()),
            next_seq: Mutex::new(0),
        }
    }

    pub fn clock(&self) -> Arc<ManualClock> {
        Arc::clone(&self.clock)
    }

    /// Number of armed, uncancelled timers.
    pub fn armed_count(&self) -> usize {
        self.timers
            .lock()
            .iter()
            .filter(|t| !t.token.is_cancelled())
            .count()
    }

    /// Delay from now until the earliest armed timer fires.
    pub fn next_due_in(&self) -> Option<Duration> {
        let now = self.clock.now_ms();
        self.timers
            .lock()
            .iter()
            .filter(|t| !t.token.is_cancelled())
            .map(|t| t.due_ms)
            .min()
            .map(|due| Duration::from_millis(due.saturating_sub(now).max(0) as u64))
    }

    /// Move the clock forward, firing every timer that comes due on the way,
    /// in due order. Each callback is awaited before the next one fires;
    /// timers armed by a callback are eligible within the same advance.
    pub async fn advance(&self, by: Duration) {
        let target = self.clock.now_ms() + by.as_millis() as i64;

        while let Some(timer) = self.pop_due(target) {
            if timer.due_ms > self.clock.now_ms() {
                self.clock.set(timer.due_ms);
            }
            (timer.callback)().await;
        }

        if target > self.clock.now_ms() {
            self.clock.set(target);
        }
    }

    fn pop_due(&self, target: i64) -> Option<PendingTimer> {
        let mut timers = self.timers.lock();
        timers.retain(|t| !t.token.is_cancelled());

        let index = timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_ms <= target)
            .min_by_key(|(_, t)| (t.due_ms, t.seq))
            .map(|(i, _)| i)?;

        Some(timers.swap_remove(index))
    }
}

impl Scheduler for ManualScheduler {
    fn arm(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let token = CancellationToken::new();
        let seq = {
            let mut next = self.next_seq.lock();
            *next += 1;
            *next
        };

        self.timers.lock().push(PendingTimer {
            due_ms: self.clock.now_ms() + delay.as_millis() as i64,
            seq,
            token: token.clone(),
            callback,
        });

        TimerHandle::new(token)
    }
}
