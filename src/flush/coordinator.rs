use super::clock::Clock;
use super::scheduler::{Scheduler, TimerCallback, TimerHandle};
use crate::buffer::{Batch, BatchQueue, DEFAULT_BATCH_SIZE, MAX_PENDING_BATCHES, PendingEvents};
use crate::domain::Event;
use crate::reliability::{
    FlushInterval, MAX_FLUSH_INTERVAL, MAX_RETRY_ATTEMPTS, MIN_FLUSH_INTERVAL,
    is_retryable_status,
};
use crate::sender::{EventSender, SendResult};
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{BoxFuture, Shared};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// Window after construction in which the first event triggers an early flush.
pub const QUICK_FLUSH_WINDOW: Duration = Duration::from_millis(200);

/// Produces a last-minute event to include in the next flush.
pub type PrepareHook = Arc<dyn Fn() -> Option<Event> + Send + Sync>;

type FlushDone = Shared<BoxFuture<'static, ()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushType {
    Manual,
    Shutdown,
    ScheduledFullBatch,
    ScheduledMaxTime,
    Limit,
}

impl fmt::Display for FlushType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlushType::Manual => "manual",
            FlushType::Shutdown => "shutdown",
            FlushType::ScheduledFullBatch => "scheduled:full_batch",
            FlushType::ScheduledMaxTime => "scheduled:max_time",
            FlushType::Limit => "limit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct FlushConfig {
    pub batch_size: usize,
    pub max_pending_batches: usize,
    pub min_flush_interval: Duration,
    pub max_flush_interval: Duration,
    pub quick_flush_window: Duration,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_pending_batches: MAX_PENDING_BATCHES,
            min_flush_interval: MIN_FLUSH_INTERVAL,
            max_flush_interval: MAX_FLUSH_INTERVAL,
            quick_flush_window: QUICK_FLUSH_WINDOW,
        }
    }
}

struct InFlight {
    id: u64,
    flush_type: FlushType,
    done: FlushDone,
}

/// Ownership of the in-flight slot. Dropping the sender releases waiters.
struct FlushTicket {
    id: u64,
    flush_type: FlushType,
    done: FlushDone,
    done_tx: oneshot::Sender<()>,
}

#[derive(Default)]
struct Timers {
    cooldown: Option<TimerHandle>,
    failsafe: Option<TimerHandle>,
    quick_flush: Option<TimerHandle>,
}

impl Timers {
    fn cancel_cycle(&mut self) {
        for timer in [self.cooldown.take(), self.failsafe.take()].into_iter().flatten() {
            timer.cancel();
        }
    }

    fn cancel_all(&mut self) {
        self.cancel_cycle();
        if let Some(timer) = self.quick_flush.take() {
            timer.cancel();
        }
    }
}

struct Inner {
    config: FlushConfig,
    pending: Mutex<PendingEvents>,
    queue: Mutex<BatchQueue>,
    interval: Mutex<FlushInterval>,
    sender: Arc<EventSender>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    timers: Mutex<Timers>,
    in_flight: Mutex<Option<InFlight>>,
    next_flush_id: AtomicU64,
    dropped_events: AtomicU64,
    prepare_hook: RwLock<Option<PrepareHook>>,
    created_at_ms: i64,
    quick_flush_checked: AtomicBool,
    running: AtomicBool,
}

/// Decides when batches leave the process and what happens when they fail.
///
/// Every flush trigger (manual, shutdown, scheduled, limit) goes through one
/// in-flight slot, so at most one flush runs at a time. Flush bodies run on a
/// spawned task; a panic inside one is logged and the slot is still released.
#[derive(Clone)]
pub struct FlushCoordinator {
    inner: Arc<Inner>,
}

impl FlushCoordinator {
    pub fn new(
        config: FlushConfig,
        sender: Arc<EventSender>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let interval = FlushInterval::with_bounds(
            Arc::clone(&clock),
            config.min_flush_interval,
            config.max_flush_interval,
        );

        let inner = Inner {
            pending: Mutex::new(PendingEvents::new(config.batch_size)),
            queue: Mutex::new(BatchQueue::new(
                config.batch_size,
                config.max_pending_batches,
            )),
            interval: Mutex::new(interval),
            sender,
            scheduler,
            created_at_ms: clock.now_ms(),
            clock,
            timers: Mutex::new(Timers::default()),
            in_flight: Mutex::new(None),
            next_flush_id: AtomicU64::new(1),
            dropped_events: AtomicU64::new(0),
            prepare_hook: RwLock::new(None),
            quick_flush_checked: AtomicBool::new(false),
            running: AtomicBool::new(false),
            config,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub fn set_prepare_hook(&self, hook: PrepareHook) {
        *self.inner.prepare_hook.write() = Some(hook);
    }

    pub fn sender(&self) -> &Arc<EventSender> {
        &self.inner.sender
    }

    pub fn config(&self) -> &FlushConfig {
        &self.inner.config
    }

    pub fn pending_event_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub fn queued_batch_count(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub fn queued_event_count(&self) -> usize {
        self.inner.queue.lock().total_events()
    }

    /// Running total of events dropped by eviction or failed delivery.
    pub fn dropped_event_count(&self) -> u64 {
        self.inner.dropped_events.load(Ordering::Relaxed)
    }

    pub fn is_flush_in_flight(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    pub fn current_flush_interval(&self) -> Duration {
        self.inner.interval.lock().current_interval()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Buffer an event. Starts a limit flush when a full batch is waiting.
    pub fn add_pending(&self, event: Event) {
        let full = {
            let mut pending = self.inner.pending.lock();
            pending.add(event);
            pending.has_full_batch()
        };

        self.quick_flush_if_needed();

        if full {
            self.begin_limit_flush();
        }
    }

    pub fn start_scheduled_flush_cycle(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Starting scheduled flush cycle");
        self.schedule_next_flush();
    }

    pub fn stop_scheduled_flush_cycle(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.timers.lock().cancel_all();
        debug!("Stopped scheduled flush cycle");
    }

    /// Move everything pending into the batch queue. Returns the number of
    /// events evicted to stay within capacity.
    pub fn convert_pending_events_to_batches(&self) -> usize {
        let events = self.inner.pending.lock().take_all();
        if events.is_empty() {
            return 0;
        }

        let dropped = self.inner.queue.lock().create_batches(events);
        if dropped > 0 {
            self.record_dropped(dropped, None, "queue capacity exceeded");
        }
        dropped
    }

    /// One delivery attempt outside the queue. Used for replaying persisted events.
    pub async fn send_direct(&self, events: Vec<Event>) -> SendResult {
        self.inner.sender.send_events(&events).await
    }

    /// Drain every batch and send them concurrently. Waits for any running
    /// flush first.
    pub async fn process_manual_flush(&self) {
        let ticket = self.claim_after_in_flight(FlushType::Manual).await;
        self.inner.interval.lock().mark_flush_attempt();

        let this = self.clone();
        let done = self.launch(
            ticket,
            async move { this.drain_all(FlushType::Manual).await }.boxed(),
        );
        done.await;
    }

    /// Stop the timers and drain everything once. Failures are logged and dropped.
    pub async fn process_shutdown(&self) {
        self.stop_scheduled_flush_cycle();

        let ticket = self.claim_after_in_flight(FlushType::Shutdown).await;
        let this = self.clone();
        let done = self.launch(
            ticket,
            async move { this.drain_all(FlushType::Shutdown).await }.boxed(),
        );
        done.await;

        info!(
            dropped_events = self.dropped_event_count(),
            "Shutdown flush complete"
        );
    }

    /// Timer entry point. Sends at most one batch, and only when a full
    /// batch is waiting or the max interval has passed.
    pub async fn attempt_scheduled_flush(&self) {
        if self.is_flush_in_flight() {
            self.schedule_next_flush();
            return;
        }

        let has_full_batch =
            self.inner.pending.lock().has_full_batch() || self.inner.queue.lock().has_full_batch();
        let max_reached = self.inner.interval.lock().has_reached_max_interval();

        if !has_full_batch && !max_reached {
            self.schedule_next_flush();
            return;
        }

        let flush_type = if has_full_batch {
            FlushType::ScheduledFullBatch
        } else {
            FlushType::ScheduledMaxTime
        };

        let ticket = match self.try_claim(flush_type) {
            Ok(ticket) => ticket,
            Err(_) => {
                self.schedule_next_flush();
                return;
            }
        };
        self.inner.interval.lock().mark_flush_attempt();

        let this = self.clone();
        let done = self.launch(
            ticket,
            async move {
                this.prepare_queue_for_flush();
                let batch = this.inner.queue.lock().take_next_batch();
                if let Some(batch) = batch {
                    this.process_one_batch(batch, flush_type).await;
                }
            }
            .boxed(),
        );
        done.await;
    }

    /// Fire-and-forget limit flush. Outside a runtime the scheduled cycle
    /// picks the batch up instead.
    pub fn begin_limit_flush(&self) {
        match Handle::try_current() {
            Ok(handle) => {
                let this = self.clone();
                handle.spawn(async move { this.process_limit_flush().await });
            }
            Err(_) => debug!("No runtime for limit flush; deferring to scheduled flush"),
        }
    }

    /// Send full batches one at a time while the backoff is fully recovered.
    /// Skipped while another flush is in flight; stops on the first failure.
    pub async fn process_limit_flush(&self) {
        if !self.inner.interval.lock().has_completely_recovered_from_backoff() {
            debug!("Limit flush suppressed while backing off");
            return;
        }

        let ticket = match self.try_claim(FlushType::Limit) {
            Ok(ticket) => ticket,
            Err(_) => {
                debug!("Limit flush skipped; another flush is in flight");
                return;
            }
        };
        self.inner.interval.lock().mark_flush_attempt();

        let this = self.clone();
        let done = self.launch(ticket, async move { this.run_limit_loop().await }.boxed());
        done.await;
    }

    async fn run_limit_loop(&self) {
        self.prepare_queue_for_flush();

        loop {
            if self.inner.pending.lock().has_full_batch() {
                self.convert_pending_events_to_batches();
            }

            let recovered = self
                .inner
                .interval
                .lock()
                .has_completely_recovered_from_backoff();
            if !recovered || !self.inner.queue.lock().has_full_batch() {
                break;
            }

            let batch = self.inner.queue.lock().take_next_batch();
            let Some(batch) = batch else {
                break;
            };

            if !self.process_one_batch(batch, FlushType::Limit).await {
                break;
            }
        }
    }

    async fn drain_all(&self, flush_type: FlushType) {
        self.prepare_queue_for_flush();

        let batches = self.inner.queue.lock().take_all_batches();
        if batches.is_empty() {
            return;
        }

        debug!(%flush_type, batches = batches.len(), "Draining batch queue");
        futures::future::join_all(
            batches
                .into_iter()
                .map(|batch| self.process_one_batch(batch, flush_type)),
        )
        .await;
    }

    fn prepare_queue_for_flush(&self) {
        let hook = self.inner.prepare_hook.read().clone();
        if let Some(hook) = hook
            && let Some(event) = hook()
        {
            self.inner.pending.lock().add(event);
        }
        self.convert_pending_events_to_batches();
    }

    /// Send one batch and settle its fate. Returns whether it was delivered.
    async fn process_one_batch(&self, batch: Batch, flush_type: FlushType) -> bool {
        let result = self.inner.sender.send_batch(&batch).await;

        if result.success {
            self.inner.interval.lock().adjust_for_success();
            debug!(
                %flush_type,
                batch_id = batch.id(),
                events = batch.size(),
                status_code = result.status_code,
                "Batch delivered"
            );
            return true;
        }

        self.inner.interval.lock().adjust_for_failure();
        self.handle_failure(batch, flush_type, result.status_code);
        false
    }

    fn handle_failure(&self, mut batch: Batch, flush_type: FlushType, status_code: i32) {
        let reason = if flush_type == FlushType::Shutdown {
            Some("failed during shutdown")
        } else if !is_retryable_status(status_code) {
            Some("non-retryable status")
        } else if batch.attempts() >= MAX_RETRY_ATTEMPTS {
            Some("max retry attempts exceeded")
        } else {
            None
        };

        if let Some(reason) = reason {
            let total = self.count_dropped(batch.size());
            warn!(
                %flush_type,
                batch_id = batch.id(),
                status_code,
                attempts = batch.attempts(),
                dropped = batch.size(),
                total_dropped = total,
                reason,
                "Dropping failed batch"
            );
            return;
        }

        batch.increment_attempts();
        debug!(
            %flush_type,
            batch_id = batch.id(),
            status_code,
            attempts = batch.attempts(),
            "Requeueing failed batch"
        );

        let evicted = self.inner.queue.lock().requeue_batch(batch);
        if evicted > 0 {
            self.record_dropped(evicted, Some(flush_type), "queue capacity exceeded on requeue");
        }
    }

    fn count_dropped(&self, count: usize) -> u64 {
        self.inner
            .dropped_events
            .fetch_add(count as u64, Ordering::Relaxed)
            + count as u64
    }

    fn record_dropped(&self, count: usize, flush_type: Option<FlushType>, reason: &str) {
        let total = self.count_dropped(count);

        match flush_type {
            Some(flush_type) => warn!(
                %flush_type,
                dropped = count,
                total_dropped = total,
                reason,
                "Dropped events"
            ),
            None => warn!(dropped = count, total_dropped = total, reason, "Dropped events"),
        }
    }

    fn quick_flush_if_needed(&self) {
        if self.inner.quick_flush_checked.swap(true, Ordering::SeqCst) {
            return;
        }

        let window_ms = self.inner.config.quick_flush_window.as_millis() as i64;
        let elapsed_ms = self.inner.clock.now_ms() - self.inner.created_at_ms;
        if elapsed_ms >= window_ms {
            return;
        }

        let delay = Duration::from_millis((window_ms - elapsed_ms).max(0) as u64);
        let weak = Arc::downgrade(&self.inner);
        let callback: TimerCallback = Box::new(move || {
            async move {
                if let Some(inner) = weak.upgrade() {
                    debug!("Running quick flush");
                    FlushCoordinator::from_inner(inner)
                        .process_manual_flush()
                        .await;
                }
            }
            .boxed()
        });

        let handle = self.inner.scheduler.arm(delay, callback);
        self.inner.timers.lock().quick_flush = Some(handle);
    }

    /// Re-arm the cooldown and failsafe timers from the current backoff state.
    fn schedule_next_flush(&self) {
        if !self.is_running() {
            return;
        }

        let (cooldown, failsafe) = {
            let interval = self.inner.interval.lock();
            let current = interval.current_interval();
            let or_current = |delay: Duration| if delay.is_zero() { current } else { delay };
            (
                or_current(interval.time_until_next_flush()),
                or_current(interval.time_till_max_interval()),
            )
        };

        let mut timers = self.inner.timers.lock();
        timers.cancel_cycle();
        timers.cooldown = Some(self.arm_scheduled(cooldown));
        timers.failsafe = Some(self.arm_scheduled(failsafe));
    }

    fn arm_scheduled(&self, delay: Duration) -> TimerHandle {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.scheduler.arm(
            delay,
            Box::new(move || {
                async move {
                    if let Some(inner) = weak.upgrade() {
                        FlushCoordinator::from_inner(inner)
                            .attempt_scheduled_flush()
                            .await;
                    }
                }
                .boxed()
            }),
        )
    }

    fn try_claim(&self, flush_type: FlushType) -> Result<FlushTicket, FlushDone> {
        let mut slot = self.inner.in_flight.lock();
        if let Some(existing) = slot.as_ref() {
            return Err(existing.done.clone());
        }

        let id = self.inner.next_flush_id.fetch_add(1, Ordering::Relaxed);
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let done = done_rx.map(|_| ()).boxed().shared();

        *slot = Some(InFlight {
            id,
            flush_type,
            done: done.clone(),
        });

        Ok(FlushTicket {
            id,
            flush_type,
            done,
            done_tx,
        })
    }

    async fn claim_after_in_flight(&self, flush_type: FlushType) -> FlushTicket {
        loop {
            match self.try_claim(flush_type) {
                Ok(ticket) => return ticket,
                Err(done) => done.await,
            }
        }
    }

    /// Run a claimed flush on its own task. The returned future resolves once
    /// the slot has been released.
    fn launch(&self, ticket: FlushTicket, work: BoxFuture<'static, ()>) -> FlushDone {
        let this = self.clone();
        let FlushTicket {
            id,
            flush_type,
            done,
            done_tx,
        } = ticket;

        tokio::spawn(async move {
            if AssertUnwindSafe(work).catch_unwind().await.is_err() {
                error!(%flush_type, "Flush task panicked");
            }
            this.finish_flush(id);
            let _ = done_tx.send(());
        });

        done
    }

    fn finish_flush(&self, id: u64) {
        let released = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(in_flight) if in_flight.id == id => slot.take().map(|f| f.flush_type),
                _ => None,
            }
        };

        if let Some(flush_type) = released {
            debug!(%flush_type, "Flush finished");
        }

        self.schedule_next_flush();
    }
}

impl fmt::Debug for FlushCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushCoordinator")
            .field("config", &self.inner.config)
            .field("pending_events", &self.pending_event_count())
            .field("queued_batches", &self.queued_batch_count())
            .field("dropped_events", &self.dropped_event_count())
            .field("running", &self.is_running())
            .finish()
    }
}
