use crate::domain::{Event, djb2};
use crate::storage::{StorageError, StorageProvider};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

pub const MAX_FAILED_LOGS: usize = 500;

const STORAGE_KEY_PREFIX: &str = "rask.failed_logs";

pub fn failed_logs_storage_key(sdk_key: &str) -> String {
    format!("{STORAGE_KEY_PREFIX}.{}", djb2(sdk_key))
}

/// Storage-backed holding area for events that could not be sent.
///
/// `stage` is synchronous; staged events are written out by a background
/// task, and every read persists outstanding events first. Storage errors are
/// logged and swallowed.
pub struct FailureBuffer {
    storage: Arc<dyn StorageProvider>,
    key: String,
    max_events: usize,
    staged: Mutex<Vec<Event>>,
    write_lock: tokio::sync::Mutex<()>,
}

impl FailureBuffer {
    pub fn new(storage: Arc<dyn StorageProvider>, sdk_key: &str, max_events: usize) -> Self {
        Self {
            storage,
            key: failed_logs_storage_key(sdk_key),
            max_events,
            staged: Mutex::new(Vec::new()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn storage_key(&self) -> &str {
        &self.key
    }

    pub fn staged_count(&self) -> usize {
        self.staged.lock().len()
    }

    /// Queue an event for persistence and kick off a background write.
    pub fn stage(self: &Arc<Self>, event: Event) {
        self.staged.lock().push(event);

        if let Ok(handle) = Handle::try_current() {
            let buffer = Arc::clone(self);
            handle.spawn(async move { buffer.persist().await });
        } else {
            debug!("No runtime; staged event will be written on next access");
        }
    }

    /// Write staged events into storage, trimming to the newest `max_events`.
    pub async fn persist(&self) {
        let _guard = self.write_lock.lock().await;

        let staged = std::mem::take(&mut *self.staged.lock());
        if staged.is_empty() {
            return;
        }

        let count = staged.len();
        if let Err(e) = self.append_locked(staged).await {
            warn!(error = %e, events = count, "Failed to persist events to storage");
        }
    }

    /// Everything stored, including events staged but not yet written.
    pub async fn load(&self) -> Vec<Event> {
        self.persist().await;

        let _guard = self.write_lock.lock().await;
        match self.read_locked().await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted events");
                Vec::new()
            }
        }
    }

    /// Put events back, ahead of anything stored since.
    pub async fn restore(&self, events: Vec<Event>) {
        let _guard = self.write_lock.lock().await;
        let count = events.len();

        if let Err(e) = self.prepend_locked(events).await {
            warn!(error = %e, events = count, "Failed to restore events to storage");
        }
    }

    /// Drop events that were delivered, keeping anything stored after they
    /// were loaded.
    pub async fn remove_delivered(&self, delivered: &[Event]) {
        let _guard = self.write_lock.lock().await;

        if let Err(e) = self.remove_delivered_locked(delivered).await {
            warn!(error = %e, events = delivered.len(), "Failed to remove delivered events");
        }
    }

    pub async fn clear(&self) {
        let _guard = self.write_lock.lock().await;

        if let Err(e) = self.storage.remove_item(&self.key).await {
            warn!(error = %e, key = %self.key, "Failed to clear persisted events");
        }
    }

    async fn read_locked(&self) -> Result<Vec<Event>, StorageError> {
        self.storage.wait_until_ready().await?;

        let Some(raw) = self.storage.get_item(&self.key).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<Event>>(&raw) {
            Ok(events) => Ok(events),
            Err(e) => {
                warn!(error = %e, key = %self.key, "Discarding unreadable persisted events");
                Ok(Vec::new())
            }
        }
    }

    async fn append_locked(&self, events: Vec<Event>) -> Result<(), StorageError> {
        let mut stored = self.read_locked().await?;
        stored.extend(events);
        self.write_locked(stored).await
    }

    async fn prepend_locked(&self, mut events: Vec<Event>) -> Result<(), StorageError> {
        events.extend(self.read_locked().await?);
        events.extend(std::mem::take(&mut *self.staged.lock()));
        self.write_locked(events).await
    }

    async fn remove_delivered_locked(&self, delivered: &[Event]) -> Result<(), StorageError> {
        let mut stored = self.read_locked().await?;

        if stored.starts_with(delivered) {
            stored.drain(..delivered.len());
        } else {
            // Trimming moved the front; drop matches one for one.
            for event in delivered {
                if let Some(index) = stored.iter().position(|e| e == event) {
                    stored.remove(index);
                }
            }
        }

        if stored.is_empty() {
            self.storage.remove_item(&self.key).await
        } else {
            self.write_locked(stored).await
        }
    }

    async fn write_locked(&self, mut events: Vec<Event>) -> Result<(), StorageError> {
        if events.len() > self.max_events {
            let excess = events.len() - self.max_events;
            events.drain(..excess);
            debug!(dropped = excess, "Trimmed oldest persisted events");
        }

        let raw = serde_json::to_string(&events)
            .map_err(|e| StorageError::IoError(std::io::Error::other(e)))?;
        self.storage.set_item(&self.key, &raw).await
    }
}

impl std::fmt::Debug for FailureBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureBuffer")
            .field("key", &self.key)
            .field("max_events", &self.max_events)
            .field("staged", &self.staged_count())
            .finish()
    }
}
