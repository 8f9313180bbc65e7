use crate::domain::Event;
use parking_lot::RwLock;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationName {
    PreLogsFlushed,
    LogsFlushed,
}

impl NotificationName {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationName::PreLogsFlushed => "pre_logs_flushed",
            NotificationName::LogsFlushed => "logs_flushed",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Notification<'a> {
    pub name: NotificationName,
    pub events: &'a [Event],
}

pub type NotificationListener =
    Arc<dyn Fn(&Notification<'_>) -> anyhow::Result<()> + Send + Sync + 'static>;

/// Fan-out of flush notifications to downstream instrumentation.
///
/// A listener that errors or panics is logged and skipped; the others still
/// run and the flush carries on.
#[derive(Default)]
pub struct NotificationEmitter {
    listeners: RwLock<Vec<NotificationListener>>,
}

impl NotificationEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&Notification<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn emit(&self, notification: Notification<'_>) {
        // Snapshot so listeners may subscribe without deadlocking.
        let listeners: Vec<NotificationListener> = self.listeners.read().clone();

        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(&notification))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        notification = notification.name.as_str(),
                        error = %e,
                        "Notification listener failed"
                    );
                }
                Err(_) => {
                    warn!(
                        notification = notification.name.as_str(),
                        "Notification listener panicked"
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for NotificationEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationEmitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
