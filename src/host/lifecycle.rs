use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

const VISIBILITY_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Foreground,
    Background,
}

/// Answers "is the host going away right now?" at send time.
pub trait UnloadProbe: Send + Sync {
    fn is_unloading(&self) -> bool;
}

/// Signals the host application feeds into the pipeline.
///
/// The host calls the setters; the pipeline subscribes to visibility changes
/// and probes the unloading flag when choosing a transport.
#[derive(Debug)]
pub struct HostLifecycle {
    visibility_tx: broadcast::Sender<Visibility>,
    visibility: RwLock<Visibility>,
    unloading: AtomicBool,
    interactive: bool,
    current_page: RwLock<Option<String>>,
}

impl HostLifecycle {
    pub fn new(interactive: bool) -> Self {
        let (visibility_tx, _) = broadcast::channel(VISIBILITY_CHANNEL_CAPACITY);
        Self {
            visibility_tx,
            visibility: RwLock::new(Visibility::Foreground),
            unloading: AtomicBool::new(false),
            interactive,
            current_page: RwLock::new(None),
        }
    }

    /// Subscribe to foreground/background transitions.
    pub fn on_visibility_change(&self) -> broadcast::Receiver<Visibility> {
        self.visibility_tx.subscribe()
    }

    /// Record a visibility transition. Repeats of the current state are not broadcast.
    pub fn set_visibility(&self, visibility: Visibility) {
        {
            let mut current = self.visibility.write();
            if *current == visibility {
                return;
            }
            *current = visibility;
        }

        if self.visibility_tx.send(visibility).is_err() {
            debug!(?visibility, "No visibility subscribers");
        }
    }

    pub fn visibility(&self) -> Visibility {
        *self.visibility.read()
    }

    pub fn set_unloading(&self, unloading: bool) {
        self.unloading.store(unloading, Ordering::SeqCst);
    }

    /// Whether the host is a user-facing, interactive environment.
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn set_current_page(&self, page: Option<String>) {
        *self.current_page.write() = page;
    }

    pub fn current_page(&self) -> Option<String> {
        self.current_page.read().clone()
    }
}

impl Default for HostLifecycle {
    fn default() -> Self {
        Self::new(true)
    }
}

impl UnloadProbe for HostLifecycle {
    fn is_unloading(&self) -> bool {
        self.unloading.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_visibility_changes_are_broadcast_once() {
        let lifecycle = HostLifecycle::new(true);
        let mut rx = lifecycle.on_visibility_change();

        lifecycle.set_visibility(Visibility::Background);
        lifecycle.set_visibility(Visibility::Background);
        lifecycle.set_visibility(Visibility::Foreground);

        assert_eq!(rx.recv().await.unwrap(), Visibility::Background);
        assert_eq!(rx.recv().await.unwrap(), Visibility::Foreground);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unloading_probe_and_page() {
        let lifecycle = HostLifecycle::default();
        assert!(!lifecycle.is_unloading());

        lifecycle.set_unloading(true);
        assert!(lifecycle.is_unloading());

        lifecycle.set_current_page(Some("/checkout".into()));
        assert_eq!(lifecycle.current_page().as_deref(), Some("/checkout"));
    }
}
