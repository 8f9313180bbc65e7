use super::event_logger::EventLogger;
use crate::host::{HostLifecycle, Visibility};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Live loggers keyed by SDK key, owned by the host context.
#[derive(Debug, Default)]
pub struct LoggerRegistry {
    loggers: RwLock<HashMap<String, EventLogger>>,
}

impl LoggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a logger, returning the one it replaced.
    pub fn register(&self, logger: EventLogger) -> Option<EventLogger> {
        let sdk_key = logger.sdk_key().to_string();
        debug!(sdk_key = %sdk_key, "Registering event logger");
        self.loggers.write().insert(sdk_key, logger)
    }

    pub fn unregister(&self, sdk_key: &str) -> Option<EventLogger> {
        self.loggers.write().remove(sdk_key)
    }

    pub fn get(&self, sdk_key: &str) -> Option<EventLogger> {
        self.loggers.read().get(sdk_key).cloned()
    }

    pub fn len(&self) -> usize {
        self.loggers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.read().is_empty()
    }

    /// Deliver a visibility change to every registered logger.
    pub async fn dispatch_visibility(&self, visibility: Visibility) {
        let loggers: Vec<EventLogger> = self.loggers.read().values().cloned().collect();
        debug!(?visibility, loggers = loggers.len(), "Dispatching visibility change");

        futures::future::join_all(
            loggers
                .iter()
                .map(|logger| logger.on_visibility_change(visibility)),
        )
        .await;
    }

    /// Forward the lifecycle's visibility broadcasts until either side goes away.
    pub fn attach(self: &Arc<Self>, lifecycle: &HostLifecycle) -> JoinHandle<()> {
        let mut rx = lifecycle.on_visibility_change();
        let registry = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(visibility) => {
                        let Some(registry) = registry.upgrade() else {
                            break;
                        };
                        registry.dispatch_visibility(visibility).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Visibility listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
