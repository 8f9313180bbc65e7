use crate::reliability::{RetryConfig, RetryStrategy};
use crate::storage::DiskStorageConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    #[serde(with = "super::serde_helpers")]
    pub base_delay: Duration,
    #[serde(with = "super::serde_helpers")]
    pub max_delay: Duration,
    pub strategy: RetryStrategy,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            base_delay: defaults.base_delay,
            max_delay: defaults.max_delay,
            strategy: defaults.strategy,
            jitter: defaults.jitter,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            base_delay: settings.base_delay,
            max_delay: settings.max_delay,
            strategy: settings.strategy,
            jitter: settings.jitter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub storage_path: PathBuf,
    pub max_value_bytes: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        let defaults = DiskStorageConfig::default();
        Self {
            storage_path: defaults.storage_path,
            max_value_bytes: defaults.max_value_bytes,
        }
    }
}

impl From<&StorageSettings> for DiskStorageConfig {
    fn from(settings: &StorageSettings) -> Self {
        Self {
            storage_path: settings.storage_path.clone(),
            max_value_bytes: settings.max_value_bytes,
        }
    }
}
