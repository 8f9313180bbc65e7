//! Key/value persistence used by the failure buffer.
//!
//! Storage trouble never reaches the pipeline: callers log a warning and
//! carry on.

pub mod disk;
pub mod memory;

pub use disk::{DiskStorage, DiskStorageConfig};
pub use memory::InMemoryStorage;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
    #[error("Value for {key} is {size} bytes, limit is {limit}")]
    ValueTooLarge { key: String, size: usize, limit: usize },
    #[error("Storage not ready: {0}")]
    NotReady(String),
}

#[async_trait]
pub trait StorageProvider: Send + Sync {
    fn is_ready(&self) -> bool;

    async fn wait_until_ready(&self) -> Result<(), StorageError>;

    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}
