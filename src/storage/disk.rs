use super::{StorageError, StorageProvider};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DiskStorageConfig {
    pub storage_path: PathBuf,
    pub max_value_bytes: usize,
}

impl Default for DiskStorageConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("/tmp/rask-event-logger/storage"),
            max_value_bytes: 4 * 1024 * 1024,
        }
    }
}

/// One file per key under `storage_path`.
///
/// The directory is created on first use; `is_ready` turns true once that
/// has succeeded.
#[derive(Debug)]
pub struct DiskStorage {
    config: DiskStorageConfig,
    ready: OnceCell<()>,
}

impl DiskStorage {
    pub fn new(config: DiskStorageConfig) -> Self {
        Self {
            config,
            ready: OnceCell::new(),
        }
    }

    pub fn storage_path(&self) -> &PathBuf {
        &self.config.storage_path
    }

    fn item_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }

        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if file_name.chars().all(|c| c == '.') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        Ok(self.config.storage_path.join(format!("{file_name}.json")))
    }
}

#[async_trait]
impl StorageProvider for DiskStorage {
    fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    async fn wait_until_ready(&self) -> Result<(), StorageError> {
        self.ready
            .get_or_try_init(|| async {
                fs::create_dir_all(&self.config.storage_path).await?;
                debug!(path = %self.config.storage_path.display(), "Disk storage ready");
                Ok::<(), StorageError>(())
            })
            .await?;
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.wait_until_ready().await?;
        let path = self.item_path(key)?;

        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if value.len() > self.config.max_value_bytes {
            return Err(StorageError::ValueTooLarge {
                key: key.to_string(),
                size: value.len(),
                limit: self.config.max_value_bytes,
            });
        }

        self.wait_until_ready().await?;
        let path = self.item_path(key)?;
        let tmp_path = path.with_extension("json.tmp");

        // Write-then-rename so readers never see a partial value.
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(value.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp_path, &path).await?;

        debug!(key, bytes = value.len(), "Stored item to disk");
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.wait_until_ready().await?;
        let path = self.item_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(dir: &tempfile::TempDir) -> DiskStorage {
        DiskStorage::new(DiskStorageConfig {
            storage_path: dir.path().join("nested"),
            max_value_bytes: 16,
        })
    }

    #[test]
    fn test_keys_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);

        let path = storage.item_path("rask.failed_logs/../x").unwrap();
        assert_eq!(path.file_name().unwrap(), "rask.failed_logs_.._x.json");
        assert!(storage.item_path("").is_err());
        assert!(storage.item_path("..").is_err());
    }

    #[tokio::test]
    async fn test_value_limit_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);

        let err = storage.set_item("k", &"x".repeat(17)).await.unwrap_err();
        assert!(matches!(err, StorageError::ValueTooLarge { size: 17, .. }));
    }
}
