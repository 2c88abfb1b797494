//! Durable key/value cache: the localStorage analog.
//!
//! Holds small serialized strings (the session's message list and current
//! conversation id) across process restarts. Read once at session start,
//! written on every message-list mutation.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use chatstream_types::StoreError;

/// Process-wide durable string storage.
pub trait KvCache: Send + Sync {
    /// Read a value, `None` when the key has never been written.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Write a value, overwriting any previous one.
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove a key; removing an absent key is a no-op.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-memory cache. Contents do not survive a restart; useful for tests.
#[derive(Clone, Default)]
pub struct InMemoryKvCache {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryKvCache {
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvCache for InMemoryKvCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.data
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.data.write().await.remove(key);
        Ok(())
    }
}

/// File-backed cache storing one file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileKvCache {
    directory: PathBuf,
}

impl FileKvCache {
    /// Create a new file-backed cache at the given directory.
    ///
    /// The directory is created on the first write.
    #[must_use]
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(key)
    }
}

impl KvCache for FileKvCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.directory).await?;
        tokio::fs::write(self.path_for(key), value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
