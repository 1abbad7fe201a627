//! Object storage for backups and logs.

mod fs;
mod index;
mod memory;
mod r2;

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::Result;

pub use fs::FsObjectStore;
pub use index::{BackupEntry, BackupIndex};
pub use memory::MemoryObjectStore;
pub use r2::{R2Config, R2Storage};

/// Whether a write may replace an existing object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Fail with `Error::AlreadyExists` when the key is taken
    CreateOnly,
    Overwrite,
}

/// Listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Minimal object store surface shared by every backend.
///
/// Futures are `Send` so uploads can run on spawned tasks.
pub trait ObjectStore: Send + Sync {
    fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
        mode: PutMode,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Object bytes, or `None` when the key does not exist
    fn get_object(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Every object whose key starts with `prefix`, in key order
    fn list_objects(&self, prefix: &str) -> impl Future<Output = Result<Vec<ObjectInfo>>> + Send;
}

/// The backend picked at startup
#[derive(Debug, Clone)]
pub enum ObjectStoreBackend {
    R2(R2Storage),
    Fs(FsObjectStore),
    Memory(MemoryObjectStore),
}

impl ObjectStoreBackend {
    /// Short label for logs
    pub const fn label(&self) -> &'static str {
        match self {
            Self::R2(_) => "r2",
            Self::Fs(_) => "filesystem",
            Self::Memory(_) => "memory",
        }
    }
}

impl ObjectStore for ObjectStoreBackend {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
        mode: PutMode,
    ) -> Result<()> {
        match self {
            Self::R2(store) => store.put_object(key, bytes, content_type, mode).await,
            Self::Fs(store) => store.put_object(key, bytes, content_type, mode).await,
            Self::Memory(store) => store.put_object(key, bytes, content_type, mode).await,
        }
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Self::R2(store) => store.get_object(key).await,
            Self::Fs(store) => store.get_object(key).await,
            Self::Memory(store) => store.get_object(key).await,
        }
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        match self {
            Self::R2(store) => store.list_objects(prefix).await,
            Self::Fs(store) => store.list_objects(prefix).await,
            Self::Memory(store) => store.list_objects(prefix).await,
        }
    }
}

/// Trim slashes and whitespace; empty keys are rejected
pub(crate) fn normalize_object_key(object_key: &str) -> Result<String> {
    let object_key = object_key.trim().trim_matches('/').to_string();
    if object_key.is_empty() {
        return Err(crate::Error::InvalidInput(
            "Object key cannot be empty".to_string(),
        ));
    }
    Ok(object_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_object_key_rejects_empty() {
        let err = normalize_object_key(" / ").unwrap_err();
        assert!(matches!(err, crate::Error::InvalidInput(message) if message.contains("key")));
        assert_eq!(normalize_object_key("/logs/a.txt ").unwrap(), "logs/a.txt");
    }

    #[tokio::test]
    async fn backend_delegates_to_the_wrapped_store() {
        let backend = ObjectStoreBackend::Memory(MemoryObjectStore::new());
        backend
            .put_object("a/b.json", b"{}".to_vec(), None, PutMode::CreateOnly)
            .await
            .unwrap();
        assert_eq!(backend.get_object("a/b.json").await.unwrap(), Some(b"{}".to_vec()));
        assert_eq!(backend.label(), "memory");
    }
}
