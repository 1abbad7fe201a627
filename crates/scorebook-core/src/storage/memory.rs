use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{normalize_object_key, ObjectInfo, ObjectStore, PutMode};
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

/// In-process object store. Clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    inner: Arc<Inner>,
}

impl MemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail with a storage error
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Successful writes so far
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }
}

impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: Option<&str>,
        mode: PutMode,
    ) -> Result<()> {
        let key = normalize_object_key(key)?;
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage(format!("write to {key} refused")));
        }

        let mut objects = self.inner.objects.lock().await;
        if mode == PutMode::CreateOnly && objects.contains_key(&key) {
            return Err(Error::AlreadyExists(key));
        }
        objects.insert(
            key,
            StoredObject {
                bytes,
                modified: Utc::now(),
            },
        );
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = normalize_object_key(key)?;
        let objects = self.inner.objects.lock().await;
        Ok(objects.get(&key).map(|object| object.bytes.clone()))
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let prefix = prefix.trim().trim_start_matches('/');
        let objects = self.inner.objects.lock().await;
        Ok(objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ObjectInfo {
                key: key.clone(),
                size: object.bytes.len() as u64,
                last_modified: Some(object.modified),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_objects() {
        let store = MemoryObjectStore::new();
        let other = store.clone();
        store
            .put_object("a.json", b"1".to_vec(), None, PutMode::CreateOnly)
            .await
            .unwrap();

        assert_eq!(other.get_object("a.json").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(other.write_count(), 1);
    }

    #[tokio::test]
    async fn failing_writes_leave_nothing_behind() {
        let store = MemoryObjectStore::new();
        store.set_fail_writes(true);
        let result = store
            .put_object("a.json", b"1".to_vec(), None, PutMode::Overwrite)
            .await;

        assert!(matches!(result, Err(Error::Storage(_))));
        assert!(store.list_objects("").await.unwrap().is_empty());
    }
}
