//! Local-directory object store; keys map to relative file paths.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use super::{normalize_object_key, ObjectInfo, ObjectStore, PutMode};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<(String, PathBuf)> {
        let key = normalize_object_key(key)?;
        let relative = Path::new(&key);
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(Error::InvalidInput(format!(
                "Object key must be a relative path without '..': {key}"
            )));
        }
        let path = self.root.join(relative);
        Ok((key, path))
    }
}

impl ObjectStore for FsObjectStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: Option<&str>,
        mode: PutMode,
    ) -> Result<()> {
        let (key, path) = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        match mode {
            PutMode::CreateOnly => {
                let mut file = match tokio::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .await
                {
                    Ok(file) => file,
                    Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                        return Err(Error::AlreadyExists(key));
                    }
                    Err(error) => return Err(error.into()),
                };
                file.write_all(&bytes).await?;
                file.flush().await?;
            }
            PutMode::Overwrite => {
                let staging = path.with_extension("partial");
                tokio::fs::write(&staging, &bytes).await?;
                tokio::fs::rename(&staging, &path).await?;
            }
        }
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let (_, path) = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let prefix = prefix.trim().trim_start_matches('/');
        let mut objects = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(error) if error.kind() == ErrorKind::NotFound => continue,
                Err(error) => return Err(error.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if !key.starts_with(prefix) || key.ends_with(".partial") {
                    continue;
                }
                let metadata = entry.metadata().await?;
                objects.push(ObjectInfo {
                    key,
                    size: metadata.len(),
                    last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                });
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }
}
