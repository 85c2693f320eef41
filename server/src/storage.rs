// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Directory-backed storage.
//!
//! Each key maps to a file below the root directory (`roles/web` →
//! `<root>/roles/web`). Writes go to a temporary sibling file that is
//! renamed over the target, so a crash leaves either the old or the new
//! value. Seal-wrapped entries are created with mode `0600` on Unix.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use adc_secrets_engine::context::RequestContext;
use adc_secrets_engine::errors::StorageError;
use adc_secrets_engine::storage::{Storage, StorageEntry, is_seal_wrapped};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::constants::TEMP_FILE_SUFFIX;

pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Opens (creating if needed) storage rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|err| io_error(&root, err))?;
        tracing::info!("[server] using file storage at {}", root.display());
        Ok(Self { root })
    }

    /// Resolves `key` below the root, rejecting anything that could escape it.
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key.trim_end_matches('/'));
        let safe = !key.contains('\\')
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(StorageError::Backend(format!("invalid storage key {key:?}")));
        }
        Ok(self.root.join(relative))
    }

    async fn write_atomic(&self, entry: &StorageEntry) -> Result<(), StorageError> {
        let path = self.path_for(&entry.key)?;
        if path == self.root {
            return Err(StorageError::Backend("empty storage key".to_string()));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| io_error(parent, err))?;
        }

        let mut temp = path.clone().into_os_string();
        temp.push(format!(".{}{TEMP_FILE_SUFFIX}", uuid::Uuid::new_v4()));
        let temp = PathBuf::from(temp);

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            if entry.seal_wrap {
                options.mode(0o600);
            }
        }

        let result = async {
            let mut file = options.open(&temp).await?;
            file.write_all(&entry.value).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&temp, &path).await?;
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(err) = result {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(io_error(&path, err));
        }
        Ok(())
    }
}

fn io_error(path: &Path, err: std::io::Error) -> StorageError {
    StorageError::Backend(format!("{}: {}", path.display(), err))
}

#[async_trait]
impl Storage for FileStorage {
    async fn list(&self, ctx: &RequestContext, prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.path_for(prefix)?
        };

        let read = async {
            let mut names = Vec::new();
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => return Ok(names),
                Err(err) => return Err(io_error(&dir, err)),
            };
            while let Some(entry) = entries.next_entry().await.map_err(|err| io_error(&dir, err))? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.ends_with(TEMP_FILE_SUFFIX) {
                    continue;
                }
                let file_type = entry.file_type().await.map_err(|err| io_error(&dir, err))?;
                if file_type.is_dir() {
                    names.push(format!("{name}/"));
                } else {
                    names.push(name);
                }
            }
            names.sort();
            Ok::<_, StorageError>(names)
        };
        ctx.run(read).await.ok_or(StorageError::Canceled)?
    }

    async fn get(
        &self,
        ctx: &RequestContext,
        key: &str,
    ) -> Result<Option<StorageEntry>, StorageError> {
        let path = self.path_for(key)?;
        let read = async {
            match tokio::fs::read(&path).await {
                Ok(value) => Ok(Some(StorageEntry {
                    key: key.to_string(),
                    value,
                    seal_wrap: is_seal_wrapped(key),
                })),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
                Err(err) => Err(io_error(&path, err)),
            }
        };
        ctx.run(read).await.ok_or(StorageError::Canceled)?
    }

    async fn put(&self, ctx: &RequestContext, entry: StorageEntry) -> Result<(), StorageError> {
        ctx.run(self.write_atomic(&entry))
            .await
            .ok_or(StorageError::Canceled)?
    }

    async fn delete(&self, ctx: &RequestContext, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let remove = async {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) => Err(io_error(&path, err)),
            }
        };
        ctx.run(remove).await.ok_or(StorageError::Canceled)?
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();
        let ctx = RequestContext::new();

        let entry = StorageEntry::json("roles/web", &serde_json::json!({"ttl": 5})).unwrap();
        storage.put(&ctx, entry.clone()).await.unwrap();
        storage
            .put(&ctx, StorageEntry::json("config", &serde_json::json!({})).unwrap())
            .await
            .unwrap();

        assert_eq!(storage.get(&ctx, "roles/web").await.unwrap(), Some(entry));
        assert_eq!(storage.list(&ctx, "roles/").await.unwrap(), vec!["web"]);
        assert_eq!(storage.list(&ctx, "").await.unwrap(), vec!["config", "roles/"]);
        assert!(storage.list(&ctx, "wal/").await.unwrap().is_empty());

        storage.delete(&ctx, "roles/web").await.unwrap();
        storage.delete(&ctx, "roles/web").await.unwrap();
        assert!(storage.get(&ctx, "roles/web").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();
        let ctx = RequestContext::new();

        for ttl in [1, 2] {
            let entry = StorageEntry::json("roles/web", &serde_json::json!({"ttl": ttl})).unwrap();
            storage.put(&ctx, entry).await.unwrap();
        }
        let stored = storage.get(&ctx, "roles/web").await.unwrap().unwrap();
        let value: serde_json::Value = stored.decode_json().unwrap();
        assert_eq!(value["ttl"], 2);
        assert_eq!(storage.list(&ctx, "roles/").await.unwrap(), vec!["web"]);
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();
        let ctx = RequestContext::new();

        for key in ["../outside", "/etc/passwd", "roles/../../x", "roles\\web"] {
            assert!(storage.get(&ctx, key).await.is_err(), "{key}");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_seal_wrapped_entries_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();
        let ctx = RequestContext::new();
        storage
            .put(&ctx, StorageEntry::json("config", &serde_json::json!({})).unwrap())
            .await
            .unwrap();

        let metadata = std::fs::metadata(dir.path().join("config")).unwrap();
        assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();
        let ctx = RequestContext::new();
        ctx.cancel();
        assert_eq!(
            storage.get(&ctx, "config").await,
            Err(StorageError::Canceled)
        );
    }
}
