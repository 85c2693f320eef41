// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Host storage abstraction.
//!
//! The engine persists three kinds of records, all as JSON:
//!
//! | Key | Record |
//! |-----|--------|
//! | `config` | [`Configuration`](crate::models::Configuration) |
//! | `roles/<name>` | [`Role`](crate::models::Role) |
//! | `wal/<id>` | [`WalEntry`](crate::wal::WalEntry) |
//!
//! The host supplies the [`Storage`] implementation. Entries under the paths
//! in [`SEAL_WRAP_STORAGE`] are flagged so the host can encrypt them at rest.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use crate::constants::SEAL_WRAP_STORAGE;
use crate::context::RequestContext;
use crate::errors::StorageError;

/// A single raw storage record.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub seal_wrap: bool,
}

// Values hold secrets; only the shape is printable.
impl fmt::Debug for StorageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageEntry")
            .field("key", &self.key)
            .field("value", &format_args!("[{} bytes]", self.value.len()))
            .field("seal_wrap", &self.seal_wrap)
            .finish()
    }
}

impl StorageEntry {
    /// Encodes `value` as JSON under `key`.
    pub fn json<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<Self, StorageError> {
        let value = serde_json::to_vec(value).map_err(|err| StorageError::Codec {
            key: key.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self {
            key: key.to_string(),
            value,
            seal_wrap: is_seal_wrapped(key),
        })
    }

    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, StorageError> {
        serde_json::from_slice(&self.value).map_err(|err| StorageError::Codec {
            key: self.key.clone(),
            message: err.to_string(),
        })
    }
}

/// Whether `key` falls under one of the seal-wrapped paths.
pub fn is_seal_wrapped(key: &str) -> bool {
    SEAL_WRAP_STORAGE.iter().any(|path| {
        if path.ends_with('/') {
            key.starts_with(path)
        } else {
            key == *path
        }
    })
}

/// Durable key/value storage provided by the host platform.
///
/// `list` returns the immediate children of `prefix`: plain names for leaf
/// keys and `name/` for deeper keys, sorted and de-duplicated.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn list(&self, ctx: &RequestContext, prefix: &str) -> Result<Vec<String>, StorageError>;

    async fn get(&self, ctx: &RequestContext, key: &str)
    -> Result<Option<StorageEntry>, StorageError>;

    async fn put(&self, ctx: &RequestContext, entry: StorageEntry) -> Result<(), StorageError>;

    async fn delete(&self, ctx: &RequestContext, key: &str) -> Result<(), StorageError>;
}

/// Collapses full keys below `prefix` into immediate child names.
pub fn child_names<'a, I>(prefix: &str, keys: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut names = BTreeSet::new();
    for key in keys {
        let Some(rest) = key.strip_prefix(prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        match rest.find('/') {
            Some(index) => names.insert(rest[..=index].to_string()),
            None => names.insert(rest.to_string()),
        };
    }
    names.into_iter().collect()
}

/// Process-local storage, used by tests and by servers without a data
/// directory.
#[derive(Default)]
pub struct InMemoryStorage {
    entries: RwLock<BTreeMap<String, StorageEntry>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn list(&self, ctx: &RequestContext, prefix: &str) -> Result<Vec<String>, StorageError> {
        if ctx.is_done() {
            return Err(StorageError::Canceled);
        }
        let entries = self.entries.read().await;
        Ok(child_names(prefix, entries.keys().map(String::as_str)))
    }

    async fn get(
        &self,
        ctx: &RequestContext,
        key: &str,
    ) -> Result<Option<StorageEntry>, StorageError> {
        if ctx.is_done() {
            return Err(StorageError::Canceled);
        }
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, ctx: &RequestContext, entry: StorageEntry) -> Result<(), StorageError> {
        if ctx.is_done() {
            return Err(StorageError::Canceled);
        }
        self.entries.write().await.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, ctx: &RequestContext, key: &str) -> Result<(), StorageError> {
        if ctx.is_done() {
            return Err(StorageError::Canceled);
        }
        self.entries.write().await.remove(key);
        Ok(())
    }
}
