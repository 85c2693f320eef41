// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Write-ahead log.
//!
//! A WAL entry is written to `wal/<id>` before a multi-step side effect and
//! deleted once the side effect is fully persisted. Entries that outlive
//! their operation are handed to the rollback handler by the host.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use zeroize::ZeroizeOnDrop;

use crate::constants::WAL_PREFIX;
use crate::context::RequestContext;
use crate::errors::StorageError;
use crate::storage::{Storage, StorageEntry};

/// A stored WAL record.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    pub id: String,
    pub kind: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

// `data` may carry passwords.
impl fmt::Debug for WalEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalEntry")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Payload of a `root-rotation` WAL entry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct RootRotationWal {
    pub old_password: String,
    pub new_password: String,
}

impl fmt::Debug for RootRotationWal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootRotationWal")
            .field("old_password", &"[REDACTED]")
            .field("new_password", &"[REDACTED]")
            .finish()
    }
}

fn wal_key(id: &str) -> String {
    format!("{WAL_PREFIX}{id}")
}

/// Writes a new WAL entry and returns its id.
pub async fn put_wal<T: Serialize>(
    storage: &dyn Storage,
    ctx: &RequestContext,
    kind: &str,
    data: &T,
) -> Result<String, StorageError> {
    let id = Uuid::new_v4().to_string();
    let key = wal_key(&id);
    let data = serde_json::to_value(data).map_err(|err| StorageError::Codec {
        key: key.clone(),
        message: err.to_string(),
    })?;
    let entry = WalEntry {
        id: id.clone(),
        kind: kind.to_string(),
        data,
        created_at: Utc::now(),
    };
    storage.put(ctx, StorageEntry::json(&key, &entry)?).await?;
    tracing::debug!("[engine] wrote {} WAL entry {}", kind, id);
    Ok(id)
}

pub async fn get_wal(
    storage: &dyn Storage,
    ctx: &RequestContext,
    id: &str,
) -> Result<Option<WalEntry>, StorageError> {
    storage
        .get(ctx, &wal_key(id))
        .await?
        .map(|entry| entry.decode_json())
        .transpose()
}

pub async fn delete_wal(
    storage: &dyn Storage,
    ctx: &RequestContext,
    id: &str,
) -> Result<(), StorageError> {
    storage.delete(ctx, &wal_key(id)).await?;
    tracing::debug!("[engine] deleted WAL entry {}", id);
    Ok(())
}

/// Ids of all stored WAL entries.
pub async fn list_wal(
    storage: &dyn Storage,
    ctx: &RequestContext,
) -> Result<Vec<String>, StorageError> {
    let names = storage.list(ctx, WAL_PREFIX).await?;
    Ok(names.into_iter().filter(|n| !n.ends_with('/')).collect())
}
