// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Rotation serialization primitives.
//!
//! [`RoleLocks`] is a fixed pool of mutexes; a role maps to the entry picked
//! by the first byte of the SHA-256 of its name, so the pool never grows and
//! two rotations of the same role never run at once. Unrelated roles may
//! share an entry.
//!
//! [`RootRotationLatch`] is a single compare-and-set flag. It never queues:
//! a second caller is told immediately that a rotation is in progress.

use std::sync::atomic::{AtomicBool, Ordering};

use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, MutexGuard};

use crate::constants::ROLE_LOCK_COUNT;
use crate::context::RequestContext;
use crate::errors::BackendError;

pub struct RoleLocks {
    locks: Vec<Mutex<()>>,
}

impl Default for RoleLocks {
    fn default() -> Self {
        Self::new(ROLE_LOCK_COUNT)
    }
}

impl RoleLocks {
    /// Creates `count` lock entries (at least one).
    pub fn new(count: usize) -> Self {
        let count = count.max(1);
        Self {
            locks: (0..count).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn index_for(&self, role: &str) -> usize {
        let digest = Sha256::digest(role.as_bytes());
        usize::from(digest[0]) % self.locks.len()
    }

    /// Waits for the role's lock entry, giving up if `ctx` finishes first.
    pub async fn acquire(
        &self,
        ctx: &RequestContext,
        role: &str,
    ) -> Result<MutexGuard<'_, ()>, BackendError> {
        let lock = &self.locks[self.index_for(role)];
        ctx.run(lock.lock()).await.ok_or(BackendError::Canceled)
    }
}

#[derive(Debug, Default)]
pub struct RootRotationLatch {
    held: AtomicBool,
}

/// Releases the latch when dropped.
#[derive(Debug)]
pub struct RootRotationGuard<'a> {
    latch: &'a RootRotationLatch,
}

impl Drop for RootRotationGuard<'_> {
    fn drop(&mut self) {
        self.latch.held.store(false, Ordering::Release);
    }
}

impl RootRotationLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Result<RootRotationGuard<'_>, BackendError> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| RootRotationGuard { latch: self })
            .map_err(|_| BackendError::RotationInProgress)
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}
