// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use zeroize::ZeroizeOnDrop;

use crate::models::CredsResponse;

/// The password this engine last set for a role.
#[derive(Clone, ZeroizeOnDrop)]
pub struct CachedCredential {
    pub username: String,
    pub password: String,
    #[zeroize(skip)]
    pub issued_at: Instant,
    #[zeroize(skip)]
    pub ttl: Duration,
}

// Custom Debug implementation to prevent accidental logging of sensitive data
impl fmt::Debug for CachedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedCredential")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl CachedCredential {
    pub fn new(username: &str, password: &str, issued_at: Instant, ttl: Duration) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            issued_at,
            ttl,
        }
    }

    /// Fresh while `now < issued_at + ttl`.
    pub fn is_fresh(&self, now: Instant) -> bool {
        self.issued_at
            .checked_add(self.ttl)
            .is_some_and(|expires_at| now < expires_at)
    }

    pub fn to_response(&self) -> CredsResponse {
        CredsResponse {
            username: self.username.clone(),
            current_password: self.password.clone(),
        }
    }
}

/// Process-local role → credential map.
///
/// Advisory only: an entry is never returned past `issued_at + ttl`, and any
/// entry may disappear at any time through invalidation or the sweep.
#[derive(Default)]
pub struct CredentialCache {
    entries: RwLock<HashMap<String, CachedCredential>>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `role` if it is still fresh.
    pub async fn get(&self, role: &str) -> Option<CachedCredential> {
        let entries = self.entries.read().await;
        entries
            .get(role)
            .filter(|cached| cached.is_fresh(Instant::now()))
            .cloned()
    }

    pub async fn insert(&self, role: &str, credential: CachedCredential) {
        self.entries
            .write()
            .await
            .insert(role.to_string(), credential);
    }

    pub async fn invalidate(&self, role: &str) {
        if self.entries.write().await.remove(role).is_some() {
            tracing::debug!("[engine] invalidated cached credential for role {}", role);
        }
    }

    pub async fn invalidate_all(&self) {
        let mut entries = self.entries.write().await;
        if !entries.is_empty() {
            tracing::debug!("[engine] invalidated {} cached credentials", entries.len());
        }
        entries.clear();
    }

    /// Drops every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, cached| cached.is_fresh(now));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Starts the background sweep on the current runtime.
    pub fn spawn_cleanup(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let purged = cache.purge_expired().await;
                if purged > 0 {
                    tracing::debug!("[engine] purged {} expired credentials", purged);
                }
            }
        })
    }
}
