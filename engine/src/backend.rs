// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::cache::CredentialCache;
use crate::client::AdcClient;
use crate::constants::{
    CONFIG_STORAGE_KEY, DEFAULT_LEASE_TTL_SECS, ROLE_LOCK_COUNT, ROLE_STORAGE_PREFIX,
};
use crate::locks::{RoleLocks, RootRotationLatch};
use crate::password::PasswordGenerator;
use crate::storage::Storage;

/// Host-provided lease defaults and sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    /// Used when a configuration update omits `ttl`.
    pub default_ttl: u64,
    /// Used when a configuration update omits `max_ttl`.
    pub max_ttl: u64,
    pub lock_count: usize,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_LEASE_TTL_SECS,
            max_ttl: DEFAULT_LEASE_TTL_SECS,
            lock_count: ROLE_LOCK_COUNT,
        }
    }
}

/// The secrets engine.
///
/// One value per mount. It owns the role lock pool, the root rotation latch
/// the credential cache and the configuration write lock; storage, the
/// appliance client and the password generator are injected.
pub struct Backend {
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) client: Arc<dyn AdcClient>,
    pub(crate) passwords: Arc<dyn PasswordGenerator>,
    pub(crate) cache: Arc<CredentialCache>,
    pub(crate) role_locks: RoleLocks,
    pub(crate) root_latch: RootRotationLatch,
    pub(crate) config_lock: Mutex<()>,
    pub(crate) settings: BackendSettings,
}

impl Backend {
    pub fn new(
        storage: Arc<dyn Storage>,
        client: Arc<dyn AdcClient>,
        passwords: Arc<dyn PasswordGenerator>,
        settings: BackendSettings,
    ) -> Self {
        tracing::info!(
            "[engine] backend created with {} role locks",
            settings.lock_count
        );
        Self {
            storage,
            client,
            passwords,
            cache: Arc::new(CredentialCache::new()),
            role_locks: RoleLocks::new(settings.lock_count),
            root_latch: RootRotationLatch::new(),
            config_lock: Mutex::new(()),
            settings,
        }
    }

    pub fn cache(&self) -> &Arc<CredentialCache> {
        &self.cache
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    /// Drops cached state derived from the storage entry at `key`.
    ///
    /// The host calls this when it changes storage behind the engine's back,
    /// for example after replication.
    pub async fn invalidate(&self, key: &str) {
        if key == CONFIG_STORAGE_KEY {
            self.cache.invalidate_all().await;
        } else if let Some(role) = key.strip_prefix(ROLE_STORAGE_PREFIX) {
            self.cache.invalidate(role).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::cache::CachedCredential;
    use crate::client::NitroClient;
    use crate::password::PolicyPasswordGenerator;
    use crate::storage::InMemoryStorage;

    fn backend() -> Backend {
        Backend::new(
            Arc::new(InMemoryStorage::new()),
            Arc::new(NitroClient::new()),
            Arc::new(PolicyPasswordGenerator::new()),
            BackendSettings {
                lock_count: 16,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_invalidate_by_storage_key() {
        let backend = backend();
        assert_eq!(backend.role_locks.len(), 16);

        let credential = CachedCredential::new("u", "p", Instant::now(), Duration::from_secs(60));
        backend.cache.insert("web", credential.clone()).await;
        backend.cache.insert("db", credential).await;

        backend.invalidate("roles/web").await;
        assert!(backend.cache.get("web").await.is_none());
        assert!(backend.cache.get("db").await.is_some());

        backend.invalidate("wal/123").await;
        assert!(backend.cache.get("db").await.is_some());

        backend.invalidate("config").await;
        assert!(backend.cache.is_empty().await);
    }
}
