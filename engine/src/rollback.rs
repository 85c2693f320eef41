// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! WAL rollback.
//!
//! A `root-rotation` entry that outlived its rotation means the appliance may
//! hold either password. The handler asks the appliance which one it accepts
//! and brings the stored configuration in line:
//!
//! | Appliance accepts | Action |
//! |-------------------|--------|
//! | new password | store it in the configuration, drop the entry |
//! | old password | drop the entry, configuration unchanged |
//! | neither | keep the entry, fail `appliance_auth` |
//! | unreachable | keep the entry, fail `appliance_transport` |
//!
//! Handling the same entry twice has the same effect as handling it once.

use std::time::Duration;

use chrono::Utc;

use crate::backend::Backend;
use crate::constants::ROOT_ROTATION_WAL_KIND;
use crate::context::RequestContext;
use crate::errors::{AdcError, BackendError};
use crate::models::AdcConf;
use crate::wal::{RootRotationWal, WalEntry, delete_wal, get_wal, list_wal};

impl Backend {
    /// Reconciles one WAL entry. `Ok` means the entry is gone.
    #[tracing::instrument(skip(self, ctx, entry), fields(id = %entry.id, kind = %entry.kind))]
    pub async fn wal_rollback(
        &self,
        ctx: &RequestContext,
        entry: &WalEntry,
    ) -> Result<(), BackendError> {
        if entry.kind != ROOT_ROTATION_WAL_KIND {
            tracing::warn!("[engine] dropping WAL entry of unknown kind");
            return self.drop_wal(ctx, &entry.id).await;
        }
        let intent: RootRotationWal = match serde_json::from_value(entry.data.clone()) {
            Ok(intent) => intent,
            Err(err) => {
                tracing::warn!("[engine] dropping undecodable WAL entry: {}", err);
                return self.drop_wal(ctx, &entry.id).await;
            }
        };

        let _latch = self.root_latch.try_acquire()?;

        let Some(config) = self.read_config(ctx).await? else {
            tracing::info!("[engine] no configuration to reconcile, dropping WAL entry");
            return self.drop_wal(ctx, &entry.id).await;
        };

        match self
            .probe_admin(ctx, &config.adc_conf, &intent.new_password)
            .await
        {
            Ok(()) => {
                if config.adc_conf.admin_password != intent.new_password {
                    if self.store_admin_password(ctx, &intent.new_password).await? {
                        tracing::info!("[engine] stored root password from interrupted rotation");
                    } else {
                        tracing::info!("[engine] configuration deleted while reconciling");
                    }
                }
                return self.drop_wal(ctx, &entry.id).await;
            }
            Err(AdcError::AuthFailed(_)) => {}
            Err(err) => return Err(err.into()),
        }

        self.probe_admin(ctx, &config.adc_conf, &intent.old_password)
            .await?;
        tracing::info!("[engine] appliance kept the previous root password");
        self.drop_wal(ctx, &entry.id).await
    }

    /// Authenticates as the admin user with `password`.
    async fn probe_admin(
        &self,
        ctx: &RequestContext,
        conf: &AdcConf,
        password: &str,
    ) -> Result<(), AdcError> {
        let candidate = conf.with_admin_password(password);
        self.client
            .get_user(ctx, &candidate, &conf.admin_username)
            .await
            .map(|_| ())
    }

    async fn drop_wal(&self, ctx: &RequestContext, id: &str) -> Result<(), BackendError> {
        delete_wal(self.storage.as_ref(), ctx, id).await?;
        Ok(())
    }

    /// Runs the rollback handler on every WAL entry at least `min_age` old.
    ///
    /// Returns how many entries were resolved. Entries that could not be
    /// resolved stay for the next sweep, as does everything while a root
    /// rotation holds the latch.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn rollback_stale_wals(
        &self,
        ctx: &RequestContext,
        min_age: Duration,
    ) -> Result<usize, BackendError> {
        let min_age = chrono::Duration::from_std(min_age)
            .map_err(|err| BackendError::InvalidRequest(err.to_string()))?;
        if self.root_latch.is_held() {
            tracing::debug!("[engine] root rotation running, skipping WAL sweep");
            return Ok(0);
        }
        let mut resolved = 0;

        for id in list_wal(self.storage.as_ref(), ctx).await? {
            let Some(entry) = get_wal(self.storage.as_ref(), ctx, &id).await? else {
                continue;
            };
            if Utc::now() - entry.created_at < min_age {
                continue;
            }
            match self.wal_rollback(ctx, &entry).await {
                Ok(()) => resolved += 1,
                Err(err) if err.is_transient() => {
                    tracing::warn!("[engine] WAL entry {} not resolved yet: {}", id, err);
                }
                Err(err) => {
                    tracing::error!("[engine] WAL entry {} not resolved: {}", id, err);
                }
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::BackendSettings;
    use crate::client::NitroClient;
    use crate::password::PolicyPasswordGenerator;
    use crate::storage::InMemoryStorage;
    use crate::wal::put_wal;

    #[tokio::test]
    async fn test_sweep_waits_for_running_rotation() {
        let backend = Backend::new(
            Arc::new(InMemoryStorage::new()),
            Arc::new(NitroClient::new()),
            Arc::new(PolicyPasswordGenerator::new()),
            BackendSettings::default(),
        );
        let ctx = RequestContext::new();
        let intent = RootRotationWal {
            old_password: "old".into(),
            new_password: "new".into(),
        };
        let id = put_wal(backend.storage.as_ref(), &ctx, ROOT_ROTATION_WAL_KIND, &intent)
            .await
            .unwrap();

        let latch = backend.root_latch.try_acquire().unwrap();
        let resolved = backend
            .rollback_stale_wals(&ctx, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(resolved, 0);
        assert_eq!(list_wal(backend.storage.as_ref(), &ctx).await.unwrap(), vec![id]);

        // without a configuration the entry has nothing to reconcile
        drop(latch);
        let resolved = backend
            .rollback_stale_wals(&ctx, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(resolved, 1);
        assert!(list_wal(backend.storage.as_ref(), &ctx).await.unwrap().is_empty());
    }
}
