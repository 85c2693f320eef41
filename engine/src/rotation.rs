// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Credential rotation.
//!
//! Role rotations are serialized per role through the lock pool; cache hits
//! never take a lock. Root rotation is guarded by the latch and protected by
//! a `root-rotation` WAL entry from the moment the new password is chosen
//! until the configuration holding it is persisted.

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use zeroize::Zeroizing;

use crate::backend::Backend;
use crate::cache::CachedCredential;
use crate::constants::ROOT_ROTATION_WAL_KIND;
use crate::context::RequestContext;
use crate::errors::{AdcError, BackendError};
use crate::models::{BulkRotationReport, Configuration, CredsResponse};
use crate::wal::{RootRotationWal, delete_wal, put_wal};

impl Backend {
    /// Returns the role's current password, rotating it first when the
    /// cached one is missing or expired.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn read_creds(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<CredsResponse, BackendError> {
        if let Some(cached) = self.cache.get(name).await {
            return Ok(cached.to_response());
        }

        let _guard = self.role_locks.acquire(ctx, name).await?;
        // another reader may have rotated while we waited
        if let Some(cached) = self.cache.get(name).await {
            return Ok(cached.to_response());
        }
        self.rotate_locked(ctx, name).await
    }

    /// Rotates the role's password regardless of the cache.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn rotate_role(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<CredsResponse, BackendError> {
        let _guard = self.role_locks.acquire(ctx, name).await?;
        self.rotate_locked(ctx, name).await
    }

    /// Caller must hold the role's lock entry.
    async fn rotate_locked(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<CredsResponse, BackendError> {
        let mut role = self
            .read_role(ctx, name)
            .await?
            .ok_or_else(|| BackendError::RoleNotFound(name.to_string()))?;
        let config = self
            .read_config(ctx)
            .await?
            .ok_or(BackendError::NotConfigured)?;

        let password = self.generate_password(ctx, &config).await?;
        self.client
            .update_password(ctx, &config.adc_conf, &role.username, &password)
            .await?;

        role.last_rotation = Some(Utc::now());
        self.write_role(ctx, name, &role).await?;

        let cached = CachedCredential::new(
            &role.username,
            &password,
            Instant::now(),
            Duration::from_secs(role.ttl),
        );
        let response = cached.to_response();
        self.cache.insert(name, cached).await;
        tracing::info!("[engine] rotated password for role {}", name);
        Ok(response)
    }

    async fn generate_password(
        &self,
        ctx: &RequestContext,
        config: &Configuration,
    ) -> Result<Zeroizing<String>, BackendError> {
        let conf = &config.password_conf;
        let password = self
            .passwords
            .generate(ctx, &conf.password_policy, conf.length, &conf.formatter)
            .await?;
        Ok(Zeroizing::new(password))
    }

    /// Rotates the administrative password the engine uses on the appliance.
    ///
    /// Fails with `rotation_in_progress` instead of waiting when another root
    /// rotation (or a rollback) holds the latch. Only the bind password and
    /// its rotation time are written back, so configuration changes made
    /// while the appliance call runs are kept. If the appliance accepted the
    /// new password but it could not be stored, the WAL entry stays behind
    /// for the rollback handler.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn rotate_root(&self, ctx: &RequestContext) -> Result<(), BackendError> {
        let _latch = self.root_latch.try_acquire()?;

        let config = self
            .read_config(ctx)
            .await?
            .ok_or(BackendError::NotConfigured)?;
        let new_password = self.generate_password(ctx, &config).await?;

        let intent = RootRotationWal {
            old_password: config.adc_conf.admin_password.clone(),
            new_password: new_password.as_str().to_owned(),
        };
        let wal_id = put_wal(self.storage.as_ref(), ctx, ROOT_ROTATION_WAL_KIND, &intent).await?;

        let admin_username = config.adc_conf.admin_username.clone();
        match self
            .client
            .update_root_password(ctx, &config.adc_conf, &admin_username, &new_password)
            .await
        {
            Ok(()) => {}
            Err(AdcError::Canceled) => {
                tracing::warn!(
                    "[engine] root rotation canceled mid-update, keeping WAL entry {}",
                    wal_id
                );
                return Err(BackendError::Canceled);
            }
            Err(err) => {
                if let Err(wal_err) = delete_wal(self.storage.as_ref(), ctx, &wal_id).await {
                    tracing::warn!(
                        "[engine] unable to delete WAL entry {}: {}",
                        wal_id,
                        wal_err
                    );
                }
                return Err(err.into());
            }
        }

        match self.store_admin_password(ctx, &new_password).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(
                    "[engine] configuration deleted during root rotation, WAL entry {} kept",
                    wal_id
                );
                return Err(BackendError::NotConfigured);
            }
            Err(err) => {
                tracing::error!(
                    "[engine] appliance accepted new root password but storing it failed, WAL entry {} kept: {}",
                    wal_id,
                    err
                );
                return Err(err);
            }
        }

        // a leftover entry reconciles to the stored state
        if let Err(err) = delete_wal(self.storage.as_ref(), ctx, &wal_id).await {
            tracing::warn!("[engine] unable to delete WAL entry {}: {}", wal_id, err);
        }
        tracing::info!("[engine] rotated root credential");
        Ok(())
    }

    /// Force-rotates every role, collecting per-role failures.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn rotate_all_roles(
        &self,
        ctx: &RequestContext,
    ) -> Result<BulkRotationReport, BackendError> {
        let mut report = BulkRotationReport::default();
        for name in self.list_roles(ctx).await? {
            match self.rotate_role(ctx, &name).await {
                Ok(_) => report.rotated.push(name),
                Err(err) => {
                    tracing::warn!("[engine] rotation of role {} failed: {}", name, err);
                    report.failed.insert(name, err.to_string());
                }
            }
        }
        tracing::info!(
            "[engine] bulk rotation finished: {} rotated, {} failed",
            report.rotated.len(),
            report.failed.len()
        );
        Ok(report)
    }
}
