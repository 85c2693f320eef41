// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use validator::Validate;

use crate::backend::Backend;
use crate::constants::ROLE_STORAGE_PREFIX;
use crate::context::RequestContext;
use crate::errors::BackendError;
use crate::models::{Role, RoleRequest, validate_role_name};
use crate::storage::StorageEntry;

fn role_key(name: &str) -> String {
    format!("{ROLE_STORAGE_PREFIX}{name}")
}

fn check_role_name(name: &str) -> Result<(), BackendError> {
    validate_role_name(name)
        .map_err(|err| BackendError::InvalidRequest(format!("invalid role name {name:?}: {err}")))
}

impl Backend {
    pub async fn list_roles(&self, ctx: &RequestContext) -> Result<Vec<String>, BackendError> {
        let names = self.storage.list(ctx, ROLE_STORAGE_PREFIX).await?;
        Ok(names.into_iter().filter(|n| !n.ends_with('/')).collect())
    }

    pub async fn read_role(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<Option<Role>, BackendError> {
        let Some(entry) = self.storage.get(ctx, &role_key(name)).await? else {
            return Ok(None);
        };
        Ok(Some(entry.decode_json()?))
    }

    pub async fn write_role(
        &self,
        ctx: &RequestContext,
        name: &str,
        role: &Role,
    ) -> Result<(), BackendError> {
        let entry = StorageEntry::json(&role_key(name), role)?;
        self.storage.put(ctx, entry).await?;
        Ok(())
    }

    pub async fn delete_role(&self, ctx: &RequestContext, name: &str) -> Result<(), BackendError> {
        self.storage.delete(ctx, &role_key(name)).await?;
        Ok(())
    }

    /// Creates or replaces a role.
    ///
    /// Requires a configuration, and the username must exist on the
    /// appliance. Omitted fields keep their stored value; a new role without
    /// a TTL takes the configuration's `ttl`. Waits for an in-flight rotation
    /// of the role to finish.
    #[tracing::instrument(skip(self, ctx, request))]
    pub async fn role_update(
        &self,
        ctx: &RequestContext,
        name: &str,
        request: RoleRequest,
    ) -> Result<Role, BackendError> {
        check_role_name(name)?;
        request.validate()?;

        // held through the cache invalidation so no rotation straddles the write
        let _guard = self.role_locks.acquire(ctx, name).await?;
        let config = self
            .read_config(ctx)
            .await?
            .ok_or(BackendError::NotConfigured)?;
        let existing = self.read_role(ctx, name).await?;

        let username = request
            .username
            .or_else(|| existing.as_ref().map(|role| role.username.clone()))
            .ok_or_else(|| BackendError::InvalidRequest("username is required".to_string()))?;
        let ttl = request
            .ttl
            .or_else(|| existing.as_ref().map(|role| role.ttl))
            .unwrap_or(config.password_conf.ttl);
        if ttl > config.password_conf.max_ttl {
            return Err(BackendError::InvalidRequest(format!(
                "ttl {ttl} exceeds the configured max_ttl {}",
                config.password_conf.max_ttl
            )));
        }

        self.client
            .get_user(ctx, &config.adc_conf, &username)
            .await?;

        let last_rotation = existing
            .filter(|role| role.username == username)
            .and_then(|role| role.last_rotation);
        let role = Role {
            username,
            ttl,
            last_rotation,
        };
        self.write_role(ctx, name, &role).await?;
        self.cache.invalidate(name).await;
        tracing::info!("[engine] role {} written", name);
        Ok(role)
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn role_delete(&self, ctx: &RequestContext, name: &str) -> Result<(), BackendError> {
        check_role_name(name)?;
        let _guard = self.role_locks.acquire(ctx, name).await?;
        self.delete_role(ctx, name).await?;
        self.cache.invalidate(name).await;
        tracing::info!("[engine] role {} deleted", name);
        Ok(())
    }
}
