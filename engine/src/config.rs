// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use chrono::Utc;
use tokio::sync::MutexGuard;
use validator::Validate;

use crate::backend::Backend;
use crate::constants::{CONFIG_STORAGE_KEY, DEFAULT_PASSWORD_LENGTH, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::context::RequestContext;
use crate::errors::BackendError;
use crate::models::{AdcConf, ConfigRequest, ConfigView, Configuration, PasswordConf};
use crate::storage::StorageEntry;

impl Backend {
    pub async fn read_config(
        &self,
        ctx: &RequestContext,
    ) -> Result<Option<Configuration>, BackendError> {
        let Some(entry) = self.storage.get(ctx, CONFIG_STORAGE_KEY).await? else {
            return Ok(None);
        };
        Ok(Some(entry.decode_json()?))
    }

    pub async fn write_config(
        &self,
        ctx: &RequestContext,
        config: &Configuration,
    ) -> Result<(), BackendError> {
        let entry = StorageEntry::json(CONFIG_STORAGE_KEY, config)?;
        self.storage.put(ctx, entry).await?;
        Ok(())
    }

    pub async fn delete_config(&self, ctx: &RequestContext) -> Result<(), BackendError> {
        self.storage.delete(ctx, CONFIG_STORAGE_KEY).await?;
        Ok(())
    }

    /// Serializes writers of the configuration record.
    async fn lock_config(&self, ctx: &RequestContext) -> Result<MutexGuard<'_, ()>, BackendError> {
        ctx.run(self.config_lock.lock())
            .await
            .ok_or(BackendError::Canceled)
    }

    /// Sets the bind password on the stored configuration, keeping every
    /// other field as last written. Returns `false` when there is no
    /// configuration.
    pub(crate) async fn store_admin_password(
        &self,
        ctx: &RequestContext,
        admin_password: &str,
    ) -> Result<bool, BackendError> {
        let _guard = self.lock_config(ctx).await?;
        let Some(mut config) = self.read_config(ctx).await? else {
            return Ok(false);
        };
        config.adc_conf.admin_password = admin_password.to_owned();
        config.adc_conf.last_bind_password_rotation = Some(Utc::now());
        self.write_config(ctx, &config).await?;
        Ok(true)
    }

    /// Validates and stores a new configuration, replacing any existing one.
    ///
    /// Nothing is written when validation fails. Cached credentials are
    /// dropped on success.
    #[tracing::instrument(skip(self, ctx, request), fields(url = %request.url))]
    pub async fn config_update(
        &self,
        ctx: &RequestContext,
        request: ConfigRequest,
    ) -> Result<ConfigView, BackendError> {
        request
            .validate()
            .map_err(|err| BackendError::InvalidConfig(err.to_string()))?;

        let password_conf = self.password_conf_from(&request)?;
        password_conf.validate_generation()?;
        if !password_conf.password_policy.is_empty()
            && !self.passwords.has_policy(&password_conf.password_policy)
        {
            return Err(BackendError::InvalidConfig(format!(
                "unknown password policy {}",
                password_conf.password_policy
            )));
        }

        let _guard = self.lock_config(ctx).await?;
        let previous_rotation = self
            .read_config(ctx)
            .await?
            .and_then(|existing| existing.adc_conf.last_bind_password_rotation);

        let config = Configuration {
            password_conf,
            adc_conf: AdcConf {
                url: request.url.to_lowercase(),
                certificate: request.certificate.clone(),
                insecure_tls: request.insecure_tls,
                request_timeout: request
                    .request_timeout
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
                admin_username: request.admin_username.clone(),
                admin_password: request.admin_password.clone(),
                last_bind_password_rotation: previous_rotation,
            },
        };

        self.write_config(ctx, &config).await?;
        self.cache.invalidate_all().await;
        tracing::info!("[engine] configuration updated");
        Ok(ConfigView::from(&config))
    }

    fn password_conf_from(&self, request: &ConfigRequest) -> Result<PasswordConf, BackendError> {
        let ttl = request.ttl.unwrap_or(self.settings.default_ttl);
        let max_ttl = request.max_ttl.unwrap_or(self.settings.max_ttl);
        if ttl > max_ttl {
            return Err(BackendError::InvalidConfig(
                "ttl must be smaller than or equal to max_ttl".to_string(),
            ));
        }
        if ttl < 1 {
            return Err(BackendError::InvalidConfig("ttl must be positive".to_string()));
        }
        if max_ttl < 1 {
            return Err(BackendError::InvalidConfig(
                "max_ttl must be positive".to_string(),
            ));
        }

        let has_policy = !request.password_policy.is_empty();
        let has_legacy = request.length.is_some()
            || request.formatter.as_deref().is_some_and(|f| !f.is_empty());
        if has_policy && has_legacy {
            return Err(BackendError::InvalidConfig(
                "cannot set password_policy and either length or formatter".to_string(),
            ));
        }

        let length = match request.length {
            Some(length) => length,
            None if has_policy => 0,
            None => DEFAULT_PASSWORD_LENGTH,
        };
        Ok(PasswordConf {
            ttl,
            max_ttl,
            length,
            formatter: request.formatter.clone().unwrap_or_default(),
            password_policy: request.password_policy.clone(),
        })
    }

    /// Redacted view of the stored configuration.
    pub async fn config_read(
        &self,
        ctx: &RequestContext,
    ) -> Result<Option<ConfigView>, BackendError> {
        Ok(self.read_config(ctx).await?.as_ref().map(ConfigView::from))
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn config_delete(&self, ctx: &RequestContext) -> Result<(), BackendError> {
        let _guard = self.lock_config(ctx).await?;
        self.delete_config(ctx).await?;
        self.cache.invalidate_all().await;
        tracing::info!("[engine] configuration deleted");
        Ok(())
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

    fn backend() -> Backend {
        Backend::new(
            Arc::new(InMemoryStorage::new()),
            Arc::new(NitroClient::new()),
            Arc::new(PolicyPasswordGenerator::new()),
            BackendSettings {
                default_ttl: 3600,
                max_ttl: 7200,
                lock_count: 4,
            },
        )
    }

    fn request() -> ConfigRequest {
        ConfigRequest {
            url: "HTTPS://ADC.Example/".into(),
            admin_username: "root".into(),
            admin_password: "s3cr3t".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_update_applies_defaults() {
        let backend = backend();
        let ctx = RequestContext::new();

        let view = backend.config_update(&ctx, request()).await.unwrap();
        assert_eq!(view.url, "https://adc.example/");
        assert_eq!(view.ttl, 3600);
        assert_eq!(view.max_ttl, 7200);
        assert_eq!(view.length, DEFAULT_PASSWORD_LENGTH);
        assert_eq!(view.request_timeout, DEFAULT_REQUEST_TIMEOUT_SECS);

        let stored = backend.read_config(&ctx).await.unwrap().unwrap();
        assert_eq!(stored.adc_conf.admin_password, "s3cr3t");
        assert_eq!(backend.config_read(&ctx).await.unwrap(), Some(view));
    }

    #[tokio::test]
    async fn test_ttl_bounds() {
        let backend = backend();
        let ctx = RequestContext::new();

        let err = backend
            .config_update(
                &ctx,
                ConfigRequest {
                    ttl: Some(100),
                    max_ttl: Some(50),
                    ..request()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BackendError::InvalidConfig("ttl must be smaller than or equal to max_ttl".into())
        );

        let err = backend
            .config_update(
                &ctx,
                ConfigRequest {
                    ttl: Some(0),
                    ..request()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::InvalidConfig("ttl must be positive".into()));
        assert!(backend.read_config(&ctx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_policy_excludes_legacy_fields() {
        let backend = backend();
        let ctx = RequestContext::new();

        let err = backend
            .config_update(
                &ctx,
                ConfigRequest {
                    password_policy: "adc".into(),
                    length: Some(20),
                    ..request()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_config");

        // known only to the registry, so rejected here
        let err = backend
            .config_update(
                &ctx,
                ConfigRequest {
                    password_policy: "adc".into(),
                    ..request()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::InvalidConfig("unknown password policy adc".into()));
    }

    #[tokio::test]
    async fn test_delete_clears_config() {
        let backend = backend();
        let ctx = RequestContext::new();
        backend.config_update(&ctx, request()).await.unwrap();

        backend.config_delete(&ctx).await.unwrap();
        assert!(backend.config_read(&ctx).await.unwrap().is_none());
    }
}
