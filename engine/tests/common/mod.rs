// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Shared fakes for the engine integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adc_secrets_engine::backend::{Backend, BackendSettings};
use adc_secrets_engine::client::{AdcClient, UserEntry};
use adc_secrets_engine::context::RequestContext;
use adc_secrets_engine::errors::{AdcError, BackendError, StorageError};
use adc_secrets_engine::models::{AdcConf, ConfigRequest, RoleRequest};
use adc_secrets_engine::password::PasswordGenerator;
use adc_secrets_engine::storage::{InMemoryStorage, Storage, StorageEntry};
use async_trait::async_trait;

pub const ADMIN_USER: &str = "nsroot";
pub const ADMIN_PASSWORD: &str = "initial-admin";

/// In-memory appliance. Requests authenticate against the admin password it
/// currently holds.
pub struct MockAdc {
    admin_password: Mutex<String>,
    users: Mutex<HashMap<String, String>>,
    pub update_calls: AtomicUsize,
    pub root_calls: AtomicUsize,
    pub unreachable: AtomicBool,
    pub update_delay: Duration,
    pub root_delay: Duration,
}

impl MockAdc {
    pub fn new() -> Self {
        Self::with_delays(Duration::ZERO, Duration::ZERO)
    }

    pub fn with_delays(update_delay: Duration, root_delay: Duration) -> Self {
        let users = HashMap::from([
            (ADMIN_USER.to_string(), ADMIN_PASSWORD.to_string()),
            ("svc_web".to_string(), "unknown".to_string()),
            ("svc_db".to_string(), "unknown".to_string()),
        ]);
        Self {
            admin_password: Mutex::new(ADMIN_PASSWORD.to_string()),
            users: Mutex::new(users),
            update_calls: AtomicUsize::new(0),
            root_calls: AtomicUsize::new(0),
            unreachable: AtomicBool::new(false),
            update_delay,
            root_delay,
        }
    }

    pub fn admin_password(&self) -> String {
        self.admin_password.lock().unwrap().clone()
    }

    pub fn password_of(&self, username: &str) -> Option<String> {
        self.users.lock().unwrap().get(username).cloned()
    }

    pub fn remove_user(&self, username: &str) {
        self.users.lock().unwrap().remove(username);
    }

    pub fn updates(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn authenticate(&self, conf: &AdcConf) -> Result<(), AdcError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AdcError::Transport("connection refused".into()));
        }
        if conf.admin_username != ADMIN_USER || conf.admin_password != self.admin_password() {
            return Err(AdcError::AuthFailed("Invalid username or password".into()));
        }
        Ok(())
    }

    fn lookup(&self, username: &str) -> Result<UserEntry, AdcError> {
        if !self.users.lock().unwrap().contains_key(username) {
            return Err(AdcError::NotFound(username.to_string()));
        }
        Ok(UserEntry {
            username: username.to_string(),
            attributes: Default::default(),
        })
    }

    async fn pause(ctx: &RequestContext, delay: Duration) -> Result<(), AdcError> {
        if delay.is_zero() {
            return Ok(());
        }
        ctx.run(tokio::time::sleep(delay))
            .await
            .ok_or(AdcError::Canceled)
    }
}

#[async_trait]
impl AdcClient for MockAdc {
    async fn get_user(
        &self,
        ctx: &RequestContext,
        conf: &AdcConf,
        username: &str,
    ) -> Result<UserEntry, AdcError> {
        if ctx.is_done() {
            return Err(AdcError::Canceled);
        }
        self.authenticate(conf)?;
        self.lookup(username)
    }

    async fn update_password(
        &self,
        ctx: &RequestContext,
        conf: &AdcConf,
        username: &str,
        new_password: &str,
    ) -> Result<(), AdcError> {
        self.authenticate(conf)?;
        self.lookup(username)?;
        Self::pause(ctx, self.update_delay).await?;
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.users
            .lock()
            .unwrap()
            .insert(username.to_string(), new_password.to_string());
        Ok(())
    }

    async fn update_root_password(
        &self,
        ctx: &RequestContext,
        conf: &AdcConf,
        admin_username: &str,
        new_password: &str,
    ) -> Result<(), AdcError> {
        self.authenticate(conf)?;
        self.lookup(admin_username)?;
        Self::pause(ctx, self.root_delay).await?;
        self.root_calls.fetch_add(1, Ordering::SeqCst);
        *self.admin_password.lock().unwrap() = new_password.to_string();
        self.users
            .lock()
            .unwrap()
            .insert(admin_username.to_string(), new_password.to_string());
        Ok(())
    }
}

/// Deterministic generator: `pw-1`, `pw-2`, ...
#[derive(Default)]
pub struct SequentialPasswords {
    counter: AtomicUsize,
}

#[async_trait]
impl PasswordGenerator for SequentialPasswords {
    async fn generate(
        &self,
        _ctx: &RequestContext,
        _policy_name: &str,
        _length: usize,
        _formatter: &str,
    ) -> Result<String, BackendError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("pw-{n}"))
    }
}

/// In-memory storage that can be told to fail writes to one key.
#[derive(Default)]
pub struct FlakyStorage {
    inner: InMemoryStorage,
    fail_puts_for: Mutex<Option<String>>,
    pub puts: AtomicUsize,
}

impl FlakyStorage {
    pub fn fail_puts_for(&self, key: &str) {
        *self.fail_puts_for.lock().unwrap() = Some(key.to_string());
    }

    pub fn heal(&self) {
        *self.fail_puts_for.lock().unwrap() = None;
    }
}

#[async_trait]
impl Storage for FlakyStorage {
    async fn list(&self, ctx: &RequestContext, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list(ctx, prefix).await
    }

    async fn get(
        &self,
        ctx: &RequestContext,
        key: &str,
    ) -> Result<Option<StorageEntry>, StorageError> {
        self.inner.get(ctx, key).await
    }

    async fn put(&self, ctx: &RequestContext, entry: StorageEntry) -> Result<(), StorageError> {
        if self.fail_puts_for.lock().unwrap().as_deref() == Some(entry.key.as_str()) {
            return Err(StorageError::Backend("injected write failure".into()));
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(ctx, entry).await
    }

    async fn delete(&self, ctx: &RequestContext, key: &str) -> Result<(), StorageError> {
        self.inner.delete(ctx, key).await
    }
}

pub struct Harness {
    pub backend: Arc<Backend>,
    pub adc: Arc<MockAdc>,
    pub storage: Arc<FlakyStorage>,
}

pub fn harness_with(adc: MockAdc) -> Harness {
    let adc = Arc::new(adc);
    let storage = Arc::new(FlakyStorage::default());
    let backend = Backend::new(
        storage.clone(),
        adc.clone(),
        Arc::new(SequentialPasswords::default()),
        BackendSettings {
            default_ttl: 60,
            max_ttl: 3600,
            lock_count: 256,
        },
    );
    Harness {
        backend: Arc::new(backend),
        adc,
        storage,
    }
}

pub fn harness() -> Harness {
    harness_with(MockAdc::new())
}

pub fn config_request() -> ConfigRequest {
    ConfigRequest {
        url: "https://adc.example".into(),
        admin_username: ADMIN_USER.into(),
        admin_password: ADMIN_PASSWORD.into(),
        ttl: Some(60),
        max_ttl: Some(3600),
        ..Default::default()
    }
}

pub fn role_request(username: &str, ttl: u64) -> RoleRequest {
    RoleRequest {
        username: Some(username.to_string()),
        ttl: Some(ttl),
    }
}

/// Configures the engine and creates role `web` for `svc_web`.
pub async fn configured(harness: &Harness, role_ttl: u64) {
    let ctx = RequestContext::new();
    harness
        .backend
        .config_update(&ctx, config_request())
        .await
        .unwrap();
    harness
        .backend
        .role_update(&ctx, "web", role_request("svc_web", role_ttl))
        .await
        .unwrap();
}
