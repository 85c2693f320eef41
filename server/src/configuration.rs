// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::path::PathBuf;
use std::time::Duration;

use adc_secrets_engine::backend::BackendSettings;
use adc_secrets_engine::constants::{DEFAULT_LEASE_TTL_SECS, ROLE_LOCK_COUNT, WAL_ROLLBACK_MIN_AGE};
use clap::Parser;

use crate::constants::{
    DEFAULT_CACHE_CLEANUP_INTERVAL_SECS, DEFAULT_HTTP_HOST, DEFAULT_HTTP_PORT,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_WAL_ROLLBACK_INTERVAL_SECS,
};

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct ServerOptions {
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env("ADC_VAULT_HTTP_HOST"))]
    pub host: String,
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env("ADC_VAULT_HTTP_PORT"))]
    pub port: u16,
    /// Directory for persisted state; kept in memory when unset.
    #[arg(long, env("ADC_VAULT_STORAGE_DIR"))]
    pub storage_dir: Option<PathBuf>,
    /// JSON file mapping policy names to `{"length": .., "charset": ..}`.
    #[arg(long, env("ADC_VAULT_PASSWORD_POLICIES"))]
    pub password_policies: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_LEASE_TTL_SECS, env("ADC_VAULT_DEFAULT_LEASE_TTL"))]
    pub default_lease_ttl: u64,
    #[arg(long, default_value_t = DEFAULT_LEASE_TTL_SECS, env("ADC_VAULT_MAX_LEASE_TTL"))]
    pub max_lease_ttl: u64,
    #[arg(long, default_value_t = ROLE_LOCK_COUNT, env("ADC_VAULT_ROLE_LOCKS"))]
    pub role_locks: usize,
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS, env("ADC_VAULT_REQUEST_TIMEOUT"))]
    pub request_timeout: u64,
    #[arg(long, default_value_t = DEFAULT_CACHE_CLEANUP_INTERVAL_SECS, env("ADC_VAULT_CACHE_CLEANUP_INTERVAL"))]
    pub cache_cleanup_interval: u64,
    #[arg(long, default_value_t = DEFAULT_WAL_ROLLBACK_INTERVAL_SECS, env("ADC_VAULT_WAL_ROLLBACK_INTERVAL"))]
    pub wal_rollback_interval: u64,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
            storage_dir: None,
            password_policies: None,
            default_lease_ttl: DEFAULT_LEASE_TTL_SECS,
            max_lease_ttl: DEFAULT_LEASE_TTL_SECS,
            role_locks: ROLE_LOCK_COUNT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
            cache_cleanup_interval: DEFAULT_CACHE_CLEANUP_INTERVAL_SECS,
            wal_rollback_interval: DEFAULT_WAL_ROLLBACK_INTERVAL_SECS,
        }
    }
}

impl ServerOptions {
    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            default_ttl: self.default_lease_ttl,
            max_ttl: self.max_lease_ttl,
            lock_count: self.role_locks,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    pub fn cache_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cache_cleanup_interval.max(1))
    }

    pub fn wal_rollback_interval(&self) -> Duration {
        Duration::from_secs(self.wal_rollback_interval.max(1))
    }

    pub fn wal_rollback_min_age(&self) -> Duration {
        WAL_ROLLBACK_MIN_AGE
    }
}
