// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

pub const CONFIG_STORAGE_KEY: &str = "config";
pub const ROLE_STORAGE_PREFIX: &str = "roles/";
pub const CRED_PREFIX: &str = "creds/";
pub const WAL_PREFIX: &str = "wal/";

/// Storage paths the host must seal-wrap.
pub const SEAL_WRAP_STORAGE: [&str; 2] = [CONFIG_STORAGE_KEY, CRED_PREFIX];

pub const ROOT_ROTATION_WAL_KIND: &str = "root-rotation";
/// WAL entries younger than this are left alone by the rollback sweep.
pub const WAL_ROLLBACK_MIN_AGE: Duration = Duration::from_secs(60);

pub const DEFAULT_PASSWORD_LENGTH: usize = 16;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const PASSWORD_TEMPLATE_TOKEN: &str = "{{PASSWORD}}";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 90;
/// 32 days, the usual host default and max lease TTL.
pub const DEFAULT_LEASE_TTL_SECS: u64 = 32 * 24 * 60 * 60;

/// Matches the host's lock helper: one lock per possible leading hash byte.
pub const ROLE_LOCK_COUNT: usize = 256;
pub const CRED_CACHE_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

// Nitro REST surface
pub const NITRO_CONFIG_PATH: [&str; 3] = ["nitro", "v1", "config"];
pub const NITRO_SYSTEM_USER: &str = "systemuser";
pub const NITRO_USER_HEADER: &str = "X-NITRO-USER";
pub const NITRO_PASS_HEADER: &str = "X-NITRO-PASS";

// Validation limits for request models
pub const MAX_ROLE_NAME_LENGTH: u64 = 128;
pub const MAX_USERNAME_LENGTH: u64 = 255;
pub const MAX_URL_LENGTH: u64 = 2048;
