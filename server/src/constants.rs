// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use adc_secrets_engine::constants::{CRED_CACHE_CLEANUP_INTERVAL, WAL_ROLLBACK_MIN_AGE};

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8200;
pub const MAX_BODY_SIZE: usize = 1024 * 1024; // 1 MiB
/// Must outlast the default appliance request timeout (90s).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CACHE_CLEANUP_INTERVAL_SECS: u64 = CRED_CACHE_CLEANUP_INTERVAL.as_secs();
pub const DEFAULT_WAL_ROLLBACK_INTERVAL_SECS: u64 = WAL_ROLLBACK_MIN_AGE.as_secs();
pub const TEMP_FILE_SUFFIX: &str = ".tmp";
