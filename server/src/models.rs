// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::collections::HashMap;

use adc_secrets_engine::password::PasswordPolicy;
use serde::{Deserialize, Serialize};

/// Response of list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    pub keys: Vec<String>,
}

/// Contents of the `--password-policies` file.
pub type PasswordPolicyFile = HashMap<String, PasswordPolicy>;
