// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Password generation.
//!
//! With a named policy configured, generation is delegated to the host's
//! policy of that name and the legacy `length` / `formatter` settings are
//! ignored. Otherwise a random alphanumeric string of `length` characters is
//! produced and, when a formatter is set, substituted for the
//! `{{PASSWORD}}` token in it.

use std::collections::HashMap;

use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use crate::constants::{MIN_PASSWORD_LENGTH, PASSWORD_TEMPLATE_TOKEN};
use crate::context::RequestContext;
use crate::errors::BackendError;
use crate::models::PasswordConf;

/// Produces new passwords for rotations.
#[async_trait]
pub trait PasswordGenerator: Send + Sync {
    async fn generate(
        &self,
        ctx: &RequestContext,
        policy_name: &str,
        length: usize,
        formatter: &str,
    ) -> Result<String, BackendError>;

    /// Whether a named policy is known. Checked when configuration is written.
    fn has_policy(&self, _name: &str) -> bool {
        true
    }
}

/// A named host password policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    pub length: usize,
    pub charset: String,
}

impl PasswordPolicy {
    pub fn validate(&self) -> Result<(), BackendError> {
        if self.length < MIN_PASSWORD_LENGTH {
            return Err(BackendError::InvalidConfig(format!(
                "password policy length must be at least {MIN_PASSWORD_LENGTH}"
            )));
        }
        if self.charset.is_empty() {
            return Err(BackendError::InvalidConfig(
                "password policy charset must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn generate(&self) -> String {
        let charset: Vec<char> = self.charset.chars().collect();
        if charset.is_empty() {
            return String::new();
        }
        let mut rng = rand::rng();
        (0..self.length)
            .map(|_| charset[rng.random_range(0..charset.len())])
            .collect()
    }
}

/// Default generator: a registry of named policies plus the legacy
/// length/formatter scheme.
#[derive(Debug, Clone, Default)]
pub struct PolicyPasswordGenerator {
    policies: HashMap<String, PasswordPolicy>,
}

impl PolicyPasswordGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry, rejecting invalid policies.
    pub fn with_policies(
        policies: HashMap<String, PasswordPolicy>,
    ) -> Result<Self, BackendError> {
        for (name, policy) in &policies {
            policy.validate().map_err(|err| {
                BackendError::InvalidConfig(format!("password policy {name}: {err}"))
            })?;
        }
        Ok(Self { policies })
    }

    pub fn policy_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl PasswordGenerator for PolicyPasswordGenerator {
    async fn generate(
        &self,
        _ctx: &RequestContext,
        policy_name: &str,
        length: usize,
        formatter: &str,
    ) -> Result<String, BackendError> {
        if !policy_name.is_empty() {
            let policy = self.policies.get(policy_name).ok_or_else(|| {
                BackendError::InvalidConfig(format!("unknown password policy {policy_name}"))
            })?;
            return Ok(policy.generate());
        }
        Ok(generate_legacy(length, formatter))
    }

    fn has_policy(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }
}

/// Random alphanumeric password of `length` characters, optionally placed
/// into `formatter` at the `{{PASSWORD}}` token.
pub fn generate_legacy(length: usize, formatter: &str) -> String {
    let password: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    if formatter.is_empty() {
        password
    } else {
        formatter.replacen(PASSWORD_TEMPLATE_TOKEN, &password, 1)
    }
}

impl PasswordConf {
    /// Checks the policy/legacy settings. TTL bounds are checked by the
    /// configuration update path.
    pub fn validate_generation(&self) -> Result<(), BackendError> {
        if !self.password_policy.is_empty() {
            if self.length != 0 || !self.formatter.is_empty() {
                return Err(BackendError::InvalidConfig(
                    "cannot set password_policy and either length or formatter".to_string(),
                ));
            }
            return Ok(());
        }
        if !self.formatter.is_empty() && !self.formatter.contains(PASSWORD_TEMPLATE_TOKEN) {
            return Err(BackendError::InvalidConfig(format!(
                "formatter must contain {PASSWORD_TEMPLATE_TOKEN}"
            )));
        }
        if self.length < MIN_PASSWORD_LENGTH {
            return Err(BackendError::InvalidConfig(format!(
                "it's not possible to generate a secure password of length {}, please boost length to at least {MIN_PASSWORD_LENGTH}",
                self.length
            )));
        }
        Ok(())
    }
}
