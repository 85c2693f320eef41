// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;
use x509_cert::Certificate;
use x509_cert::der::DecodePem;
use zeroize::ZeroizeOnDrop;

use crate::constants::{MAX_ROLE_NAME_LENGTH, MAX_URL_LENGTH, MAX_USERNAME_LENGTH};

/// Connection settings for the ADC appliance.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct AdcConf {
    pub url: String,
    #[serde(default)]
    pub certificate: String,
    #[serde(default)]
    pub insecure_tls: bool,
    pub request_timeout: u64,
    pub admin_username: String,
    pub admin_password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[zeroize(skip)]
    pub last_bind_password_rotation: Option<DateTime<Utc>>,
}

impl fmt::Debug for AdcConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdcConf")
            .field("url", &self.url)
            .field("certificate", &!self.certificate.is_empty())
            .field("insecure_tls", &self.insecure_tls)
            .field("request_timeout", &self.request_timeout)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"[REDACTED]")
            .field(
                "last_bind_password_rotation",
                &self.last_bind_password_rotation,
            )
            .finish()
    }
}

impl AdcConf {
    /// Same connection with a different admin password, used to probe
    /// which credential the appliance currently accepts.
    pub fn with_admin_password(&self, password: &str) -> Self {
        let mut conf = self.clone();
        conf.admin_password = password.to_string();
        conf
    }
}

/// Password generation and TTL settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordConf {
    pub ttl: u64,
    pub max_ttl: u64,
    #[serde(default)]
    pub length: usize,
    #[serde(default)]
    pub formatter: String,
    #[serde(default)]
    pub password_policy: String,
}

/// The singleton engine configuration stored at `config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub password_conf: PasswordConf,
    pub adc_conf: AdcConf,
}

/// Body of a configuration update.
#[derive(Clone, Default, Deserialize, Validate)]
pub struct ConfigRequest {
    #[validate(length(min = 1, max = MAX_URL_LENGTH))]
    #[validate(custom(function = "validate_adc_url"))]
    pub url: String,

    #[validate(length(min = 1, max = MAX_USERNAME_LENGTH))]
    pub admin_username: String,

    #[validate(length(min = 1))]
    pub admin_password: String,

    #[serde(default)]
    #[validate(custom(function = "validate_certificate"))]
    pub certificate: String,

    #[serde(default)]
    pub insecure_tls: bool,

    #[serde(default)]
    #[validate(range(min = 1))]
    pub request_timeout: Option<u64>,

    #[serde(default)]
    pub ttl: Option<u64>,

    #[serde(default)]
    pub max_ttl: Option<u64>,

    #[serde(default)]
    pub password_policy: String,

    #[serde(default)]
    pub length: Option<usize>,

    #[serde(default)]
    pub formatter: Option<String>,
}

impl fmt::Debug for ConfigRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigRequest")
            .field("url", &self.url)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"[REDACTED]")
            .field("insecure_tls", &self.insecure_tls)
            .field("request_timeout", &self.request_timeout)
            .field("ttl", &self.ttl)
            .field("max_ttl", &self.max_ttl)
            .field("password_policy", &self.password_policy)
            .field("length", &self.length)
            .field("formatter", &self.formatter)
            .finish()
    }
}

/// Redacted configuration returned by reads. Never carries the admin
/// password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigView {
    pub url: String,
    pub certificate: String,
    pub insecure_tls: bool,
    pub request_timeout: u64,
    pub admin_username: String,
    pub ttl: u64,
    pub max_ttl: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub length: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub formatter: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password_policy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_bind_password_rotation: Option<DateTime<Utc>>,
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}

impl From<&Configuration> for ConfigView {
    fn from(config: &Configuration) -> Self {
        let adc = &config.adc_conf;
        let password = &config.password_conf;
        Self {
            url: adc.url.clone(),
            certificate: adc.certificate.clone(),
            insecure_tls: adc.insecure_tls,
            request_timeout: adc.request_timeout,
            admin_username: adc.admin_username.clone(),
            ttl: password.ttl,
            max_ttl: password.max_ttl,
            length: password.length,
            formatter: password.formatter.clone(),
            password_policy: password.password_policy.clone(),
            last_bind_password_rotation: adc.last_bind_password_rotation,
        }
    }
}

/// A managed appliance account, stored at `roles/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub username: String,
    pub ttl: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rotation: Option<DateTime<Utc>>,
}

/// Body of a role upsert. Omitted fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct RoleRequest {
    #[serde(default, alias = "user_name", skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = MAX_USERNAME_LENGTH))]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub ttl: Option<u64>,
}

/// Response of a credential read.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct CredsResponse {
    pub username: String,
    pub current_password: String,
}

impl fmt::Debug for CredsResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredsResponse")
            .field("username", &self.username)
            .field("current_password", &"[REDACTED]")
            .finish()
    }
}

/// Outcome of rotating every role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRotationReport {
    pub rotated: Vec<String>,
    pub failed: BTreeMap<String, String>,
}

/// Accepts `http`/`https` URLs with a host; the port is optional.
pub fn validate_adc_url(url: &str) -> Result<(), validator::ValidationError> {
    let parsed = Url::parse(url).map_err(|_| {
        validator::ValidationError::new("invalid_url")
            .with_message(format!("supplied URL {url} is not a URL").into())
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(validator::ValidationError::new("invalid_url_scheme")
            .with_message(format!("supplied URL {url} does not have a HTTP/HTTPS scheme").into()));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(validator::ValidationError::new("invalid_url_host"));
    }
    Ok(())
}

/// Accepts an empty string or exactly one PEM `CERTIFICATE` block holding a
/// well-formed X.509 certificate.
pub fn validate_certificate(pem: &str) -> Result<(), validator::ValidationError> {
    if pem.is_empty() {
        return Ok(());
    }
    Certificate::from_pem(pem.trim().as_bytes()).map_err(|err| {
        validator::ValidationError::new("invalid_certificate")
            .with_message(format!("failed to parse server tls cert: {err}").into())
    })?;
    Ok(())
}

/// Role names are used as storage path segments: word characters, `-` and
/// `.`, starting and ending with a word character.
pub fn validate_role_name(name: &str) -> Result<(), validator::ValidationError> {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';

    if name.is_empty() || name.len() as u64 > MAX_ROLE_NAME_LENGTH {
        return Err(validator::ValidationError::new("invalid_role_name_length"));
    }
    if !name.chars().all(|c| is_word(c) || c == '-' || c == '.') {
        return Err(validator::ValidationError::new("invalid_role_name_chars"));
    }
    let first = name.chars().next().is_some_and(is_word);
    let last = name.chars().last().is_some_and(is_word);
    if !first || !last {
        return Err(validator::ValidationError::new("invalid_role_name_edges"));
    }
    Ok(())
}
