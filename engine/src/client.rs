// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! ADC appliance adapter.
//!
//! [`AdcClient`] is the capability set the rotation engine needs from the
//! appliance. [`NitroClient`] implements it over the Nitro REST API:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | [`get_user`](AdcClient::get_user) | `GET /nitro/v1/config/systemuser/<name>` |
//! | [`update_password`](AdcClient::update_password) | `PUT /nitro/v1/config/systemuser/<name>` |
//! | [`update_root_password`](AdcClient::update_root_password) | same, for the admin user |
//!
//! Every request authenticates with the configured admin credentials through
//! the `X-NITRO-USER` / `X-NITRO-PASS` headers. A fresh HTTP client is built
//! per call from the configuration so that certificate, TLS and timeout
//! changes apply immediately.
//!
//! # Error classification
//!
//! - HTTP 401/403 → [`AdcError::AuthFailed`]
//! - HTTP 404 or Nitro error code 258 → [`AdcError::NotFound`]
//! - anything else (connect, TLS, timeout, other statuses) → [`AdcError::Transport`]
//! - cancelled request context → [`AdcError::Canceled`]

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::constants::{
    NITRO_CONFIG_PATH, NITRO_PASS_HEADER, NITRO_SYSTEM_USER, NITRO_USER_HEADER,
};
use crate::context::RequestContext;
use crate::errors::AdcError;
use crate::models::AdcConf;

/// Nitro error code for "No such resource".
const NITRO_NO_SUCH_RESOURCE: i64 = 258;

/// A system user as reported by the appliance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEntry {
    pub username: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

/// Appliance operations used by the engine.
#[async_trait]
pub trait AdcClient: Send + Sync {
    async fn get_user(
        &self,
        ctx: &RequestContext,
        conf: &AdcConf,
        username: &str,
    ) -> Result<UserEntry, AdcError>;

    async fn update_password(
        &self,
        ctx: &RequestContext,
        conf: &AdcConf,
        username: &str,
        new_password: &str,
    ) -> Result<(), AdcError>;

    async fn update_root_password(
        &self,
        ctx: &RequestContext,
        conf: &AdcConf,
        admin_username: &str,
        new_password: &str,
    ) -> Result<(), AdcError>;
}

#[derive(Debug, Deserialize)]
struct NitroResponse {
    #[serde(default)]
    errorcode: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    systemuser: Vec<UserEntry>,
}

#[derive(Serialize)]
struct SystemUserUpdate<'a> {
    systemuser: SystemUserPassword<'a>,
}

#[derive(Serialize)]
struct SystemUserPassword<'a> {
    username: &'a str,
    password: &'a str,
}

/// Nitro REST implementation of [`AdcClient`].
#[derive(Debug, Clone, Default)]
pub struct NitroClient;

impl NitroClient {
    pub fn new() -> Self {
        Self
    }

    fn http_client(conf: &AdcConf) -> Result<reqwest::Client, AdcError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(conf.request_timeout.max(1)))
            .danger_accept_invalid_certs(conf.insecure_tls);

        if !conf.certificate.is_empty() {
            let certificate = reqwest::Certificate::from_pem(conf.certificate.as_bytes())
                .map_err(|err| AdcError::Transport(format!("invalid CA certificate: {err}")))?;
            builder = builder.add_root_certificate(certificate);
        }

        builder
            .build()
            .map_err(|err| AdcError::Transport(format!("unable to build HTTP client: {err}")))
    }

    fn resource_url(conf: &AdcConf, username: &str) -> Result<Url, AdcError> {
        let mut url = Url::parse(&conf.url)
            .map_err(|_| AdcError::Transport(format!("supplied URL {} is not a URL", conf.url)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(AdcError::Transport(format!(
                "supplied URL {} does not have a HTTP/HTTPS scheme",
                conf.url
            )));
        }
        url.path_segments_mut()
            .map_err(|_| AdcError::Transport(format!("supplied URL {} cannot be a base", conf.url)))?
            .pop_if_empty()
            .extend(NITRO_CONFIG_PATH)
            .push(NITRO_SYSTEM_USER)
            .push(username);
        Ok(url)
    }

    async fn find_user(&self, conf: &AdcConf, username: &str) -> Result<UserEntry, AdcError> {
        let client = Self::http_client(conf)?;
        let url = Self::resource_url(conf, username)?;

        let response = client
            .get(url)
            .header(NITRO_USER_HEADER, &conf.admin_username)
            .header(NITRO_PASS_HEADER, &conf.admin_password)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(classify_failure(status, &body, username));
        }

        let parsed: NitroResponse = serde_json::from_slice(&body)
            .map_err(|err| AdcError::Transport(format!("malformed Nitro response: {err}")))?;
        if parsed.errorcode == NITRO_NO_SUCH_RESOURCE {
            return Err(AdcError::NotFound(username.to_string()));
        }
        parsed
            .systemuser
            .into_iter()
            .next()
            .ok_or_else(|| AdcError::NotFound(username.to_string()))
    }

    async fn put_password(
        &self,
        conf: &AdcConf,
        username: &str,
        new_password: &str,
    ) -> Result<(), AdcError> {
        // Nitro answers an update of a missing user with a generic error;
        // look it up first so the caller gets NotFound.
        self.find_user(conf, username).await?;

        let client = Self::http_client(conf)?;
        let url = Self::resource_url(conf, username)?;
        let body = SystemUserUpdate {
            systemuser: SystemUserPassword {
                username,
                password: new_password,
            },
        };

        let response = client
            .put(url)
            .header(NITRO_USER_HEADER, &conf.admin_username)
            .header(NITRO_PASS_HEADER, &conf.admin_password)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.bytes().await.map_err(transport_error)?;
        Err(classify_failure(status, &body, username))
    }
}

#[async_trait]
impl AdcClient for NitroClient {
    #[tracing::instrument(skip(self, ctx, conf))]
    async fn get_user(
        &self,
        ctx: &RequestContext,
        conf: &AdcConf,
        username: &str,
    ) -> Result<UserEntry, AdcError> {
        ctx.run(self.find_user(conf, username))
            .await
            .ok_or(AdcError::Canceled)?
    }

    #[tracing::instrument(skip(self, ctx, conf, new_password))]
    async fn update_password(
        &self,
        ctx: &RequestContext,
        conf: &AdcConf,
        username: &str,
        new_password: &str,
    ) -> Result<(), AdcError> {
        ctx.run(self.put_password(conf, username, new_password))
            .await
            .ok_or(AdcError::Canceled)??;
        tracing::debug!("[engine] updated appliance password for {}", username);
        Ok(())
    }

    #[tracing::instrument(skip(self, ctx, conf, new_password))]
    async fn update_root_password(
        &self,
        ctx: &RequestContext,
        conf: &AdcConf,
        admin_username: &str,
        new_password: &str,
    ) -> Result<(), AdcError> {
        ctx.run(self.put_password(conf, admin_username, new_password))
            .await
            .ok_or(AdcError::Canceled)??;
        tracing::info!("[engine] updated appliance admin password");
        Ok(())
    }
}

fn transport_error(err: reqwest::Error) -> AdcError {
    if err.is_timeout() {
        AdcError::Transport(format!("request to appliance timed out: {err}"))
    } else {
        AdcError::Transport(err.to_string())
    }
}

/// Maps a non-success Nitro response to an [`AdcError`].
fn classify_failure(status: StatusCode, body: &[u8], username: &str) -> AdcError {
    let nitro: Option<NitroResponse> = serde_json::from_slice(body).ok();
    let message = nitro
        .as_ref()
        .map(|n| n.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AdcError::AuthFailed(message),
        StatusCode::NOT_FOUND => AdcError::NotFound(username.to_string()),
        _ if nitro
            .as_ref()
            .is_some_and(|n| n.errorcode == NITRO_NO_SUCH_RESOURCE) =>
        {
            AdcError::NotFound(username.to_string())
        }
        _ => AdcError::Transport(format!("appliance returned {status}: {message}")),
    }
}
