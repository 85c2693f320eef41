// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! HTTP integration tests for the secrets engine API.
//!
//! These tests use `axum-test` to test the full HTTP request/response cycle
//! through the Axum router with all middleware applied. The appliance is
//! replaced with an in-memory fake.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use adc_secrets_engine::backend::{Backend, BackendSettings};
use adc_secrets_engine::client::{AdcClient, UserEntry};
use adc_secrets_engine::context::RequestContext;
use adc_secrets_engine::errors::AdcError;
use adc_secrets_engine::models::AdcConf;
use adc_secrets_engine::password::PolicyPasswordGenerator;
use adc_secrets_engine::storage::InMemoryStorage;
use adc_secrets_server::application::create_router;
use adc_secrets_server::configuration::ServerOptions;
use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Appliance with fixed users that accepts the current admin password.
struct FakeAdc {
    admin_password: Mutex<String>,
    passwords: Mutex<HashMap<String, String>>,
}

impl FakeAdc {
    fn new() -> Self {
        Self {
            admin_password: Mutex::new("admin-pw".to_string()),
            passwords: Mutex::new(HashMap::from([
                ("nsroot".to_string(), "admin-pw".to_string()),
                ("svc_web".to_string(), String::new()),
            ])),
        }
    }

    fn check(&self, conf: &AdcConf, username: &str) -> Result<(), AdcError> {
        if conf.admin_password != *self.admin_password.lock().unwrap() {
            return Err(AdcError::AuthFailed("Invalid username or password".into()));
        }
        if !self.passwords.lock().unwrap().contains_key(username) {
            return Err(AdcError::NotFound(username.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AdcClient for FakeAdc {
    async fn get_user(
        &self,
        _ctx: &RequestContext,
        conf: &AdcConf,
        username: &str,
    ) -> Result<UserEntry, AdcError> {
        self.check(conf, username)?;
        Ok(UserEntry {
            username: username.to_string(),
            attributes: Default::default(),
        })
    }

    async fn update_password(
        &self,
        _ctx: &RequestContext,
        conf: &AdcConf,
        username: &str,
        new_password: &str,
    ) -> Result<(), AdcError> {
        self.check(conf, username)?;
        self.passwords
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
        self.update_password(ctx, conf, admin_username, new_password)
            .await?;
        *self.admin_password.lock().unwrap() = new_password.to_string();
        Ok(())
    }
}

/// Creates a test server with default options and an unconfigured engine.
fn create_test_server() -> (TestServer, Arc<FakeAdc>) {
    let adc = Arc::new(FakeAdc::new());
    let backend = Arc::new(Backend::new(
        Arc::new(InMemoryStorage::new()),
        adc.clone(),
        Arc::new(PolicyPasswordGenerator::new()),
        BackendSettings {
            default_ttl: 300,
            max_ttl: 3600,
            lock_count: 16,
        },
    ));
    let app = create_router(&ServerOptions::default(), backend, CancellationToken::new());
    (TestServer::new(app).unwrap(), adc)
}

fn valid_config() -> serde_json::Value {
    json!({
        "url": "https://adc.example",
        "admin_username": "nsroot",
        "admin_password": "admin-pw",
        "ttl": 60,
        "max_ttl": 600
    })
}

async fn configured_server() -> (TestServer, Arc<FakeAdc>) {
    let (server, adc) = create_test_server();
    server
        .post("/config")
        .json(&valid_config())
        .await
        .assert_status_ok();
    server
        .post("/roles/web")
        .json(&json!({"username": "svc_web", "ttl": 30}))
        .await
        .assert_status_ok();
    (server, adc)
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_status_ok_body() {
    let (server, _) = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({"status": "ok"}));
}

// =============================================================================
// Configuration
// =============================================================================

#[tokio::test]
async fn test_config_round_trip_is_redacted() {
    let (server, _) = create_test_server();
    server.get("/config").await.assert_status(StatusCode::NOT_FOUND);

    server
        .post("/config")
        .json(&valid_config())
        .await
        .assert_status_ok();

    let response = server.get("/config").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["url"], "https://adc.example");
    assert_eq!(body["ttl"], 60);
    assert_eq!(body["length"], 16);
    assert_eq!(body["request_timeout"], 90);
    assert!(body.get("admin_password").is_none());
    assert!(body.get("last_bind_password_rotation").is_none());

    server.delete("/config").await.assert_status(StatusCode::NO_CONTENT);
    server.get("/config").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_ttl_is_rejected() {
    let (server, _) = create_test_server();
    let mut config = valid_config();
    config["ttl"] = json!(100);
    config["max_ttl"] = json!(50);

    let response = server.post("/config").json(&config).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "invalid_config");
    assert_eq!(body["code"], 400);

    server.get("/config").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let (server, _) = create_test_server();
    let response = server
        .post("/config")
        .json(&json!({"url": "https://adc.example"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "invalid_request");
}

// =============================================================================
// Roles and credentials
// =============================================================================

#[tokio::test]
async fn test_role_requires_configuration() {
    let (server, _) = create_test_server();
    let response = server
        .post("/roles/web")
        .json(&json!({"username": "svc_web"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "not_configured");
}

#[tokio::test]
async fn test_role_crud() {
    let (server, _) = configured_server().await;

    let response = server.get("/roles/web").await;
    response.assert_status_ok();
    response.assert_json(&json!({"username": "svc_web", "ttl": 30}));

    server
        .get("/roles")
        .await
        .assert_json(&json!({"keys": ["web"]}));

    let response = server
        .post("/roles/ghost")
        .json(&json!({"username": "svc_ghost"}))
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "user_not_found");

    server
        .delete("/roles/web")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server.get("/roles/web").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_creds_are_rotated_once_and_cached() {
    let (server, adc) = configured_server().await;

    let first: serde_json::Value = server.get("/creds/web").await.json();
    let second: serde_json::Value = server.get("/creds/web").await.json();

    assert_eq!(first["username"], "svc_web");
    assert_eq!(first, second);
    let password = first["current_password"].as_str().unwrap();
    assert_eq!(password.len(), 16);
    assert_eq!(
        adc.passwords.lock().unwrap()["svc_web"].as_str(),
        password
    );

    let response = server.get("/creds/missing").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "role_not_found");
}

#[tokio::test]
async fn test_forced_rotations() {
    let (server, _) = configured_server().await;
    let before: serde_json::Value = server.get("/creds/web").await.json();

    server
        .post("/rotate-role/web")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let after: serde_json::Value = server.get("/creds/web").await.json();
    assert_ne!(before["current_password"], after["current_password"]);

    let response = server.post("/rotate-roles").await;
    response.assert_status_ok();
    response.assert_json(&json!({"rotated": ["web"], "failed": {}}));
}

#[tokio::test]
async fn test_rotate_root() {
    let (server, adc) = configured_server().await;

    server
        .post("/rotate-root")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    assert_ne!(*adc.admin_password.lock().unwrap(), "admin-pw");

    let body: serde_json::Value = server.get("/config").await.json();
    assert!(body.get("last_bind_password_rotation").is_some());

    // the engine keeps working with the rotated admin password
    server.get("/creds/web").await.assert_status_ok();
}
