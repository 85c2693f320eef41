// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! HTTP route handlers for the secrets engine API.
//!
//! | Method | Path | Handler | Description |
//! |--------|------|---------|-------------|
//! | GET | `/health` | [`health`] | Health check endpoint |
//! | POST, PUT | `/config` | [`write_config`] | Configure the appliance connection |
//! | GET | `/config` | [`read_config`] | Redacted configuration |
//! | DELETE | `/config` | [`delete_config`] | Remove the configuration |
//! | GET | `/roles` | [`list_roles`] | Role names |
//! | GET | `/roles/{name}` | [`read_role`] | Read a role |
//! | POST, PUT | `/roles/{name}` | [`write_role`] | Create or update a role |
//! | DELETE | `/roles/{name}` | [`delete_role`] | Delete a role |
//! | GET | `/creds/{name}` | [`read_creds`] | Current password, rotating when expired |
//! | POST | `/rotate-root` | [`rotate_root`] | Rotate the admin password |
//! | POST | `/rotate-role/{name}` | [`rotate_role`] | Force-rotate one role |
//! | POST | `/rotate-roles` | [`rotate_roles`] | Force-rotate every role |

use std::sync::Arc;

use adc_secrets_engine::context::RequestContext;
use adc_secrets_engine::errors::BackendError;
use adc_secrets_engine::models::{
    BulkRotationReport, ConfigRequest, ConfigView, CredsResponse, Role, RoleRequest,
};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::application::AppState;
use crate::errors::AppError;
use crate::models::ListResponse;

/// Health check endpoint.
///
/// # Response
///
/// ```json
/// {"status": "ok"}
/// ```
pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

impl AppState {
    /// Context for one request: cancelled on shutdown, bounded by the
    /// request timeout.
    fn request_context(&self) -> RequestContext {
        RequestContext::with_token(self.shutdown.child_token()).with_timeout(self.request_timeout)
    }
}

#[tracing::instrument(skip(state, payload))]
pub async fn write_config(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ConfigRequest>, JsonRejection>,
) -> Result<Json<ConfigView>, AppError> {
    let Json(request) = payload?;
    let ctx = state.request_context();
    let view = state.backend.config_update(&ctx, request).await?;
    Ok(Json(view))
}

#[tracing::instrument(skip(state))]
pub async fn read_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConfigView>, AppError> {
    let ctx = state.request_context();
    state
        .backend
        .config_read(&ctx)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("configuration".to_string()))
}

#[tracing::instrument(skip(state))]
pub async fn delete_config(State(state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    let ctx = state.request_context();
    state.backend.config_delete(&ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state))]
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListResponse>, AppError> {
    let ctx = state.request_context();
    let keys = state.backend.list_roles(&ctx).await?;
    Ok(Json(ListResponse { keys }))
}

#[tracing::instrument(skip(state))]
pub async fn read_role(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Role>, AppError> {
    let ctx = state.request_context();
    let role = state
        .backend
        .read_role(&ctx, &name)
        .await?
        .ok_or(BackendError::RoleNotFound(name))?;
    Ok(Json(role))
}

#[tracing::instrument(skip(state, payload))]
pub async fn write_role(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    payload: Result<Json<RoleRequest>, JsonRejection>,
) -> Result<Json<Role>, AppError> {
    let Json(request) = payload?;
    let ctx = state.request_context();
    let role = state.backend.role_update(&ctx, &name, request).await?;
    Ok(Json(role))
}

#[tracing::instrument(skip(state))]
pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    let ctx = state.request_context();
    state.backend.role_delete(&ctx, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state))]
pub async fn read_creds(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<CredsResponse>, AppError> {
    let ctx = state.request_context();
    let creds = state.backend.read_creds(&ctx, &name).await?;
    Ok(Json(creds))
}

#[tracing::instrument(skip(state))]
pub async fn rotate_root(State(state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    let ctx = state.request_context();
    state.backend.rotate_root(&ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state))]
pub async fn rotate_role(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    let ctx = state.request_context();
    state.backend.rotate_role(&ctx, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state))]
pub async fn rotate_roles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BulkRotationReport>, AppError> {
    let ctx = state.request_context();
    let report = state.backend.rotate_all_roles(&ctx).await?;
    Ok(Json(report))
}
