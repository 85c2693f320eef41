// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use adc_secrets_engine::errors::BackendError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AppError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("internal server error")]
    InternalServerError,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Backend(err) => match err {
                BackendError::NotConfigured
                | BackendError::InvalidConfig(_)
                | BackendError::InvalidRequest(_)
                | BackendError::UserNotFound(_) => StatusCode::BAD_REQUEST,
                BackendError::RoleNotFound(_) => StatusCode::NOT_FOUND,
                BackendError::RotationInProgress => StatusCode::CONFLICT,
                BackendError::ApplianceTransport(_) | BackendError::ApplianceAuth(_) => {
                    StatusCode::BAD_GATEWAY
                }
                BackendError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                BackendError::Canceled => StatusCode::REQUEST_TIMEOUT,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Backend(err) => err.kind(),
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "invalid_request",
            Self::InternalServerError => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Backend(err) if err.is_transient() => tracing::warn!("[server] {}", self),
            _ if status.is_server_error() => tracing::error!("[server] {}", self),
            _ => {}
        }
        // storage errors may echo paths; keep them in the log only
        let message = match &self {
            Self::Backend(BackendError::Storage(_)) | Self::InternalServerError => {
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "code": status.as_u16(),
            "kind": self.kind(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(source: JsonRejection) -> Self {
        tracing::debug!("[server] rejected request body: {}", source);
        AppError::ValidationError(source.body_text())
    }
}
