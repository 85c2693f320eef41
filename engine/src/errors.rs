// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use validator::ValidationErrors;

/// Failures talking to the ADC appliance.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AdcError {
    #[error("user not found on appliance: {0}")]
    NotFound(String),
    #[error("appliance rejected credentials: {0}")]
    AuthFailed(String),
    #[error("appliance transport error: {0}")]
    Transport(String),
    #[error("appliance request canceled")]
    Canceled,
}

/// Failures from the host storage.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("unable to encode or decode storage entry {key}: {message}")]
    Codec { key: String, message: String },
    #[error("storage request canceled")]
    Canceled,
}

/// Errors surfaced to callers of the backend.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("the configuration is currently unset")]
    NotConfigured,
    #[error("role {0} does not exist")]
    RoleNotFound(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("user {0} does not exist on the appliance")]
    UserNotFound(String),
    #[error("a root credential rotation is already in progress")]
    RotationInProgress,
    #[error("{0}")]
    ApplianceTransport(String),
    #[error("{0}")]
    ApplianceAuth(String),
    #[error("{0}")]
    Storage(String),
    #[error("request canceled")]
    Canceled,
}

impl BackendError {
    /// Stable machine-readable code for the error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::RoleNotFound(_) => "role_not_found",
            Self::InvalidConfig(_) => "invalid_config",
            Self::InvalidRequest(_) => "invalid_request",
            Self::UserNotFound(_) => "user_not_found",
            Self::RotationInProgress => "rotation_in_progress",
            Self::ApplianceTransport(_) => "appliance_transport",
            Self::ApplianceAuth(_) => "appliance_auth",
            Self::Storage(_) => "storage_error",
            Self::Canceled => "canceled",
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ApplianceTransport(_) | Self::ApplianceAuth(_) | Self::RotationInProgress
        )
    }
}

impl From<AdcError> for BackendError {
    fn from(source: AdcError) -> Self {
        match source {
            AdcError::NotFound(user) => BackendError::UserNotFound(user),
            AdcError::AuthFailed(_) => BackendError::ApplianceAuth(source.to_string()),
            AdcError::Transport(_) => BackendError::ApplianceTransport(source.to_string()),
            AdcError::Canceled => BackendError::Canceled,
        }
    }
}

impl From<StorageError> for BackendError {
    fn from(source: StorageError) -> Self {
        match source {
            StorageError::Canceled => BackendError::Canceled,
            other => BackendError::Storage(other.to_string()),
        }
    }
}

impl From<ValidationErrors> for BackendError {
    fn from(source: ValidationErrors) -> Self {
        tracing::debug!("[engine] validation failed: {}", source);
        BackendError::InvalidRequest(source.to_string())
    }
}
