// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The API error envelope and the panic trap.
//!
//! Every failing endpoint returns `{code, message}`; machine clients
//! dispatch on the stable code. Handler panics become `internal` with a
//! correlation ID in the log.

use crate::engine::EngineError;
use crate::idle::actions::ActionError;
use crate::idle::policy::PolicyError;
use crate::protocol::{ErrorBody, ErrorCode};
use crate::proxy::cloud::CloudSessionError;
use crate::proxy::tunnel::TunnelError;
use crate::registry::RegistryError;
use crate::volumes::VolumeError;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::FutureExt;
use outpost_provider::{ProviderError, ProviderErrorKind, ShellError};
use std::panic::AssertUnwindSafe;
use uuid::Uuid;

#[derive(Debug)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    fn status(&self) -> StatusCode {
        match self.code {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::ProviderUnavailable => StatusCode::BAD_GATEWAY,
            ErrorCode::ProviderCapacity => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody { code: self.code, message: self.message };
        (status, Json(body)).into_response()
    }
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        let code = match e.kind {
            ProviderErrorKind::NotFound => ErrorCode::NotFound,
            ProviderErrorKind::CapacityUnavailable => ErrorCode::ProviderCapacity,
            _ => ErrorCode::ProviderUnavailable,
        };
        Self::new(code, e.to_string())
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotFound(name) => Self::not_found(format!("workspace not found: {name}")),
            EngineError::DuplicateName(name) => {
                Self::conflict(format!("workspace already exists: {name}"))
            }
            EngineError::InvalidTransition { .. } => Self::conflict(e.to_string()),
            EngineError::Provider(p) => p.into(),
            EngineError::Registry(r) => r.into(),
            EngineError::Storage(s) => Self::internal(s.to_string()),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(name) => {
                Self::not_found(format!("workspace not found: {name}"))
            }
            RegistryError::Conflict(name) => {
                Self::conflict(format!("workspace already exists: {name}"))
            }
            RegistryError::Stale(_) | RegistryError::Terminated(_) => Self::conflict(e.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<VolumeError> for ApiError {
    fn from(e: VolumeError) -> Self {
        match e {
            VolumeError::NotFound(name) => Self::not_found(format!("volume not found: {name}")),
            VolumeError::Conflict(name) => {
                Self::conflict(format!("volume already exists: {name}"))
            }
            VolumeError::Attached { .. } | VolumeError::Mounted(_) => Self::conflict(e.to_string()),
            VolumeError::Registry(r) => r.into(),
            VolumeError::Provider(p) => p.into(),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<ActionError> for ApiError {
    fn from(e: ActionError) -> Self {
        match e {
            ActionError::NotFound(id) => Self::not_found(format!("pending action not found: {id}")),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<PolicyError> for ApiError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::NotFound(name) => Self::not_found(format!("policy not found: {name}")),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<TunnelError> for ApiError {
    fn from(e: TunnelError) -> Self {
        Self::new(ErrorCode::ProviderUnavailable, e.to_string())
    }
}

impl From<CloudSessionError> for ApiError {
    fn from(e: CloudSessionError) -> Self {
        match e {
            CloudSessionError::UnknownService(_) => Self::bad_request(e.to_string()),
            CloudSessionError::Provider(p) => p.into(),
        }
    }
}

impl From<ShellError> for ApiError {
    fn from(e: ShellError) -> Self {
        Self::new(ErrorCode::ProviderUnavailable, e.to_string())
    }
}

/// Trap handler panics into a structured `internal` error with a
/// correlation ID that links the response to the log line.
pub async fn catch_panics(req: Request, next: Next) -> Response {
    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let correlation = Uuid::new_v4();
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "opaque panic".to_string());
            tracing::error!(%correlation, detail, "request handler panicked");
            ApiError::internal(format!("internal error (correlation {correlation})"))
                .into_response()
        }
    }
}
