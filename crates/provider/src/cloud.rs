// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The cloud provider port.
//!
//! A narrow capability set consumed by the lifecycle engine and the volume
//! handlers. Implementations translate these calls onto a concrete IaaS SDK;
//! the daemon only ever sees the structured error kinds below.

use async_trait::async_trait;
use outpost_core::{Arch, Size};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a provider failure.
///
/// Callers retry only `Throttled` and `Transient` (see [`crate::retry`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    NotFound,
    Throttled,
    AuthFailed,
    CapacityUnavailable,
    Transient,
    Permanent,
}

outpost_core::simple_display! {
    ProviderErrorKind {
        NotFound => "not_found",
        Throttled => "throttled",
        AuthFailed => "auth_failed",
        CapacityUnavailable => "capacity_unavailable",
        Transient => "transient",
        Permanent => "permanent",
    }
}

/// A structured provider failure.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NotFound, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transient, message)
    }

    /// Only throttling and transient faults are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ProviderErrorKind::Throttled | ProviderErrorKind::Transient)
    }
}

/// Stop semantics: plain stop or memory-preserving hibernate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    Stop,
    Hibernate,
}

outpost_core::simple_display! {
    StopMode {
        Stop => "stop",
        Hibernate => "hibernate",
    }
}

/// Instance state as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeState {
    Pending,
    Running,
    Stopping,
    Stopped,
    /// Stopped with preserved memory state.
    StoppedHibernated,
    ShuttingDown,
    /// The provider no longer knows this instance.
    Gone,
}

/// What the lifecycle engine asks for when launching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    pub name: String,
    pub template: String,
    pub size: Size,
    pub region: String,
    pub architecture: Arch,
    /// Whether the instance must support hibernation.
    #[serde(default)]
    pub hibernation: bool,
}

/// Result of a successful launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Launched {
    pub provider_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_address: Option<String>,
}

/// Short-lived credentials for an embedded cloud-service session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationToken {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: String,
    pub expires_at_ms: u64,
}

/// Abstract interface over compute, filesystem, and block-storage operations.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    async fn launch_instance(&self, spec: &InstanceSpec) -> Result<Launched, ProviderError>;

    async fn start_instance(&self, provider_id: &str) -> Result<(), ProviderError>;

    async fn stop_instance(&self, provider_id: &str, mode: StopMode) -> Result<(), ProviderError>;

    async fn terminate_instance(&self, provider_id: &str) -> Result<(), ProviderError>;

    async fn describe_instance(&self, provider_id: &str) -> Result<RuntimeState, ProviderError>;

    /// Create a network filesystem; returns its provider id.
    async fn create_shared_volume(
        &self,
        name: &str,
        size_bytes: u64,
    ) -> Result<String, ProviderError>;

    async fn delete_shared_volume(&self, provider_id: &str) -> Result<(), ProviderError>;

    /// Create a block device; returns its provider id.
    async fn create_block_volume(
        &self,
        name: &str,
        size_bytes: u64,
    ) -> Result<String, ProviderError>;

    async fn attach_block_volume(
        &self,
        volume_id: &str,
        instance_id: &str,
    ) -> Result<(), ProviderError>;

    async fn detach_block_volume(&self, volume_id: &str) -> Result<(), ProviderError>;

    async fn delete_block_volume(&self, volume_id: &str) -> Result<(), ProviderError>;

    async fn issue_federation_token(
        &self,
        service: &str,
        region: &str,
        duration_secs: u64,
    ) -> Result<FederationToken, ProviderError>;
}
