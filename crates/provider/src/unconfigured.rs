// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Placeholder provider for daemons without a configured cloud adapter.
//!
//! Concrete SDK adapters are wired in by the embedding build; with none
//! present the daemon still starts, serves its API, and reports a permanent
//! provider error on any compute operation.

use crate::cloud::{
    CloudProvider, FederationToken, InstanceSpec, Launched, ProviderError, ProviderErrorKind,
    RuntimeState, StopMode,
};
use async_trait::async_trait;

#[derive(Clone, Copy, Default)]
pub struct UnconfiguredProvider;

impl UnconfiguredProvider {
    fn err() -> ProviderError {
        ProviderError::new(ProviderErrorKind::Permanent, "no cloud provider configured")
    }
}

#[async_trait]
impl CloudProvider for UnconfiguredProvider {
    async fn launch_instance(&self, _spec: &InstanceSpec) -> Result<Launched, ProviderError> {
        Err(Self::err())
    }

    async fn start_instance(&self, _provider_id: &str) -> Result<(), ProviderError> {
        Err(Self::err())
    }

    async fn stop_instance(&self, _provider_id: &str, _mode: StopMode) -> Result<(), ProviderError> {
        Err(Self::err())
    }

    async fn terminate_instance(&self, _provider_id: &str) -> Result<(), ProviderError> {
        Err(Self::err())
    }

    async fn describe_instance(&self, _provider_id: &str) -> Result<RuntimeState, ProviderError> {
        Err(Self::err())
    }

    async fn create_shared_volume(
        &self,
        _name: &str,
        _size_bytes: u64,
    ) -> Result<String, ProviderError> {
        Err(Self::err())
    }

    async fn delete_shared_volume(&self, _provider_id: &str) -> Result<(), ProviderError> {
        Err(Self::err())
    }

    async fn create_block_volume(
        &self,
        _name: &str,
        _size_bytes: u64,
    ) -> Result<String, ProviderError> {
        Err(Self::err())
    }

    async fn attach_block_volume(
        &self,
        _volume_id: &str,
        _instance_id: &str,
    ) -> Result<(), ProviderError> {
        Err(Self::err())
    }

    async fn detach_block_volume(&self, _volume_id: &str) -> Result<(), ProviderError> {
        Err(Self::err())
    }

    async fn delete_block_volume(&self, _volume_id: &str) -> Result<(), ProviderError> {
        Err(Self::err())
    }

    async fn issue_federation_token(
        &self,
        _service: &str,
        _region: &str,
        _duration_secs: u64,
    ) -> Result<FederationToken, ProviderError> {
        Err(Self::err())
    }
}
