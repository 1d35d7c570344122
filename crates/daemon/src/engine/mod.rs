// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workspace lifecycle state machine.
//!
//! The engine is the only component that calls the cloud provider for
//! compute operations. Transitions for one workspace serialize through a
//! per-workspace async mutex; the registry's versioned writes protect
//! against anything that slips around it.

mod transitions;

use crate::proxy::ConnectionTracker;
use crate::registry::{Registry, RegistryError};
use crate::volumes::VolumeManager;
use outpost_core::{Clock, TransitionRecord, Workspace, WorkspaceState};
use outpost_provider::{BackoffPolicy, CloudProvider, ProviderError, ProviderErrorKind};
use outpost_storage::{codec, keys, StateStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How long a launch may sit in `pending` before it is failed.
pub const DEFAULT_PENDING_TIMEOUT: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workspace not found: {0}")]
    NotFound(String),

    #[error("workspace {workspace} is {from}; cannot {requested}")]
    InvalidTransition { workspace: String, from: WorkspaceState, requested: &'static str },

    #[error("workspace name already exists: {0}")]
    DuplicateName(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("registry error: {0}")]
    Registry(RegistryError),

    #[error("storage error: {0}")]
    Storage(#[from] outpost_storage::StoreError),
}

impl From<RegistryError> for EngineError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(name) => EngineError::NotFound(name),
            RegistryError::Conflict(name) => EngineError::DuplicateName(name),
            other => EngineError::Registry(other),
        }
    }
}

/// What the API hands the engine to launch a workspace.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub name: String,
    pub template: String,
    pub size: outpost_core::Size,
    pub region: String,
    pub profile: String,
    pub hibernation: bool,
}

/// Lifecycle engine over one cloud provider.
pub struct Engine<C: Clock> {
    registry: Arc<Registry<C>>,
    store: Arc<StateStore>,
    provider: Arc<dyn CloudProvider>,
    volumes: Arc<VolumeManager<C>>,
    proxies: Arc<ConnectionTracker>,
    clock: C,
    backoff: BackoffPolicy,
    pending_timeout: Duration,
    /// Per-workspace transition serialization.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<C: Clock> Engine<C> {
    pub fn new(
        registry: Arc<Registry<C>>,
        store: Arc<StateStore>,
        provider: Arc<dyn CloudProvider>,
        volumes: Arc<VolumeManager<C>>,
        proxies: Arc<ConnectionTracker>,
        clock: C,
    ) -> Self {
        Self {
            registry,
            store,
            provider,
            volumes,
            proxies,
            clock,
            backoff: BackoffPolicy::default(),
            pending_timeout: DEFAULT_PENDING_TIMEOUT,
            locks: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_pending_timeout(mut self, timeout: Duration) -> Self {
        self.pending_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<Registry<C>> {
        &self.registry
    }

    /// Acquire the transition lock for one workspace.
    pub(crate) async fn lock(&self, name: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks.entry(name.to_string()).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))).clone()
        };
        lock.lock_owned().await
    }

    /// Persist one transition audit record.
    pub(crate) fn record_transition(
        &self,
        workspace: &str,
        from: Option<WorkspaceState>,
        to: WorkspaceState,
        reason: &str,
    ) {
        let record =
            TransitionRecord::new(workspace, from, to, self.clock.epoch_ms(), reason);
        match codec::encode(&record) {
            Ok(value) => {
                if let Err(e) = self.store.put(&keys::transition(&record.id.to_string()), value) {
                    tracing::warn!(workspace, error = %e, "failed to persist transition record");
                }
            }
            Err(e) => tracing::warn!(workspace, error = %e, "failed to encode transition record"),
        }
        tracing::info!(
            workspace,
            from = from.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
            to = %to,
            reason,
            "lifecycle transition"
        );
    }

    /// Map a provider failure on a transition to the engine policy:
    /// auth failures poison the workspace, everything else reverts it.
    pub(crate) fn is_auth_failure(error: &ProviderError) -> bool {
        error.kind == ProviderErrorKind::AuthFailed
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }

    /// Read a workspace; terminated ones still resolve (read-only).
    pub fn get(&self, name: &str) -> Result<Workspace, EngineError> {
        Ok(self.registry.get(name)?)
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
