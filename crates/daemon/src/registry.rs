// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace registry.
//!
//! The single writer of `workspace/*` keys. Mutations go through the state
//! store's `transact`, so concurrent writers (policy evaluator vs. API) are
//! serialized by per-key versions. The registry never calls the cloud
//! provider; only the lifecycle engine does.

use outpost_core::{Clock, Workspace, WorkspaceState};
use outpost_storage::{codec, keys, StateStore, StoreError, TransactOutcome, WriteOp};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("workspace not found: {0}")]
    NotFound(String),

    #[error("workspace already exists: {0}")]
    Conflict(String),

    #[error("workspace {0} was modified concurrently; re-read and retry")]
    Stale(String),

    #[error("terminated workspace {0} is immutable")]
    Terminated(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] codec::CodecError),
}

/// In-memory-free registry: the store is the source of truth, reads decode
/// on demand. Cheap at this fleet size and trivially crash-consistent.
pub struct Registry<C: Clock> {
    store: Arc<StateStore>,
    clock: C,
}

impl<C: Clock> Registry<C> {
    pub fn new(store: Arc<StateStore>, clock: C) -> Self {
        Self { store, clock }
    }

    /// All workspaces, name-ordered, optionally filtered by state.
    pub fn list(&self, state: Option<WorkspaceState>) -> Result<Vec<Workspace>, RegistryError> {
        let mut out = Vec::new();
        for (_, bytes) in self.store.list_prefix(keys::WORKSPACE_PREFIX) {
            let ws: Workspace = codec::decode(&bytes)?;
            if state.map_or(true, |s| ws.state == s) {
                out.push(ws);
            }
        }
        Ok(out)
    }

    pub fn get(&self, name: &str) -> Result<Workspace, RegistryError> {
        let bytes = self
            .store
            .get(&keys::workspace(name))
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        Ok(codec::decode(&bytes)?)
    }

    /// Create a workspace record. Atomic on name uniqueness.
    pub fn create(&self, workspace: &Workspace) -> Result<(), RegistryError> {
        let key = keys::workspace(&workspace.name);
        let value = codec::encode(workspace)?;
        match self.store.transact(&[(&key, 0)], vec![WriteOp::Put { key: key.clone(), value }])? {
            TransactOutcome::Committed => Ok(()),
            TransactOutcome::Conflict => Err(RegistryError::Conflict(workspace.name.clone())),
        }
    }

    /// Read-modify-write a workspace.
    ///
    /// `expected_tag` is the `last_transition_at_ms` the caller observed;
    /// when the in-store record is newer the update fails `Stale` and the
    /// caller re-reads. Passing `None` skips the tag check (engine-internal
    /// callers already hold the per-workspace transition lock).
    pub fn update_with<F>(
        &self,
        name: &str,
        expected_tag: Option<u64>,
        mut mutate: F,
    ) -> Result<Workspace, RegistryError>
    where
        F: FnMut(&mut Workspace) -> Result<(), RegistryError>,
    {
        let key = keys::workspace(name);
        loop {
            let (bytes, version) = self
                .store
                .get_versioned(&key)
                .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
            let mut ws: Workspace = codec::decode(&bytes)?;

            if let Some(tag) = expected_tag {
                if ws.last_transition_at_ms != tag {
                    return Err(RegistryError::Stale(name.to_string()));
                }
            }
            if ws.state.is_terminal() {
                return Err(RegistryError::Terminated(name.to_string()));
            }

            mutate(&mut ws)?;
            let value = codec::encode(&ws)?;
            match self.store.transact(
                &[(&key, version)],
                vec![WriteOp::Put { key: key.clone(), value }],
            )? {
                TransactOutcome::Committed => return Ok(ws),
                // Lost a race against another writer; reload and retry.
                TransactOutcome::Conflict => continue,
            }
        }
    }

    /// Persist a workspace read outside the tag discipline (startup
    /// reconciliation). Still version-safe against concurrent writers.
    pub fn put_reconciled(&self, workspace: &Workspace) -> Result<(), RegistryError> {
        let key = keys::workspace(&workspace.name);
        let value = codec::encode(workspace)?;
        self.store.put(&key, value)?;
        Ok(())
    }

    /// Remove a workspace record entirely.
    pub fn remove(&self, name: &str) -> Result<(), RegistryError> {
        self.store.delete(&keys::workspace(name))?;
        Ok(())
    }

    /// Count of workspaces per state (for `/status`).
    pub fn counts_by_state(
        &self,
    ) -> Result<std::collections::BTreeMap<String, usize>, RegistryError> {
        let mut counts = std::collections::BTreeMap::new();
        for ws in self.list(None)? {
            *counts.entry(ws.state.to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
