// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared and block volume operations.
//!
//! Record keeping lives in the state store; every provider interaction goes
//! through the cloud port with the standard retry policy. Block volumes are
//! single-writer: attach enforces at-most-one workspace. Attachment and
//! mount membership is tracked on both sides — the volume record and the
//! owning workspace's `shared_volumes`/`block_volumes` sets, written
//! through the registry.

use crate::registry::{Registry, RegistryError};
use outpost_core::{BlockVolume, Clock, SharedVolume};
use outpost_provider::{with_backoff, BackoffPolicy, CloudProvider, ProviderError, ProviderErrorKind};
use outpost_storage::{codec, keys, StateStore, StoreError, TransactOutcome, WriteOp};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("volume not found: {0}")]
    NotFound(String),

    #[error("volume already exists: {0}")]
    Conflict(String),

    #[error("volume {volume} is attached to {workspace}")]
    Attached { volume: String, workspace: String },

    #[error("volume {0} is mounted by workspaces")]
    Mounted(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] codec::CodecError),
}

pub struct VolumeManager<C: Clock> {
    store: Arc<StateStore>,
    provider: Arc<dyn CloudProvider>,
    registry: Arc<Registry<C>>,
    clock: C,
    backoff: BackoffPolicy,
}

impl<C: Clock> VolumeManager<C> {
    pub fn new(
        store: Arc<StateStore>,
        provider: Arc<dyn CloudProvider>,
        registry: Arc<Registry<C>>,
        clock: C,
    ) -> Self {
        Self { store, provider, registry, clock, backoff: BackoffPolicy::default() }
    }

    // ---- shared (network filesystem) ----

    pub fn list_shared(&self) -> Result<Vec<SharedVolume>, VolumeError> {
        let mut out = Vec::new();
        for (_, bytes) in self.store.list_prefix(keys::SHARED_VOLUME_PREFIX) {
            out.push(codec::decode(&bytes)?);
        }
        Ok(out)
    }

    pub fn get_shared(&self, name: &str) -> Result<SharedVolume, VolumeError> {
        let bytes = self
            .store
            .get(&keys::shared_volume(name))
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))?;
        Ok(codec::decode(&bytes)?)
    }

    pub async fn create_shared(
        &self,
        name: &str,
        size_bytes: u64,
    ) -> Result<SharedVolume, VolumeError> {
        let key = keys::shared_volume(name);
        if self.store.get(&key).is_some() {
            return Err(VolumeError::Conflict(name.to_string()));
        }

        let provider = self.provider.clone();
        let provider_id = with_backoff(self.backoff, "create_shared_volume", || {
            provider.create_shared_volume(name, size_bytes)
        })
        .await?;

        let volume = SharedVolume {
            name: name.to_string(),
            provider_id,
            size_bytes,
            mounted_on: Vec::new(),
            created_at_ms: self.clock.epoch_ms(),
        };
        let value = codec::encode(&volume)?;
        match self.store.transact(&[(&key, 0)], vec![WriteOp::Put { key: key.clone(), value }])? {
            TransactOutcome::Committed => Ok(volume),
            TransactOutcome::Conflict => Err(VolumeError::Conflict(name.to_string())),
        }
    }

    pub async fn delete_shared(&self, name: &str) -> Result<(), VolumeError> {
        let volume = self.get_shared(name)?;
        if !volume.mounted_on.is_empty() {
            return Err(VolumeError::Mounted(name.to_string()));
        }

        let provider = self.provider.clone();
        let id = volume.provider_id.clone();
        match with_backoff(self.backoff, "delete_shared_volume", || {
            provider.delete_shared_volume(&id)
        })
        .await
        {
            Ok(()) => {}
            // Already gone provider-side; drop the record anyway.
            Err(e) if e.kind == ProviderErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.store.delete(&keys::shared_volume(name))?;
        Ok(())
    }

    /// Record a workspace mounting a shared volume. The in-workspace NFS
    /// mount itself is performed by provisioning tooling; the daemon tracks
    /// membership on both records.
    pub fn mount_shared(&self, name: &str, workspace: &str) -> Result<SharedVolume, VolumeError> {
        let ws = self.registry.get(workspace)?;
        if ws.state.is_terminal() {
            return Err(RegistryError::Terminated(workspace.to_string()).into());
        }

        let mut volume = self.get_shared(name)?;
        volume.mount(workspace);
        self.put_shared(&volume)?;

        self.registry.update_with(workspace, None, |ws| {
            if !ws.shared_volumes.iter().any(|v| v == name) {
                ws.shared_volumes.push(name.to_string());
            }
            Ok(())
        })?;
        Ok(volume)
    }

    /// Remove a workspace from a shared volume's mount set. Idempotent.
    pub fn unmount_shared(
        &self,
        name: &str,
        workspace: &str,
    ) -> Result<SharedVolume, VolumeError> {
        let mut volume = self.get_shared(name)?;
        volume.unmount(workspace);
        self.put_shared(&volume)?;
        self.workspace_forget_shared(workspace, name);
        Ok(volume)
    }

    // ---- block (single-writer) ----

    pub fn list_block(&self) -> Result<Vec<BlockVolume>, VolumeError> {
        let mut out = Vec::new();
        for (_, bytes) in self.store.list_prefix(keys::BLOCK_VOLUME_PREFIX) {
            out.push(codec::decode(&bytes)?);
        }
        Ok(out)
    }

    pub fn get_block(&self, name: &str) -> Result<BlockVolume, VolumeError> {
        let bytes = self
            .store
            .get(&keys::block_volume(name))
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))?;
        Ok(codec::decode(&bytes)?)
    }

    pub async fn create_block(
        &self,
        name: &str,
        size_bytes: u64,
    ) -> Result<BlockVolume, VolumeError> {
        let key = keys::block_volume(name);
        if self.store.get(&key).is_some() {
            return Err(VolumeError::Conflict(name.to_string()));
        }

        let provider = self.provider.clone();
        let provider_id = with_backoff(self.backoff, "create_block_volume", || {
            provider.create_block_volume(name, size_bytes)
        })
        .await?;

        let volume = BlockVolume {
            name: name.to_string(),
            provider_id,
            size_bytes,
            attached_to: None,
            created_at_ms: self.clock.epoch_ms(),
        };
        let value = codec::encode(&volume)?;
        match self.store.transact(&[(&key, 0)], vec![WriteOp::Put { key: key.clone(), value }])? {
            TransactOutcome::Committed => Ok(volume),
            TransactOutcome::Conflict => Err(VolumeError::Conflict(name.to_string())),
        }
    }

    pub async fn attach_block(
        &self,
        name: &str,
        workspace: &str,
    ) -> Result<BlockVolume, VolumeError> {
        let mut volume = self.get_block(name)?;
        if let Some(holder) = &volume.attached_to {
            if holder == workspace {
                return Ok(volume); // already attached here
            }
            return Err(VolumeError::Attached {
                volume: name.to_string(),
                workspace: holder.clone(),
            });
        }

        let ws = self.registry.get(workspace)?;
        if ws.state.is_terminal() {
            return Err(RegistryError::Terminated(workspace.to_string()).into());
        }

        let provider = self.provider.clone();
        let vol_id = volume.provider_id.clone();
        let inst_id = ws.provider_id.clone();
        with_backoff(self.backoff, "attach_block_volume", || {
            provider.attach_block_volume(&vol_id, &inst_id)
        })
        .await?;

        volume.attached_to = Some(workspace.to_string());
        self.put_block(&volume)?;

        self.registry.update_with(workspace, None, |ws| {
            if !ws.block_volumes.iter().any(|v| v == name) {
                ws.block_volumes.push(name.to_string());
            }
            Ok(())
        })?;
        Ok(volume)
    }

    pub async fn detach_block(&self, name: &str) -> Result<BlockVolume, VolumeError> {
        let mut volume = self.get_block(name)?;
        let Some(holder) = volume.attached_to.clone() else {
            return Ok(volume); // idempotent
        };

        let provider = self.provider.clone();
        let vol_id = volume.provider_id.clone();
        match with_backoff(self.backoff, "detach_block_volume", || {
            provider.detach_block_volume(&vol_id)
        })
        .await
        {
            Ok(()) => {}
            Err(e) if e.kind == ProviderErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        volume.attached_to = None;
        self.put_block(&volume)?;
        self.workspace_forget_block(&holder, name);
        Ok(volume)
    }

    pub async fn delete_block(&self, name: &str) -> Result<(), VolumeError> {
        let volume = self.get_block(name)?;
        if let Some(holder) = &volume.attached_to {
            return Err(VolumeError::Attached {
                volume: name.to_string(),
                workspace: holder.clone(),
            });
        }

        let provider = self.provider.clone();
        let vol_id = volume.provider_id.clone();
        match with_backoff(self.backoff, "delete_block_volume", || {
            provider.delete_block_volume(&vol_id)
        })
        .await
        {
            Ok(()) => {}
            Err(e) if e.kind == ProviderErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.store.delete(&keys::block_volume(name))?;
        Ok(())
    }

    /// Detach every block volume held by a workspace (termination cleanup).
    /// Best-effort: provider errors are logged, records are always cleared.
    pub async fn detach_all_for(&self, workspace: &str) -> Result<(), VolumeError> {
        for volume in self.list_block()? {
            if volume.attached_to.as_deref() == Some(workspace) {
                if let Err(e) = self.detach_block(&volume.name).await {
                    tracing::warn!(
                        volume = %volume.name,
                        workspace,
                        error = %e,
                        "detach during termination failed"
                    );
                    // Clear the records anyway; the instance is going away.
                    let mut cleared = volume.clone();
                    cleared.attached_to = None;
                    self.put_block(&cleared)?;
                    self.workspace_forget_block(workspace, &volume.name);
                }
            }
        }
        Ok(())
    }

    /// Drop a workspace from every shared volume's mount set (termination
    /// cleanup). Record-keeping only, so never touches the provider.
    pub fn unmount_all_for(&self, workspace: &str) -> Result<(), VolumeError> {
        for volume in self.list_shared()? {
            if volume.mounted_on.iter().any(|w| w == workspace) {
                let mut updated = volume.clone();
                updated.unmount(workspace);
                self.put_shared(&updated)?;
                self.workspace_forget_shared(workspace, &volume.name);
            }
        }
        Ok(())
    }

    fn put_shared(&self, volume: &SharedVolume) -> Result<(), VolumeError> {
        let value = codec::encode(volume)?;
        self.store.put(&keys::shared_volume(&volume.name), value)?;
        Ok(())
    }

    fn put_block(&self, volume: &BlockVolume) -> Result<(), VolumeError> {
        let value = codec::encode(volume)?;
        self.store.put(&keys::block_volume(&volume.name), value)?;
        Ok(())
    }

    /// Drop a volume name from a workspace's attachment set. Tolerates the
    /// workspace being gone or already sealed — the volume record is the
    /// authority on the way out.
    fn workspace_forget_block(&self, workspace: &str, volume: &str) {
        let result = self.registry.update_with(workspace, None, |ws| {
            ws.block_volumes.retain(|v| v != volume);
            Ok(())
        });
        match result {
            Ok(_) | Err(RegistryError::NotFound(_)) | Err(RegistryError::Terminated(_)) => {}
            Err(e) => {
                tracing::warn!(workspace, volume, error = %e, "block attachment cleanup failed")
            }
        }
    }

    fn workspace_forget_shared(&self, workspace: &str, volume: &str) {
        let result = self.registry.update_with(workspace, None, |ws| {
            ws.shared_volumes.retain(|v| v != volume);
            Ok(())
        });
        match result {
            Ok(_) | Err(RegistryError::NotFound(_)) | Err(RegistryError::Terminated(_)) => {}
            Err(e) => {
                tracing::warn!(workspace, volume, error = %e, "shared mount cleanup failed")
            }
        }
    }
}

#[cfg(test)]
#[path = "volumes_tests.rs"]
mod tests;
