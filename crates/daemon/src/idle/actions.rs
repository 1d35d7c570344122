// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable pending-action and idle-history records.
//!
//! Ownership transfers ride on store versions: the evaluator owns a queued
//! action; the executor takes it by winning the `queued → executing`
//! transaction. History entries are written once and never mutated.

use outpost_core::{ActionStatus, HistoryOutcome, IdleHistoryEntry, PendingAction};
use outpost_storage::{codec, keys, StateStore, StoreError, TransactOutcome, WriteOp};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("pending action not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] codec::CodecError),
}

/// Store facade for `pendingAction/*` and `idleHistory/*` keys.
#[derive(Clone)]
pub struct ActionStore {
    store: Arc<StateStore>,
}

impl ActionStore {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<PendingAction>, ActionError> {
        Ok(self.list_versioned()?.into_iter().map(|(a, _)| a).collect())
    }

    /// Actions plus their store versions (for `transact` fences).
    pub fn list_versioned(&self) -> Result<Vec<(PendingAction, u64)>, ActionError> {
        let mut out = Vec::new();
        for (key, bytes) in self.store.list_prefix(keys::PENDING_ACTION_PREFIX) {
            let action: PendingAction = codec::decode(&bytes)?;
            let version = self.store.version(&key);
            out.push((action, version));
        }
        Ok(out)
    }

    pub fn get(&self, id: Uuid) -> Result<(PendingAction, u64), ActionError> {
        let key = keys::pending_action(&id.to_string());
        let (bytes, version) =
            self.store.get_versioned(&key).ok_or(ActionError::NotFound(id))?;
        Ok((codec::decode(&bytes)?, version))
    }

    /// The single active (queued or executing) action for a workspace.
    pub fn active_for(&self, workspace: &str) -> Result<Option<(PendingAction, u64)>, ActionError> {
        Ok(self
            .list_versioned()?
            .into_iter()
            .find(|(a, _)| a.workspace == workspace && a.status.is_active()))
    }

    /// Persist a freshly queued action.
    pub fn queue(&self, action: &PendingAction) -> Result<(), ActionError> {
        let value = codec::encode(action)?;
        self.store.put(&keys::pending_action(&action.id.to_string()), value)?;
        Ok(())
    }

    /// Version-fenced update. `Conflict` means another owner won the race.
    pub fn update(
        &self,
        action: &PendingAction,
        expected_version: u64,
    ) -> Result<TransactOutcome, ActionError> {
        let key = keys::pending_action(&action.id.to_string());
        let value = codec::encode(action)?;
        Ok(self
            .store
            .transact(&[(&key, expected_version)], vec![WriteOp::Put { key: key.clone(), value }])?)
    }

    /// Cancel a queued action and write its history entry in one batch.
    /// Returns false when the fence fails (the executor claimed it first).
    pub fn cancel(
        &self,
        action: &PendingAction,
        expected_version: u64,
        reason: &str,
        now_ms: u64,
    ) -> Result<bool, ActionError> {
        let mut cancelled = action.clone();
        cancelled.status = ActionStatus::Cancelled;
        cancelled.reason = reason.to_string();

        let action_key = keys::pending_action(&action.id.to_string());
        let entry = IdleHistoryEntry {
            id: action.id,
            workspace: action.workspace.clone(),
            action: action.action,
            policy: action.policy.clone(),
            outcome: HistoryOutcome::Cancelled,
            detail: reason.to_string(),
            recorded_at_ms: now_ms,
        };

        let outcome = self.store.transact(
            &[(&action_key, expected_version)],
            vec![
                WriteOp::Put { key: action_key.clone(), value: codec::encode(&cancelled)? },
                WriteOp::Put {
                    key: keys::idle_history(&entry.id.to_string()),
                    value: codec::encode(&entry)?,
                },
            ],
        )?;
        Ok(outcome == TransactOutcome::Committed)
    }

    /// Append a write-once history entry.
    pub fn record_history(&self, entry: &IdleHistoryEntry) -> Result<(), ActionError> {
        let value = codec::encode(entry)?;
        self.store.put(&keys::idle_history(&entry.id.to_string()), value)?;
        Ok(())
    }

    /// History entries newest-first, with total count for paging.
    pub fn history_page(
        &self,
        page: usize,
        per_page: usize,
    ) -> Result<(Vec<IdleHistoryEntry>, usize), ActionError> {
        let mut entries: Vec<IdleHistoryEntry> = Vec::new();
        for (_, bytes) in self.store.list_prefix(keys::IDLE_HISTORY_PREFIX) {
            entries.push(codec::decode(&bytes)?);
        }
        entries.sort_by(|a, b| b.recorded_at_ms.cmp(&a.recorded_at_ms));
        let total = entries.len();
        let start = page.saturating_mul(per_page).min(total);
        let end = start.saturating_add(per_page).min(total);
        Ok((entries[start..end].to_vec(), total))
    }

    pub fn history_entry(&self, id: Uuid) -> Result<Option<IdleHistoryEntry>, ActionError> {
        match self.store.get(&keys::idle_history(&id.to_string())) {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
            None => Ok(None),
        }
    }
}
