// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup reconciliation.
//!
//! Runs after the store opens and before the listener binds: decodes every
//! workspace (which is also where a schema downgrade is detected), fails
//! actions that were mid-execution when the last process died, confirms
//! running workspaces against the provider, and restores the policy set.

use super::LifecycleError;
use crate::engine::Engine;
use crate::idle::policy::PolicyEvaluator;
use outpost_core::{
    ActionStatus, Clock, HistoryOutcome, IdleHistoryEntry, PendingAction, Workspace,
    WorkspaceState,
};
use outpost_storage::{codec, keys, StateStore};

/// Reason stamped onto actions orphaned in `executing`.
pub const RESTART_REASON: &str = "daemon restart during execution";

#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileReport {
    pub workspaces: usize,
    pub orphaned_actions: usize,
    pub requeued_actions: usize,
    pub synced_running: usize,
}

pub async fn reconcile<C: Clock + 'static>(
    store: &StateStore,
    evaluator: &PolicyEvaluator<C>,
    engine: &Engine<C>,
    clock: &C,
) -> Result<ReconcileReport, LifecycleError> {
    let mut report = ReconcileReport::default();
    let now = clock.epoch_ms();

    // 1. Decode every workspace. A record written by a newer build fails
    //    here and the daemon refuses to start.
    let mut running: Vec<String> = Vec::new();
    for (_, bytes) in store.list_prefix(keys::WORKSPACE_PREFIX) {
        let ws: Workspace = codec::decode(&bytes)?;
        if ws.state == WorkspaceState::Running {
            running.push(ws.name.clone());
        }
        report.workspaces += 1;
    }

    // 2. Actions dangling in `executing` died with the old process. They are
    //    failed, never re-applied: a fresh evaluation may deliberately
    //    re-queue, but nothing double-applies.
    for (key, bytes) in store.list_prefix(keys::PENDING_ACTION_PREFIX) {
        let mut action: PendingAction = codec::decode(&bytes)?;
        match action.status {
            ActionStatus::Executing => {
                action.status = ActionStatus::Failed;
                action.reason = RESTART_REASON.to_string();
                store.put(&key, codec::encode(&action)?)?;
                evaluator
                    .actions()
                    .record_history(&IdleHistoryEntry {
                        id: action.id,
                        workspace: action.workspace.clone(),
                        action: action.action,
                        policy: action.policy.clone(),
                        outcome: HistoryOutcome::Failed,
                        detail: RESTART_REASON.to_string(),
                        recorded_at_ms: now,
                    })
                    .map_err(|e| LifecycleError::CorruptState(e.to_string()))?;
                report.orphaned_actions += 1;
                tracing::warn!(
                    workspace = %action.workspace,
                    action = %action.action,
                    "failed action orphaned by restart"
                );
            }
            ActionStatus::Queued => {
                // Queued actions survive as-is; ones whose deadline passed
                // while the daemon was down are simply due immediately.
                report.requeued_actions += 1;
            }
            _ => {}
        }
    }

    // 3. Restore the built-in policy set if the store holds none.
    evaluator
        .ensure_default_policies()
        .map_err(|e| LifecycleError::CorruptState(e.to_string()))?;

    // 4. Confirm running workspaces against the provider; gone instances
    //    transition to failed. Sampling resumes naturally since the
    //    scheduler discovers running workspaces each tick.
    for name in running {
        match engine.sync_with_provider(&name).await {
            Ok(()) => report.synced_running += 1,
            Err(e) => tracing::warn!(workspace = %name, error = %e, "startup provider sync"),
        }
    }

    tracing::info!(
        workspaces = report.workspaces,
        orphaned_actions = report.orphaned_actions,
        requeued_actions = report.requeued_actions,
        "startup reconciliation complete"
    );
    Ok(report)
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
