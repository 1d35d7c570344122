// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-recovery semantics.

use super::*;
use crate::test_support::Harness;
use outpost_core::{ActionStatus, HistoryOutcome, IdleAction, PendingAction, WorkspaceState};
use outpost_provider::RuntimeState;
use outpost_storage::keys;

async fn run_reconcile(h: &Harness) -> ReconcileReport {
    reconcile(&h.store, &h.evaluator, &h.engine, &h.clock).await.unwrap()
}

#[tokio::test]
async fn executing_actions_fail_with_the_restart_reason() {
    let h = Harness::new();
    h.launch_running("w1").await;

    // An action caught mid-execution by the crash.
    let mut action = PendingAction::queued(
        "w1",
        IdleAction::Hibernate,
        "balanced",
        h.clock.epoch_ms(),
        0,
        "idle",
    );
    action.status = ActionStatus::Executing;
    h.evaluator.actions().queue(&action).unwrap();

    let report = run_reconcile(&h).await;
    assert_eq!(report.orphaned_actions, 1);

    let (recovered, _) = h.evaluator.actions().get(action.id).unwrap();
    assert_eq!(recovered.status, ActionStatus::Failed);
    assert_eq!(recovered.reason, RESTART_REASON);

    // The workspace is untouched by recovery.
    assert_eq!(h.registry.get("w1").unwrap().state, WorkspaceState::Running);

    let entry = h.evaluator.actions().history_entry(action.id).unwrap().unwrap();
    assert_eq!(entry.outcome, HistoryOutcome::Failed);
}

#[tokio::test]
async fn recovery_permits_a_fresh_requeue() {
    let h = Harness::new();
    let ws = h.launch_running("w1").await;
    h.with_balanced_policy();

    let mut action = PendingAction::queued(
        "w1",
        IdleAction::Hibernate,
        "balanced",
        h.clock.epoch_ms(),
        0,
        "idle",
    );
    action.status = ActionStatus::Executing;
    h.evaluator.actions().queue(&action).unwrap();

    run_reconcile(&h).await;
    assert!(h.evaluator.actions().active_for("w1").unwrap().is_none());

    // Renewed idleness queues a brand new action.
    h.feed_idle_samples(&ws, 3);
    let (fresh, _) = h.evaluator.actions().active_for("w1").unwrap().unwrap();
    assert_ne!(fresh.id, action.id);
    assert_eq!(fresh.status, ActionStatus::Queued);
}

#[tokio::test]
async fn queued_actions_survive_restart() {
    let h = Harness::new();
    h.launch_running("w1").await;

    let action = PendingAction::queued(
        "w1",
        IdleAction::Stop,
        "aggressive",
        h.clock.epoch_ms(),
        600_000,
        "idle",
    );
    h.evaluator.actions().queue(&action).unwrap();

    let report = run_reconcile(&h).await;
    assert_eq!(report.requeued_actions, 1);
    let (kept, _) = h.evaluator.actions().get(action.id).unwrap();
    assert_eq!(kept.status, ActionStatus::Queued);
    assert_eq!(kept.deadline_at_ms, action.deadline_at_ms);
}

#[tokio::test]
async fn running_workspace_gone_at_provider_is_failed() {
    let h = Harness::new();
    let ws = h.launch_running("w1").await;
    h.provider.set_instance_state(&ws.provider_id, RuntimeState::Gone);

    run_reconcile(&h).await;
    assert_eq!(h.registry.get("w1").unwrap().state, WorkspaceState::Failed);
}

#[tokio::test]
async fn default_policies_restore_when_absent() {
    let h = Harness::new();
    run_reconcile(&h).await;
    assert_eq!(h.evaluator.policies().unwrap().len(), 3);
}

#[tokio::test]
async fn future_schema_workspace_refuses_startup() {
    let h = Harness::new();
    let forged = format!(
        r#"{{"schemaVersion":{},"payload":{{}}}}"#,
        outpost_storage::SCHEMA_VERSION + 1
    );
    h.store.put(&keys::workspace("w-future"), forged.into_bytes()).unwrap();

    let result = reconcile(&h.store, &h.evaluator, &h.engine, &h.clock).await;
    assert!(matches!(result, Err(LifecycleError::SchemaDowngrade { .. })));
}
