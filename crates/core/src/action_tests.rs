// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::idle::IdleAction;

#[test]
fn queued_action_deadline_is_created_plus_grace() {
    let action = PendingAction::queued("w1", IdleAction::Hibernate, "balanced", 1_000_000, 60_000, "idle");
    assert_eq!(action.status, ActionStatus::Queued);
    assert_eq!(action.deadline_at_ms, 1_060_000);
    assert_eq!(action.attempts, 0);
}

#[test]
fn due_at_exact_deadline() {
    let action = PendingAction::queued("w1", IdleAction::Stop, "p", 0, 60_000, "");
    assert!(!action.is_due(59_999));
    assert!(action.is_due(60_000), "deadline arriving at the tick executes in that tick");
    assert!(action.is_due(60_001));
}

#[test]
fn non_queued_actions_are_never_due() {
    let mut action = PendingAction::queued("w1", IdleAction::Stop, "p", 0, 0, "");
    action.status = ActionStatus::Executing;
    assert!(!action.is_due(u64::MAX));
    action.status = ActionStatus::Applied;
    assert!(!action.is_due(u64::MAX));
}

#[test]
fn retry_delay_doubles_and_caps() {
    let mut action = PendingAction::queued("w1", IdleAction::Hibernate, "p", 0, 0, "");
    assert_eq!(action.retry_delay_ms(), 30_000);
    action.attempts = 1;
    assert_eq!(action.retry_delay_ms(), 60_000);
    action.attempts = 4;
    assert_eq!(action.retry_delay_ms(), 480_000);
    action.attempts = 5;
    assert_eq!(action.retry_delay_ms(), 600_000, "capped at 10 min");
    action.attempts = 40;
    assert_eq!(action.retry_delay_ms(), 600_000, "large attempt counts stay capped");
}

#[test]
fn active_statuses() {
    assert!(ActionStatus::Queued.is_active());
    assert!(ActionStatus::Executing.is_active());
    assert!(!ActionStatus::Applied.is_active());
    assert!(!ActionStatus::Cancelled.is_active());
    assert!(!ActionStatus::Failed.is_active());
}

#[test]
fn pending_action_serde_round_trip() {
    let action = PendingAction::queued("w2", IdleAction::Terminate, "aggressive", 5_000, 10_000, "sustained idle");
    let json = serde_json::to_string(&action).unwrap();
    let back: PendingAction = serde_json::from_str(&json).unwrap();
    assert_eq!(back, action);
}

#[test]
fn history_entry_keeps_action_id() {
    let action = PendingAction::queued("w1", IdleAction::Hibernate, "balanced", 0, 0, "");
    let entry = IdleHistoryEntry {
        id: action.id,
        workspace: action.workspace.clone(),
        action: action.action,
        policy: action.policy.clone(),
        outcome: HistoryOutcome::Applied,
        detail: String::new(),
        recorded_at_ms: 99,
    };
    assert_eq!(entry.id, action.id);
}
