// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending actions and audit history.
//!
//! A pending action is the durable record of a recommended, not-yet-applied
//! transition. The evaluator owns it while queued; the executor takes
//! ownership with a store transaction when it picks it up.

use crate::idle::IdleAction;
use crate::workspace::WorkspaceState;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a pending action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Queued,
    Executing,
    Applied,
    Cancelled,
    Failed,
}

crate::simple_display! {
    ActionStatus {
        Queued => "queued",
        Executing => "executing",
        Applied => "applied",
        Cancelled => "cancelled",
        Failed => "failed",
    }
}

impl ActionStatus {
    /// Active actions block new recommendations for the same workspace.
    pub fn is_active(&self) -> bool {
        matches!(self, ActionStatus::Queued | ActionStatus::Executing)
    }
}

/// A durable record of a recommended, not-yet-applied transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    pub id: Uuid,
    pub workspace: String,
    pub action: IdleAction,
    /// Name of the policy that queued this action.
    pub policy: String,
    pub created_at_ms: u64,
    /// When the action becomes actionable (created + grace, plus backoff).
    pub deadline_at_ms: u64,
    pub status: ActionStatus,
    pub reason: String,
    /// Execution attempts so far; drives retry backoff.
    #[serde(default)]
    pub attempts: u32,
}

impl PendingAction {
    pub fn queued(
        workspace: impl Into<String>,
        action: IdleAction,
        policy: impl Into<String>,
        now_ms: u64,
        grace_ms: u64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace: workspace.into(),
            action,
            policy: policy.into(),
            created_at_ms: now_ms,
            deadline_at_ms: now_ms + grace_ms,
            status: ActionStatus::Queued,
            reason: reason.into(),
            attempts: 0,
        }
    }

    /// Due = queued and at or past its deadline.
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.status == ActionStatus::Queued && self.deadline_at_ms <= now_ms
    }

    /// Retry backoff: `min(2^attempts * 30 s, 10 min)` added to the deadline.
    pub fn retry_delay_ms(&self) -> u64 {
        const BASE_MS: u64 = 30_000;
        const CAP_MS: u64 = 600_000;
        BASE_MS.saturating_mul(1u64 << self.attempts.min(32)).min(CAP_MS)
    }
}

/// Outcome recorded in the idle history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOutcome {
    Applied,
    Simulated,
    Cancelled,
    Failed,
}

crate::simple_display! {
    HistoryOutcome {
        Applied => "applied",
        Simulated => "simulated",
        Cancelled => "cancelled",
        Failed => "failed",
    }
}

/// Immutable audit record of an applied or cancelled pending action.
///
/// Written once under `idleHistory/<id>`, never mutated. The id matches the
/// pending action that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleHistoryEntry {
    pub id: Uuid,
    pub workspace: String,
    pub action: IdleAction,
    pub policy: String,
    pub outcome: HistoryOutcome,
    #[serde(default)]
    pub detail: String,
    pub recorded_at_ms: u64,
}

/// Audit record of a lifecycle transition.
///
/// `from` is `None` for the launch edge (creation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    pub id: Uuid,
    pub workspace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<WorkspaceState>,
    pub to: WorkspaceState,
    pub at_ms: u64,
    #[serde(default)]
    pub reason: String,
}

impl TransitionRecord {
    pub fn new(
        workspace: impl Into<String>,
        from: Option<WorkspaceState>,
        to: WorkspaceState,
        at_ms: u64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace: workspace.into(),
            from,
            to,
            at_ms,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
