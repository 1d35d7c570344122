// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending-action executor.
//!
//! A single loop wakes on a fixed tick and on queue notifications, claims
//! due actions with a store transaction, and drives the lifecycle engine.
//! The transactional `queued → executing` move is the at-most-once fence:
//! a crash after it is recovered at startup by failing the dangling action,
//! never by re-applying it.

use crate::engine::{Engine, EngineError};
use crate::idle::actions::{ActionError, ActionStore};
use outpost_core::{ActionStatus, Clock, HistoryOutcome, IdleAction, IdleHistoryEntry};
use outpost_storage::TransactOutcome;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Default executor wake interval.
pub const DEFAULT_TICK: Duration = Duration::from_secs(15);

/// Counts from one execution pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteReport {
    pub executed: usize,
    pub failed: usize,
    pub requeued: usize,
}

pub struct ActionExecutor<C: Clock> {
    actions: ActionStore,
    engine: Arc<Engine<C>>,
    clock: C,
    dry_run: AtomicBool,
    tick: Duration,
    wake: Arc<Notify>,
}

impl<C: Clock> ActionExecutor<C> {
    pub fn new(
        actions: ActionStore,
        engine: Arc<Engine<C>>,
        clock: C,
        dry_run: bool,
        wake: Arc<Notify>,
    ) -> Self {
        Self {
            actions,
            engine,
            clock,
            dry_run: AtomicBool::new(dry_run),
            tick: DEFAULT_TICK,
            wake,
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run.load(Ordering::Relaxed)
    }

    pub fn set_dry_run(&self, dry_run: bool) {
        self.dry_run.store(dry_run, Ordering::Relaxed);
    }

    /// Run until cancelled, executing due actions on every tick and on
    /// every queue notification.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.tick) => {}
                _ = self.wake.notified() => {}
            }
            match self.execute_due(false).await {
                Ok(report) if report != ExecuteReport::default() => {
                    tracing::info!(
                        executed = report.executed,
                        failed = report.failed,
                        requeued = report.requeued,
                        "action executor pass"
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "action executor pass failed"),
            }
        }
    }

    /// Execute every due action. `force` overrides dry-run mode for this
    /// pass (the API's explicit flush flag); deadlines still apply.
    pub async fn execute_due(&self, force: bool) -> Result<ExecuteReport, ActionError> {
        let now = self.clock.epoch_ms();
        let all = self.actions.list_versioned()?;
        let mut report = ExecuteReport::default();

        // One in-flight action per workspace.
        let mut busy: HashSet<String> = all
            .iter()
            .filter(|(a, _)| a.status == ActionStatus::Executing)
            .map(|(a, _)| a.workspace.clone())
            .collect();

        for (action, version) in all {
            if !action.is_due(now) || busy.contains(&action.workspace) {
                continue;
            }

            // The fence: whoever commits this transition owns the action.
            let mut claimed = action.clone();
            claimed.status = ActionStatus::Executing;
            match self.actions.update(&claimed, version)? {
                TransactOutcome::Committed => {}
                TransactOutcome::Conflict => continue,
            }
            let claimed_version = version + 1;
            busy.insert(claimed.workspace.clone());

            if self.dry_run() && !force {
                self.finish(
                    claimed,
                    claimed_version,
                    ActionStatus::Applied,
                    HistoryOutcome::Simulated,
                    "dry-run",
                )?;
                report.executed += 1;
                continue;
            }

            if claimed.action == IdleAction::Notify {
                tracing::warn!(
                    workspace = %claimed.workspace,
                    policy = %claimed.policy,
                    "workspace is idle"
                );
                self.finish(
                    claimed,
                    claimed_version,
                    ActionStatus::Applied,
                    HistoryOutcome::Applied,
                    "notified",
                )?;
                report.executed += 1;
                continue;
            }

            match self.engine.apply_idle_action(&claimed.workspace, claimed.action).await {
                Ok(_) => {
                    self.finish(
                        claimed,
                        claimed_version,
                        ActionStatus::Applied,
                        HistoryOutcome::Applied,
                        "",
                    )?;
                    report.executed += 1;
                }
                Err(EngineError::Provider(e)) if e.is_retryable() => {
                    let mut requeued = claimed;
                    requeued.status = ActionStatus::Queued;
                    requeued.attempts += 1;
                    requeued.deadline_at_ms = now + requeued.retry_delay_ms();
                    let _ = self.actions.update(&requeued, claimed_version)?;
                    report.requeued += 1;
                }
                Err(e) => {
                    tracing::error!(
                        workspace = %claimed.workspace,
                        action = %claimed.action,
                        error = %e,
                        "idle action failed"
                    );
                    self.finish(
                        claimed,
                        claimed_version,
                        ActionStatus::Failed,
                        HistoryOutcome::Failed,
                        &e.to_string(),
                    )?;
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Seal an action with its final status and the matching history entry.
    fn finish(
        &self,
        mut action: outpost_core::PendingAction,
        version: u64,
        status: ActionStatus,
        outcome: HistoryOutcome,
        detail: &str,
    ) -> Result<(), ActionError> {
        action.status = status;
        let _ = self.actions.update(&action, version)?;
        self.actions.record_history(&IdleHistoryEntry {
            id: action.id,
            workspace: action.workspace.clone(),
            action: action.action,
            policy: action.policy.clone(),
            outcome,
            detail: detail.to_string(),
            recorded_at_ms: self.clock.epoch_ms(),
        })
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
