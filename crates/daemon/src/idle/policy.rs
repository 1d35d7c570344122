// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy evaluation over idle samples.
//!
//! Runs on every inserted sample for the affected workspace. A sustained
//! idle window queues a pending action with a grace deadline; renewed
//! activity cancels it; a stronger recommendation supersedes a weaker one
//! (`terminate > stop > hibernate > notify`). At most one active action per
//! workspace at any time.

use crate::idle::actions::{ActionError, ActionStore};
use outpost_core::{
    ActionStatus, Clock, IdleAction, IdlePolicy, PendingAction, SampleWindow, Thresholds,
    Workspace,
};
use outpost_storage::{codec, keys, StateStore};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Store(#[from] outpost_storage::StoreError),

    #[error(transparent)]
    Codec(#[from] codec::CodecError),
}

/// The built-in policy set registered on first startup.
pub fn default_policies() -> Vec<IdlePolicy> {
    let thresholds = Thresholds {
        cpu_below_pct: 10.0,
        mem_below_pct: 20.0,
        max_active_sessions: 0,
        net_below_bps: None,
    };
    vec![
        IdlePolicy {
            name: "conservative".to_string(),
            thresholds,
            window_secs: 1800,
            action: IdleAction::Notify,
            grace_secs: 300,
            confidence_required: 0.95,
            applies_to: Vec::new(),
        },
        IdlePolicy {
            name: "balanced".to_string(),
            thresholds,
            window_secs: 300,
            action: IdleAction::Hibernate,
            grace_secs: 60,
            confidence_required: 0.9,
            applies_to: Vec::new(),
        },
        IdlePolicy {
            name: "aggressive".to_string(),
            thresholds: Thresholds { cpu_below_pct: 15.0, ..thresholds },
            window_secs: 600,
            action: IdleAction::Stop,
            grace_secs: 120,
            confidence_required: 0.9,
            applies_to: Vec::new(),
        },
    ]
}

/// Maps idle signals + policy definitions to pending actions.
pub struct PolicyEvaluator<C: Clock> {
    store: Arc<StateStore>,
    actions: ActionStore,
    clock: C,
    /// Pinged whenever a new action is queued so the executor wakes early.
    executor_wake: Arc<Notify>,
}

/// Fraction of `Ok` samples in the window satisfying the thresholds.
/// `None` when the window holds no usable samples.
fn window_fraction(
    window: &SampleWindow,
    since_ms: u64,
    thresholds: &Thresholds,
) -> Option<f64> {
    let mut total = 0usize;
    let mut satisfied = 0usize;
    for sample in window.since(since_ms) {
        if sample.outcome != outpost_core::ProbeOutcome::Ok {
            continue;
        }
        total += 1;
        if thresholds.satisfied_by(sample) {
            satisfied += 1;
        }
    }
    if total == 0 {
        None
    } else {
        Some(satisfied as f64 / total as f64)
    }
}

impl<C: Clock> PolicyEvaluator<C> {
    pub fn new(store: Arc<StateStore>, clock: C, executor_wake: Arc<Notify>) -> Self {
        let actions = ActionStore::new(store.clone());
        Self { store, actions, clock, executor_wake }
    }

    pub fn actions(&self) -> &ActionStore {
        &self.actions
    }

    pub fn policies(&self) -> Result<Vec<IdlePolicy>, PolicyError> {
        let mut out = Vec::new();
        for (_, bytes) in self.store.list_prefix(keys::POLICY_PREFIX) {
            out.push(codec::decode(&bytes)?);
        }
        Ok(out)
    }

    pub fn put_policy(&self, policy: &IdlePolicy) -> Result<(), PolicyError> {
        let value = codec::encode(policy)?;
        self.store.put(&keys::policy(&policy.name), value)?;
        Ok(())
    }

    /// Register the built-in set when the store holds no policies at all.
    pub fn ensure_default_policies(&self) -> Result<(), PolicyError> {
        if self.policies()?.is_empty() {
            for policy in default_policies() {
                self.put_policy(&policy)?;
            }
            tracing::info!("registered default idle policies");
        }
        Ok(())
    }

    /// Evaluate every matching policy against the workspace's window.
    pub fn on_sample(
        &self,
        workspace: &Workspace,
        window: &SampleWindow,
    ) -> Result<(), PolicyError> {
        let now = self.clock.epoch_ms();
        let policies = self.policies()?;
        let active = self.actions.active_for(&workspace.name)?;

        // Strongest satisfied recommendation wins.
        let mut candidate: Option<(&IdlePolicy, f64)> = None;
        for policy in &policies {
            if !policy.applies_to_template(&workspace.template) {
                continue;
            }
            let since = (now.saturating_sub(policy.window_ms()))
                .max(workspace.last_transition_at_ms);
            let Some(fraction) = window_fraction(window, since, &policy.thresholds) else {
                continue;
            };
            if fraction >= policy.confidence_required {
                let stronger = match &candidate {
                    Some((best, _)) => policy.action > best.action,
                    None => true,
                };
                if stronger {
                    candidate = Some((policy, fraction));
                }
            }
        }

        match (candidate, active) {
            // Nothing recommended, nothing queued.
            (None, None) => {}

            // Activity resumed below threshold: cancel the queued action.
            (None, Some((action, version))) => {
                if action.status == ActionStatus::Queued
                    && self.fraction_for(&action, workspace, window, now)?
                        .map_or(true, |(fraction, required)| fraction < required)
                {
                    self.cancel_action(&action, version, "activity resumed", now)?;
                }
            }

            (Some((policy, fraction)), None) => {
                self.queue_action(workspace, policy, fraction, now)?;
            }

            (Some((policy, fraction)), Some((action, version))) => {
                if action.status == ActionStatus::Executing {
                    return Ok(()); // executor owns it now
                }
                if policy.action == action.action {
                    // Same recommendation: refresh the evidence.
                    let mut refreshed = action.clone();
                    refreshed.reason = reason_line(policy, fraction);
                    // Losing this race is fine; the action is unchanged.
                    let _ = self.actions.update(&refreshed, version)?;
                } else if policy.action > action.action {
                    // Stronger recommendation supersedes the weaker one.
                    if self.cancel_action(&action, version, "superseded by stronger action", now)? {
                        self.queue_action(workspace, policy, fraction, now)?;
                    }
                }
                // Weaker recommendation: the queued action stands.
            }
        }
        Ok(())
    }

    /// Recompute the owning policy's fraction for a queued action.
    /// `None` when the policy is gone or the window is empty.
    fn fraction_for(
        &self,
        action: &PendingAction,
        workspace: &Workspace,
        window: &SampleWindow,
        now: u64,
    ) -> Result<Option<(f64, f64)>, PolicyError> {
        let policies = self.policies()?;
        let Some(policy) = policies.iter().find(|p| p.name == action.policy) else {
            return Ok(None);
        };
        let since =
            (now.saturating_sub(policy.window_ms())).max(workspace.last_transition_at_ms);
        Ok(window_fraction(window, since, &policy.thresholds)
            .map(|fraction| (fraction, policy.confidence_required)))
    }

    fn queue_action(
        &self,
        workspace: &Workspace,
        policy: &IdlePolicy,
        fraction: f64,
        now: u64,
    ) -> Result<(), PolicyError> {
        let action = PendingAction::queued(
            &workspace.name,
            policy.action,
            &policy.name,
            now,
            policy.grace_ms(),
            reason_line(policy, fraction),
        );
        self.actions.queue(&action)?;
        tracing::info!(
            workspace = %workspace.name,
            policy = %policy.name,
            action = %policy.action,
            deadline_at_ms = action.deadline_at_ms,
            "idle action queued"
        );
        self.executor_wake.notify_one();
        Ok(())
    }

    fn cancel_action(
        &self,
        action: &PendingAction,
        version: u64,
        reason: &str,
        now: u64,
    ) -> Result<bool, PolicyError> {
        let cancelled = self.actions.cancel(action, version, reason, now)?;
        if cancelled {
            tracing::info!(
                workspace = %action.workspace,
                policy = %action.policy,
                action = %action.action,
                reason,
                "idle action cancelled"
            );
        }
        Ok(cancelled)
    }
}

fn reason_line(policy: &IdlePolicy, fraction: f64) -> String {
    format!(
        "{} idle at {:.0}% confidence over {}s window",
        policy.name,
        fraction * 100.0,
        policy.window_secs
    )
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
