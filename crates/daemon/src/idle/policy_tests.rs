// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Evaluator behavior: queueing, refreshing, superseding, cancelling.

use super::*;
use crate::test_support::Harness;
use outpost_core::test_support::{busy_sample, idle_sample, sample};
use outpost_core::{HistoryOutcome, ProbeOutcome};
use std::time::Duration;

#[tokio::test]
async fn sustained_idle_queues_one_action() {
    let h = Harness::new();
    let ws = h.launch_running("w1").await;
    let policy = h.with_balanced_policy();

    h.feed_idle_samples(&ws, 10);

    let actions = h.evaluator.actions().list().unwrap();
    assert_eq!(actions.len(), 1, "repeated evaluation must refresh, not duplicate");
    let action = &actions[0];
    assert_eq!(action.status, ActionStatus::Queued);
    assert_eq!(action.action, IdleAction::Hibernate);
    assert_eq!(action.policy, policy.name);
    assert_eq!(
        action.deadline_at_ms,
        action.created_at_ms + policy.grace_ms(),
        "deadline is creation plus grace"
    );
}

#[tokio::test]
async fn activity_resumption_cancels_the_queued_action() {
    let h = Harness::new();
    let ws = h.launch_running("w1").await;
    h.with_balanced_policy();

    h.feed_idle_samples(&ws, 6);
    assert_eq!(h.evaluator.actions().active_for("w1").unwrap().map(|(a, _)| a.status),
        Some(ActionStatus::Queued));

    // Burst of activity drops the fraction below confidence.
    h.clock.advance(Duration::from_secs(60));
    let busy = busy_sample("w1", h.clock.epoch_ms());
    h.samples.insert(busy, ws.last_transition_at_ms);
    let window = h.samples.window("w1").unwrap();
    h.evaluator.on_sample(&ws, &window).unwrap();

    assert!(h.evaluator.actions().active_for("w1").unwrap().is_none());
    let (history, _) = h.evaluator.actions().history_page(0, 10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].outcome, HistoryOutcome::Cancelled);
    assert!(h.provider.mutating_calls().len() <= 1, "cancellation never touches the provider");
}

#[tokio::test]
async fn stronger_recommendation_supersedes_weaker() {
    let h = Harness::new();
    let ws = h.launch_running("w1").await;

    // Hibernate fires on cpu<10; stop needs a quieter machine for longer.
    h.with_balanced_policy();
    let stop_policy = IdlePolicy {
        name: "deep-idle".to_string(),
        thresholds: Thresholds {
            cpu_below_pct: 1.5,
            mem_below_pct: 20.0,
            max_active_sessions: 0,
            net_below_bps: None,
        },
        window_secs: 600,
        action: IdleAction::Stop,
        grace_secs: 600,
        confidence_required: 0.95,
        applies_to: Vec::new(),
    };
    h.evaluator.put_policy(&stop_policy).unwrap();

    // Moderately idle: only the hibernate policy is satisfied.
    h.feed_idle_samples(&ws, 5);
    let (active, _) = h.evaluator.actions().active_for("w1").unwrap().unwrap();
    assert_eq!(active.action, IdleAction::Hibernate);
    let superseded_id = active.id;

    // Deep idle long enough that the stop policy's window is saturated.
    for _ in 0..11 {
        h.clock.advance(Duration::from_secs(60));
        let deep = sample("w1", h.clock.epoch_ms(), 1.0, 5.0, 0);
        h.samples.insert(deep, ws.last_transition_at_ms);
        let window = h.samples.window("w1").unwrap();
        h.evaluator.on_sample(&ws, &window).unwrap();
    }

    let (active, _) = h.evaluator.actions().active_for("w1").unwrap().unwrap();
    assert_eq!(active.action, IdleAction::Stop, "terminate > stop > hibernate > notify");

    let cancelled = h.evaluator.actions().history_entry(superseded_id).unwrap().unwrap();
    assert_eq!(cancelled.outcome, HistoryOutcome::Cancelled);
}

#[tokio::test]
async fn failed_probes_do_not_feed_thresholds() {
    let h = Harness::new();
    let ws = h.launch_running("w1").await;
    h.with_balanced_policy();

    for _ in 0..10 {
        h.clock.advance(Duration::from_secs(60));
        let timeout =
            outpost_core::IdleSample::failed("w1", h.clock.epoch_ms(), ProbeOutcome::Timeout);
        h.samples.insert(timeout, ws.last_transition_at_ms);
        let window = h.samples.window("w1").unwrap();
        h.evaluator.on_sample(&ws, &window).unwrap();
    }

    assert!(h.evaluator.actions().list().unwrap().is_empty(), "timeouts carry no idle signal");
}

#[tokio::test]
async fn policies_scope_to_templates() {
    let h = Harness::new();
    let ws = h.launch_running("w1").await; // template python-ml
    let mut policy = IdlePolicy::builder().build();
    policy.applies_to = vec!["r-studio".to_string()];
    h.evaluator.put_policy(&policy).unwrap();

    h.feed_idle_samples(&ws, 10);
    assert!(h.evaluator.actions().list().unwrap().is_empty());
}

#[tokio::test]
async fn samples_predating_the_last_transition_are_excluded() {
    let h = Harness::new();
    let ws = h.launch_running("w1").await;
    h.with_balanced_policy();

    // A busy stretch queues nothing.
    for _ in 0..4 {
        h.clock.advance(Duration::from_secs(60));
        let busy = busy_sample("w1", h.clock.epoch_ms());
        h.samples.insert(busy, ws.last_transition_at_ms);
        let window = h.samples.window("w1").unwrap();
        h.evaluator.on_sample(&ws, &window).unwrap();
    }
    assert!(h.evaluator.actions().active_for("w1").unwrap().is_none());

    // A lifecycle transition invalidates the accumulated evidence; with the
    // busy samples excluded, a single fresh idle sample is 1/1 confident.
    // (Were the old samples still counted the fraction would be 1/5.)
    let mut transitioned = ws.clone();
    transitioned.last_transition_at_ms = h.clock.epoch_ms();

    h.clock.advance(Duration::from_secs(60));
    let fresh = idle_sample("w1", h.clock.epoch_ms());
    h.samples.insert(fresh, transitioned.last_transition_at_ms);
    let window = h.samples.window("w1").unwrap();
    h.evaluator.on_sample(&transitioned, &window).unwrap();

    let (active, _) = h.evaluator.actions().active_for("w1").unwrap().unwrap();
    assert_eq!(active.action, IdleAction::Hibernate);
}

#[test]
fn default_policy_set_registers_once() {
    let h = Harness::new();
    h.evaluator.ensure_default_policies().unwrap();
    let count = h.evaluator.policies().unwrap().len();
    assert_eq!(count, 3);

    // Second call is a no-op.
    h.evaluator.ensure_default_policies().unwrap();
    assert_eq!(h.evaluator.policies().unwrap().len(), count);
}
