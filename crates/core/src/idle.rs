// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idle detection primitives: samples, ring buffers, and policies.
//!
//! The sampler owns [`IdleSample`] production; the policy evaluator is a
//! read-only consumer. Samples live in a bounded per-workspace ring ordered
//! by `taken_at_ms`.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default ring buffer capacity per workspace.
pub const DEFAULT_WINDOW_LEN: usize = 60;

/// How a probe attempt concluded.
///
/// Only `Ok` samples count toward policy thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Ok,
    Timeout,
    Unreachable,
    ParseError,
}

crate::simple_display! {
    ProbeOutcome {
        Ok => "ok",
        Timeout => "timeout",
        Unreachable => "unreachable",
        ParseError => "parse_error",
    }
}

/// One measurement of a workspace's activity at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleSample {
    pub workspace: String,
    pub taken_at_ms: u64,
    pub cpu_pct: f32,
    pub mem_pct: f32,
    pub active_sessions: u32,
    pub net_in_bps: u64,
    pub net_out_bps: u64,
    pub outcome: ProbeOutcome,
}

impl IdleSample {
    /// A sample recording a failed probe; activity fields are zeroed and
    /// never consulted.
    pub fn failed(workspace: impl Into<String>, taken_at_ms: u64, outcome: ProbeOutcome) -> Self {
        Self {
            workspace: workspace.into(),
            taken_at_ms,
            cpu_pct: 0.0,
            mem_pct: 0.0,
            active_sessions: 0,
            net_in_bps: 0,
            net_out_bps: 0,
            outcome,
        }
    }
}

/// Bounded per-workspace ring of samples, strictly ordered by `taken_at_ms`.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<IdleSample>,
    capacity: usize,
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_LEN)
    }
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    /// Insert a sample, evicting the oldest when full.
    ///
    /// Returns false (and drops the sample) when it predates `floor_ms`
    /// (the workspace's last transition) or does not advance past the
    /// newest sample already held — ordering is strict per workspace.
    pub fn insert(&mut self, sample: IdleSample, floor_ms: u64) -> bool {
        if sample.taken_at_ms < floor_ms {
            return false;
        }
        if let Some(newest) = self.samples.back() {
            if sample.taken_at_ms <= newest.taken_at_ms {
                return false;
            }
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        true
    }

    /// Samples with `taken_at_ms >= since_ms`, oldest first.
    pub fn since(&self, since_ms: u64) -> impl Iterator<Item = &IdleSample> {
        self.samples.iter().filter(move |s| s.taken_at_ms >= since_ms)
    }

    pub fn newest(&self) -> Option<&IdleSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop everything — used when a workspace leaves the running state.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// The action a policy recommends when its thresholds hold.
///
/// Ordered by strength: when two policies recommend concurrently the
/// stronger action supersedes (`Terminate > Stop > Hibernate > Notify`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IdleAction {
    Notify,
    Hibernate,
    Stop,
    Terminate,
}

crate::simple_display! {
    IdleAction {
        Notify => "notify",
        Hibernate => "hibernate",
        Stop => "stop",
        Terminate => "terminate",
    }
}

/// Activity thresholds a sample must satisfy to count as idle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub cpu_below_pct: f32,
    pub mem_below_pct: f32,
    pub max_active_sessions: u32,
    /// Combined in+out network rate ceiling; None disables the check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_below_bps: Option<u64>,
}

impl Thresholds {
    pub fn satisfied_by(&self, sample: &IdleSample) -> bool {
        if sample.cpu_pct >= self.cpu_below_pct {
            return false;
        }
        if sample.mem_pct >= self.mem_below_pct {
            return false;
        }
        if sample.active_sessions > self.max_active_sessions {
            return false;
        }
        if let Some(ceiling) = self.net_below_bps {
            if sample.net_in_bps + sample.net_out_bps >= ceiling {
                return false;
            }
        }
        true
    }
}

/// A named rule that consumes samples and emits a recommended action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdlePolicy {
    pub name: String,
    pub thresholds: Thresholds,
    /// Evaluation window in seconds.
    pub window_secs: u64,
    pub action: IdleAction,
    /// Delay between recommendation and actionability, in seconds.
    pub grace_secs: u64,
    /// Fraction of window samples that must satisfy the thresholds (0..=1).
    pub confidence_required: f64,
    /// Template globs this policy applies to (e.g. `python-*`); empty
    /// means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applies_to: Vec<String>,
}

impl IdlePolicy {
    /// Whether this policy covers a template. Patterns are globs; a pattern
    /// that fails to parse degrades to a literal comparison.
    pub fn applies_to_template(&self, template: &str) -> bool {
        self.applies_to.is_empty()
            || self.applies_to.iter().any(|pattern| {
                glob::Pattern::new(pattern)
                    .map(|p| p.matches(template))
                    .unwrap_or_else(|_| pattern.as_str() == template)
            })
    }

    pub fn window_ms(&self) -> u64 {
        self.window_secs * 1000
    }

    pub fn grace_ms(&self) -> u64 {
        self.grace_secs * 1000
    }
}

crate::builder! {
    pub struct IdlePolicyBuilder => IdlePolicy {
        into {
            name: String = "balanced",
        }
        set {
            thresholds: Thresholds = Thresholds {
                cpu_below_pct: 10.0,
                mem_below_pct: 20.0,
                max_active_sessions: 0,
                net_below_bps: None,
            },
            window_secs: u64 = 300,
            action: IdleAction = IdleAction::Hibernate,
            grace_secs: u64 = 60,
            confidence_required: f64 = 0.9,
        }
        computed {
            applies_to: Vec<String> = Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "idle_tests.rs"]
mod tests;
