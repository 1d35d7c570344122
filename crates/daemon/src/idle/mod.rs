// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Autonomous idle detection and cost optimization.
//!
//! The sampler probes running workspaces and owns the sample rings; the
//! policy evaluator turns sustained idleness into durable pending actions;
//! the executor applies due actions through the lifecycle engine with
//! at-most-once semantics.

pub mod actions;
pub mod executor;
pub mod policy;
pub mod probe;
pub mod sampler;


use outpost_core::{IdleSample, SampleWindow, DEFAULT_WINDOW_LEN};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Per-workspace sample rings. Owned by the sampler; read-only everywhere
/// else (snapshots are cheap clones of one ring).
pub struct SampleStore {
    windows: Mutex<HashMap<String, SampleWindow>>,
    last_sample_at_ms: Mutex<Option<u64>>,
    capacity: usize,
}

impl Default for SampleStore {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_LEN)
    }
}

impl SampleStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            last_sample_at_ms: Mutex::new(None),
            capacity,
        }
    }

    /// Insert a sample; `floor_ms` is the workspace's last transition, so
    /// stale probes that straddle a lifecycle change are dropped.
    pub fn insert(&self, sample: IdleSample, floor_ms: u64) -> bool {
        let mut windows = self.windows.lock();
        let window = windows
            .entry(sample.workspace.clone())
            .or_insert_with(|| SampleWindow::new(self.capacity));
        let taken_at = sample.taken_at_ms;
        let inserted = window.insert(sample, floor_ms);
        if inserted {
            *self.last_sample_at_ms.lock() = Some(taken_at);
        }
        inserted
    }

    /// Snapshot one workspace's ring.
    pub fn window(&self, workspace: &str) -> Option<SampleWindow> {
        self.windows.lock().get(workspace).cloned()
    }

    /// Drop a workspace's ring (leaving the running state).
    pub fn clear(&self, workspace: &str) {
        self.windows.lock().remove(workspace);
    }

    pub fn last_sample_at_ms(&self) -> Option<u64> {
        *self.last_sample_at_ms.lock()
    }

    pub fn workspace_count(&self) -> usize {
        self.windows.lock().len()
    }
}
