// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hierarchical key layout for the state store.

pub const WORKSPACE_PREFIX: &str = "workspace/";
pub const SHARED_VOLUME_PREFIX: &str = "volume/shared/";
pub const BLOCK_VOLUME_PREFIX: &str = "volume/block/";
pub const PENDING_ACTION_PREFIX: &str = "pendingAction/";
pub const IDLE_HISTORY_PREFIX: &str = "idleHistory/";
pub const POLICY_PREFIX: &str = "policy/";
pub const TRANSITION_PREFIX: &str = "transitionHistory/";

pub fn workspace(name: &str) -> String {
    format!("{WORKSPACE_PREFIX}{name}")
}

pub fn shared_volume(name: &str) -> String {
    format!("{SHARED_VOLUME_PREFIX}{name}")
}

pub fn block_volume(name: &str) -> String {
    format!("{BLOCK_VOLUME_PREFIX}{name}")
}

pub fn pending_action(id: &str) -> String {
    format!("{PENDING_ACTION_PREFIX}{id}")
}

pub fn idle_history(id: &str) -> String {
    format!("{IDLE_HISTORY_PREFIX}{id}")
}

pub fn policy(name: &str) -> String {
    format!("{POLICY_PREFIX}{name}")
}

pub fn transition(id: &str) -> String {
    format!("{TRANSITION_PREFIX}{id}")
}
