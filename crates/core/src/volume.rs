// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage volume records.
//!
//! Two disjoint kinds: shared network filesystems that many workspaces mount
//! concurrently, and single-writer block devices attached to at most one.

use serde::{Deserialize, Serialize};

/// A network filesystem multiple workspaces can mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedVolume {
    pub name: String,
    #[serde(default)]
    pub provider_id: String,
    pub size_bytes: u64,
    /// Names of workspaces currently mounting this volume.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounted_on: Vec<String>,
    pub created_at_ms: u64,
}

impl SharedVolume {
    pub fn mount(&mut self, workspace: &str) {
        if !self.mounted_on.iter().any(|w| w == workspace) {
            self.mounted_on.push(workspace.to_string());
        }
    }

    pub fn unmount(&mut self, workspace: &str) {
        self.mounted_on.retain(|w| w != workspace);
    }
}

/// A single-writer block device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockVolume {
    pub name: String,
    #[serde(default)]
    pub provider_id: String,
    pub size_bytes: u64,
    /// The one workspace this volume is attached to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_to: Option<String>,
    pub created_at_ms: u64,
}

impl BlockVolume {
    pub fn is_attached(&self) -> bool {
        self.attached_to.is_some()
    }
}

#[cfg(test)]
#[path = "volume_tests.rs"]
mod tests;
