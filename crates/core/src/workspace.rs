// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace record and lifecycle state machine.
//!
//! A workspace is a managed cloud compute instance with attached storage and
//! a known lifecycle. The daemon's registry is the single writer of these
//! records; everyone else reads.

use serde::{Deserialize, Serialize};

/// Instance size tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Size {
    Xs,
    #[default]
    S,
    M,
    L,
    Xl,
}

crate::simple_display! {
    Size {
        Xs => "XS",
        S => "S",
        M => "M",
        L => "L",
        Xl => "XL",
    }
}

impl std::str::FromStr for Size {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "XS" => Ok(Size::Xs),
            "S" => Ok(Size::S),
            "M" => Ok(Size::M),
            "L" => Ok(Size::L),
            "XL" => Ok(Size::Xl),
            other => Err(format!("unknown size: {}", other)),
        }
    }
}

/// CPU architecture of the underlying instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    #[default]
    X86_64,
    Arm64,
}

crate::simple_display! {
    Arch {
        X86_64 => "x86_64",
        Arm64 => "arm64",
    }
}

/// Kind of a service exposed by a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Web,
    Desktop,
    Api,
}

crate::simple_display! {
    ServiceKind {
        Web => "web",
        Desktop => "desktop",
        Api => "api",
    }
}

/// An in-workspace service reachable through the proxy layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposedService {
    pub name: String,
    pub port: u16,
    pub kind: ServiceKind,
}

/// Lifecycle state of a workspace.
///
/// `Terminated` is terminal: a terminated workspace is immutable. All other
/// states may transition per [`WorkspaceState::can_transition_to`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceState {
    #[default]
    Pending,
    Running,
    Stopping,
    Stopped,
    Hibernating,
    Hibernated,
    Resuming,
    Terminating,
    Terminated,
    Failed,
}

crate::simple_display! {
    WorkspaceState {
        Pending => "pending",
        Running => "running",
        Stopping => "stopping",
        Stopped => "stopped",
        Hibernating => "hibernating",
        Hibernated => "hibernated",
        Resuming => "resuming",
        Terminating => "terminating",
        Terminated => "terminated",
        Failed => "failed",
    }
}

impl WorkspaceState {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkspaceState::Terminated)
    }

    /// States in which the idle sampler probes the workspace.
    pub fn is_sampled(&self) -> bool {
        matches!(self, WorkspaceState::Running)
    }

    /// Whether `self → to` is a legal edge in the lifecycle graph.
    ///
    /// Force-terminate is modeled as `* → Terminating` from any non-terminal
    /// state; `Failed` is reachable from any non-terminal state (auth
    /// failures, provider reporting the instance gone).
    pub fn can_transition_to(&self, to: WorkspaceState) -> bool {
        use WorkspaceState::*;

        if self.is_terminal() {
            return false;
        }
        // Universal edges for non-terminal states.
        if to == Terminating || to == Failed {
            return true;
        }
        matches!(
            (self, to),
            (Pending, Running)
                | (Running, Stopping)
                | (Running, Hibernating)
                | (Stopping, Stopped)
                | (Hibernating, Hibernated)
                | (Stopped, Resuming)
                | (Hibernated, Resuming)
                | (Resuming, Running)
                | (Terminating, Terminated)
        )
    }
}

/// The central entity: a managed cloud research workstation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// Human-readable name, unique within a profile.
    pub name: String,
    /// Opaque instance identifier assigned by the cloud provider.
    #[serde(default)]
    pub provider_id: String,
    /// Owning credential profile.
    pub profile: String,
    pub template: String,
    pub size: Size,
    pub region: String,
    pub architecture: Arch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_address: Option<String>,
    pub ssh_port: u16,
    pub username: String,
    pub created_at_ms: u64,
    /// Timestamp of the last lifecycle transition. Doubles as the version
    /// tag for optimistic updates: a writer carrying an older value fails.
    pub last_transition_at_ms: u64,
    pub state: WorkspaceState,
    pub hourly_rate: f64,
    pub accumulated_cost: f64,
    pub last_cost_sample_at_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shared_volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub block_volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ExposedService>,
}

impl Workspace {
    /// Apply a lifecycle transition, updating the version tag.
    ///
    /// Returns the previous state. Callers must have validated the edge via
    /// [`WorkspaceState::can_transition_to`]; this only records it.
    pub fn transition(&mut self, to: WorkspaceState, at_ms: u64) -> WorkspaceState {
        let from = self.state;
        self.state = to;
        self.last_transition_at_ms = at_ms;
        from
    }

    /// Fold running time since the last cost sample into `accumulated_cost`.
    pub fn sample_cost(&mut self, now_ms: u64) {
        if self.state == WorkspaceState::Running && now_ms > self.last_cost_sample_at_ms {
            let hours = (now_ms - self.last_cost_sample_at_ms) as f64 / 3_600_000.0;
            self.accumulated_cost += self.hourly_rate * hours;
        }
        self.last_cost_sample_at_ms = now_ms;
    }

    /// SSH endpoint for probing and terminal sessions, if addressable.
    pub fn ssh_address(&self) -> Option<(String, u16)> {
        self.public_address
            .as_deref()
            .or(self.private_address.as_deref())
            .map(|host| (host.to_string(), self.ssh_port))
    }
}

crate::builder! {
    pub struct WorkspaceBuilder => Workspace {
        into {
            name: String = "ws-test",
            profile: String = "default",
            template: String = "python-ml",
            region: String = "us-east-1",
            username: String = "ubuntu",
            provider_id: String = "i-0000",
        }
        set {
            size: Size = Size::S,
            architecture: Arch = Arch::X86_64,
            ssh_port: u16 = 22,
            state: WorkspaceState = WorkspaceState::Running,
            created_at_ms: u64 = 1_000_000,
            last_transition_at_ms: u64 = 1_000_000,
            hourly_rate: f64 = 0.25,
        }
        option {
            public_address: String = Some("198.51.100.7".to_string()),
            private_address: String = None,
        }
        computed {
            accumulated_cost: f64 = 0.0,
            last_cost_sample_at_ms: u64 = 1_000_000,
            shared_volumes: Vec<String> = Vec::new(),
            block_volumes: Vec<String> = Vec::new(),
            services: Vec<ExposedService> = Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
