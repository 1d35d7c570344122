// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy-layer session records.
//!
//! A connection's lifetime equals its underlying transport; connections are
//! process-local and never persisted across daemon restarts.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a proxy session.
    pub struct ConnectionId("con-");
}

/// Kind of proxy session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionKind {
    /// Interactive shell bridged over a WebSocket.
    Terminal,
    /// Forwarded port to an in-workspace service.
    WebTunnel,
    /// Federated cloud-service session (token-bounded, no stream held).
    CloudService,
}

crate::simple_display! {
    ConnectionKind {
        Terminal => "terminal",
        WebTunnel => "web_tunnel",
        CloudService => "cloud_service",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Open,
    Closed,
}

crate::simple_display! {
    ConnectionStatus {
        Open => "open",
        Closed => "closed",
    }
}

/// One proxy-layer session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: ConnectionId,
    pub kind: ConnectionKind,
    /// Workspace name, or service name for cloud-service sessions.
    pub target: String,
    pub opened_at_ms: u64,
    pub status: ConnectionStatus,
    /// Kind-specific details (local port, token expiry, geometry...).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl Connection {
    pub fn open(kind: ConnectionKind, target: impl Into<String>, opened_at_ms: u64) -> Self {
        Self {
            id: ConnectionId::new(),
            kind,
            target: target.into(),
            opened_at_ms,
            status: ConnectionStatus::Open,
            metadata: serde_json::Value::Null,
        }
    }
}
