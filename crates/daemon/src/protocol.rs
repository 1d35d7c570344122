// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP API DTOs.
//!
//! Workspace, volume, policy, and action records serialize directly from
//! their core types; this module holds the request bodies, summary shapes,
//! and the error envelope machine clients dispatch on.

use outpost_core::{Size, WorkspaceState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable error codes. Machine clients dispatch on the code; humans read
/// the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    NotFound,
    Conflict,
    Unauthenticated,
    Forbidden,
    ProviderUnavailable,
    ProviderCapacity,
    Internal,
}

outpost_core::simple_display! {
    ErrorCode {
        BadRequest => "bad_request",
        NotFound => "not_found",
        Conflict => "conflict",
        Unauthenticated => "unauthenticated",
        Forbidden => "forbidden",
        ProviderUnavailable => "provider_unavailable",
        ProviderCapacity => "provider_capacity",
        Internal => "internal",
    }
}

/// Error envelope returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthBody {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// `GET /status`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub version: String,
    pub started_at: String,
    pub uptime_seconds: u64,
    /// Workspace counts keyed by lifecycle state.
    pub workspaces: BTreeMap<String, usize>,
    pub pending_actions: usize,
    pub open_connections: usize,
    pub sampling_enabled: bool,
}

/// `POST /instances`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchBody {
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub size: Size,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default)]
    pub hibernation: bool,
}

/// `POST /volumes` and `POST /storage`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeBody {
    pub name: String,
    pub size_bytes: u64,
}

/// `POST /storage/{name}/attach`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachBody {
    pub instance: String,
}

/// `GET /idle/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleStatusBody {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sample_at_ms: Option<u64>,
    pub sampled_workspaces: usize,
    pub worker_count: usize,
    pub interval_secs: u64,
}

/// `POST /idle/execute-actions`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteActionsBody {
    /// Override the configured dry-run mode for this flush.
    #[serde(default)]
    pub force: bool,
}

/// Result of an action flush.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteActionsResult {
    pub executed: usize,
    pub failed: usize,
    pub requeued: usize,
}

/// `GET /web-proxy/{instance}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelBody {
    pub url: String,
    pub local_port: u16,
    pub connection_id: String,
}

/// `GET /aws-proxy/{service}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudSessionBody {
    pub url: String,
    /// Hint for the front-end: `iframe` or `new_tab`.
    pub embedding: String,
    pub expires_at_ms: u64,
}

/// Paged idle-history response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub entries: Vec<outpost_core::IdleHistoryEntry>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

/// Workspace summary for list endpoints: the full record plus derived cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceEntry {
    #[serde(flatten)]
    pub workspace: outpost_core::Workspace,
    /// Cost including the accrual since the last persisted sample.
    pub estimated_cost: f64,
}

/// Filter accepted by `GET /instances`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub state: Option<WorkspaceState>,
}

/// Paging for `GET /idle/history`.
#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub per_page: Option<usize>,
}

/// Template descriptor served by `GET /templates`. Opaque to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateEntry {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub details: serde_json::Value,
}
