// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health, status, shutdown, templates.

use super::ApiError;
use crate::app::App;
use crate::protocol::{HealthBody, StatusBody, TemplateEntry};
use axum::extract::State;
use axum::Json;
use outpost_core::Clock;
use std::sync::Arc;

pub async fn health<C: Clock + 'static>(State(app): State<Arc<App<C>>>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok".to_string(),
        version: App::<C>::version().to_string(),
        uptime_seconds: app.uptime_seconds(),
    })
}

pub async fn status<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
) -> Result<Json<StatusBody>, ApiError> {
    let workspaces = app.registry.counts_by_state()?;
    let pending_actions = app
        .evaluator
        .actions()
        .list()?
        .into_iter()
        .filter(|a| a.status.is_active())
        .count();

    let started_at = chrono::Utc::now()
        - chrono::Duration::seconds(app.uptime_seconds() as i64);

    Ok(Json(StatusBody {
        version: App::<C>::version().to_string(),
        started_at: started_at.to_rfc3339(),
        uptime_seconds: app.uptime_seconds(),
        workspaces,
        pending_actions,
        open_connections: app.tracker.open_count(),
        sampling_enabled: app.sampler.is_enabled(),
    }))
}

pub async fn shutdown<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
) -> Json<serde_json::Value> {
    tracing::info!("shutdown requested over the API");
    app.shutdown.cancel();
    Json(serde_json::json!({ "status": "shutting down" }))
}

/// Template descriptors are opaque here: external tooling seeds them under
/// `template/` keys and the daemon just relays.
pub async fn templates<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
) -> Result<Json<Vec<TemplateEntry>>, ApiError> {
    let mut templates = Vec::new();
    for (_, bytes) in app.store.list_prefix("template/") {
        let entry: TemplateEntry = outpost_storage::codec::decode(&bytes)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        templates.push(entry);
    }
    Ok(Json(templates))
}
