// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idle subsystem endpoints: sampler toggle, policies, history, actions.

use super::ApiError;
use crate::app::App;
use crate::protocol::{
    ExecuteActionsBody, ExecuteActionsResult, HistoryPage, IdleStatusBody, PageQuery,
};
use axum::extract::{Path, Query, State};
use axum::Json;
use outpost_core::{ActionStatus, Clock, IdlePolicy, PendingAction};
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_PER_PAGE: usize = 50;

pub async fn status<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
) -> Json<IdleStatusBody> {
    let settings = app.sampler.settings();
    Json(IdleStatusBody {
        enabled: app.sampler.is_enabled(),
        last_sample_at_ms: app.samples.last_sample_at_ms(),
        sampled_workspaces: app.samples.workspace_count(),
        worker_count: settings.worker_count,
        interval_secs: settings.interval.as_secs(),
    })
}

pub async fn enable<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
) -> Json<serde_json::Value> {
    app.sampler.set_enabled(true);
    Json(serde_json::json!({ "enabled": true }))
}

pub async fn disable<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
) -> Json<serde_json::Value> {
    app.sampler.set_enabled(false);
    Json(serde_json::json!({ "enabled": false }))
}

pub async fn profiles<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
) -> Result<Json<Vec<IdlePolicy>>, ApiError> {
    Ok(Json(app.evaluator.policies()?))
}

pub async fn history<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<HistoryPage>, ApiError> {
    let page = query.page.unwrap_or(0);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, 500);
    let (entries, total) = app.evaluator.actions().history_page(page, per_page)?;
    Ok(Json(HistoryPage { entries, page, per_page, total }))
}

pub async fn pending_actions<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
) -> Result<Json<Vec<PendingAction>>, ApiError> {
    Ok(Json(app.evaluator.actions().list()?))
}

/// Cancel one queued action. Executing actions are past the fence and can
/// no longer be cancelled.
pub async fn cancel_action<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PendingAction>, ApiError> {
    let (action, version) = app.evaluator.actions().get(id)?;
    if action.status != ActionStatus::Queued {
        return Err(ApiError::conflict(format!(
            "action is {}; only queued actions can be cancelled",
            action.status
        )));
    }
    let cancelled = app
        .evaluator
        .actions()
        .cancel(&action, version, "cancelled by operator", app.clock.epoch_ms())?;
    if !cancelled {
        return Err(ApiError::conflict("action was claimed by the executor; re-read"));
    }
    let (updated, _) = app.evaluator.actions().get(id)?;
    Ok(Json(updated))
}

/// Flush all due actions now. `force` executes even when the daemon is in
/// dry-run mode.
pub async fn execute_actions<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    body: Option<Json<ExecuteActionsBody>>,
) -> Result<Json<ExecuteActionsResult>, ApiError> {
    let force = body.map(|Json(b)| b.force).unwrap_or(false);
    let report = app.executor.execute_due(force).await?;
    Ok(Json(ExecuteActionsResult {
        executed: report.executed,
        failed: report.failed,
        requeued: report.requeued,
    }))
}
