// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace CRUD and lifecycle triggers.

use super::ApiError;
use crate::app::App;
use crate::engine::LaunchRequest;
use crate::protocol::{LaunchBody, ListQuery, WorkspaceEntry};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use outpost_core::{Clock, Workspace, WorkspaceState};
use std::sync::Arc;

/// Cost including the accrual since the last persisted sample.
fn entry<C: Clock>(app: &App<C>, workspace: Workspace) -> WorkspaceEntry {
    let mut estimated = workspace.clone();
    estimated.sample_cost(app.clock.epoch_ms());
    WorkspaceEntry { estimated_cost: estimated.accumulated_cost, workspace }
}

pub async fn list<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<WorkspaceEntry>>, ApiError> {
    let workspaces = app.registry.list(query.state)?;
    Ok(Json(workspaces.into_iter().map(|ws| entry(&app, ws)).collect()))
}

pub async fn detail<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Path(name): Path<String>,
) -> Result<Json<WorkspaceEntry>, ApiError> {
    let workspace = app.registry.get(&name)?;
    Ok(Json(entry(&app, workspace)))
}

pub async fn launch<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Json(body): Json<LaunchBody>,
) -> Result<(StatusCode, Json<WorkspaceEntry>), ApiError> {
    if body.name.is_empty() {
        return Err(ApiError::bad_request("workspace name must not be empty"));
    }
    if body.template.is_empty() {
        return Err(ApiError::bad_request("template must not be empty"));
    }

    let request = LaunchRequest {
        name: body.name,
        template: body.template,
        size: body.size,
        region: body.region.unwrap_or_else(|| app.config.default_region.clone()),
        profile: body.profile.unwrap_or_else(|| "default".to_string()),
        hibernation: body.hibernation,
    };
    let workspace = app.engine.launch(request).await?;
    Ok((StatusCode::CREATED, Json(entry(&app, workspace))))
}

pub async fn start<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Path(name): Path<String>,
) -> Result<Json<WorkspaceEntry>, ApiError> {
    let workspace = app.engine.start(&name).await?;
    Ok(Json(entry(&app, workspace)))
}

/// `resume` is the hibernation-flavored start; the engine path is shared.
pub async fn resume<C: Clock + 'static>(
    state: State<Arc<App<C>>>,
    path: Path<String>,
) -> Result<Json<WorkspaceEntry>, ApiError> {
    start(state, path).await
}

pub async fn stop<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Path(name): Path<String>,
) -> Result<Json<WorkspaceEntry>, ApiError> {
    let workspace = app.engine.stop(&name).await?;
    Ok(Json(entry(&app, workspace)))
}

pub async fn hibernate<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Path(name): Path<String>,
) -> Result<Json<WorkspaceEntry>, ApiError> {
    let workspace = app.engine.hibernate(&name).await?;
    Ok(Json(entry(&app, workspace)))
}

pub async fn terminate<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Path(name): Path<String>,
) -> Result<Json<WorkspaceEntry>, ApiError> {
    let workspace = app.engine.terminate(&name).await?;
    // Sampling stops implicitly; drop the ring now rather than waiting for
    // the next scheduler pass.
    if workspace.state != WorkspaceState::Running {
        app.samples.clear(&name);
    }
    Ok(Json(entry(&app, workspace)))
}
