// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared-volume and block-volume endpoints.

use super::ApiError;
use crate::app::App;
use crate::protocol::{AttachBody, VolumeBody};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use outpost_core::{BlockVolume, Clock, SharedVolume};
use std::sync::Arc;

pub async fn list_shared<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
) -> Result<Json<Vec<SharedVolume>>, ApiError> {
    Ok(Json(app.volumes.list_shared()?))
}

pub async fn get_shared<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Path(name): Path<String>,
) -> Result<Json<SharedVolume>, ApiError> {
    Ok(Json(app.volumes.get_shared(&name)?))
}

pub async fn create_shared<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Json(body): Json<VolumeBody>,
) -> Result<(StatusCode, Json<SharedVolume>), ApiError> {
    if body.name.is_empty() {
        return Err(ApiError::bad_request("volume name must not be empty"));
    }
    let volume = app.volumes.create_shared(&body.name, body.size_bytes).await?;
    Ok((StatusCode::CREATED, Json(volume)))
}

pub async fn delete_shared<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    app.volumes.delete_shared(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mount_shared<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Path(name): Path<String>,
    Json(body): Json<AttachBody>,
) -> Result<Json<SharedVolume>, ApiError> {
    Ok(Json(app.volumes.mount_shared(&name, &body.instance)?))
}

pub async fn unmount_shared<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Path(name): Path<String>,
    Json(body): Json<AttachBody>,
) -> Result<Json<SharedVolume>, ApiError> {
    Ok(Json(app.volumes.unmount_shared(&name, &body.instance)?))
}

pub async fn list_block<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
) -> Result<Json<Vec<BlockVolume>>, ApiError> {
    Ok(Json(app.volumes.list_block()?))
}

pub async fn get_block<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Path(name): Path<String>,
) -> Result<Json<BlockVolume>, ApiError> {
    Ok(Json(app.volumes.get_block(&name)?))
}

pub async fn create_block<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Json(body): Json<VolumeBody>,
) -> Result<(StatusCode, Json<BlockVolume>), ApiError> {
    if body.name.is_empty() {
        return Err(ApiError::bad_request("volume name must not be empty"));
    }
    let volume = app.volumes.create_block(&body.name, body.size_bytes).await?;
    Ok((StatusCode::CREATED, Json(volume)))
}

pub async fn delete_block<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    app.volumes.delete_block(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn attach_block<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Path(name): Path<String>,
    Json(body): Json<AttachBody>,
) -> Result<Json<BlockVolume>, ApiError> {
    Ok(Json(app.volumes.attach_block(&name, &body.instance).await?))
}

pub async fn detach_block<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Path(name): Path<String>,
) -> Result<Json<BlockVolume>, ApiError> {
    Ok(Json(app.volumes.detach_block(&name).await?))
}
