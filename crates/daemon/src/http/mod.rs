// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP/JSON API.
//!
//! REST over a single TCP port, rooted at `/api/v1`. The router owns an
//! `Arc<App>`; handlers are thin translations between DTOs and the
//! registry/engine/idle/proxy components.

pub mod error;
mod idle;
mod instances;
mod proxy;
mod status;
mod volumes;

pub use error::ApiError;

use crate::app::App;
use axum::routing::{delete, get, post};
use axum::Router;
use outpost_core::Clock;
use std::sync::Arc;

pub fn router<C: Clock + 'static>(app: Arc<App<C>>) -> Router {
    Router::new()
        .route("/api/v1/health", get(status::health::<C>))
        .route("/api/v1/status", get(status::status::<C>))
        .route("/api/v1/shutdown", post(status::shutdown::<C>))
        .route("/api/v1/templates", get(status::templates::<C>))
        .route(
            "/api/v1/instances",
            get(instances::list::<C>).post(instances::launch::<C>),
        )
        .route(
            "/api/v1/instances/:name",
            get(instances::detail::<C>).delete(instances::terminate::<C>),
        )
        .route("/api/v1/instances/:name/start", post(instances::start::<C>))
        .route("/api/v1/instances/:name/stop", post(instances::stop::<C>))
        .route("/api/v1/instances/:name/hibernate", post(instances::hibernate::<C>))
        .route("/api/v1/instances/:name/resume", post(instances::resume::<C>))
        .route(
            "/api/v1/volumes",
            get(volumes::list_shared::<C>).post(volumes::create_shared::<C>),
        )
        .route(
            "/api/v1/volumes/:name",
            get(volumes::get_shared::<C>).delete(volumes::delete_shared::<C>),
        )
        .route("/api/v1/volumes/:name/mount", post(volumes::mount_shared::<C>))
        .route("/api/v1/volumes/:name/unmount", post(volumes::unmount_shared::<C>))
        .route(
            "/api/v1/storage",
            get(volumes::list_block::<C>).post(volumes::create_block::<C>),
        )
        .route(
            "/api/v1/storage/:name",
            get(volumes::get_block::<C>).delete(volumes::delete_block::<C>),
        )
        .route("/api/v1/storage/:name/attach", post(volumes::attach_block::<C>))
        .route("/api/v1/storage/:name/detach", post(volumes::detach_block::<C>))
        .route("/api/v1/idle/status", get(idle::status::<C>))
        .route("/api/v1/idle/enable", post(idle::enable::<C>))
        .route("/api/v1/idle/disable", post(idle::disable::<C>))
        .route("/api/v1/idle/profiles", get(idle::profiles::<C>))
        .route("/api/v1/idle/history", get(idle::history::<C>))
        .route("/api/v1/idle/pending-actions", get(idle::pending_actions::<C>))
        .route("/api/v1/idle/pending-actions/:id", delete(idle::cancel_action::<C>))
        .route("/api/v1/idle/execute-actions", post(idle::execute_actions::<C>))
        .route("/api/v1/connections", get(proxy::connections::<C>))
        .route("/api/v1/terminal", get(proxy::terminal::<C>))
        .route("/api/v1/web-proxy/:instance", get(proxy::web_proxy::<C>))
        .route("/api/v1/aws-proxy/:service", get(proxy::aws_proxy::<C>))
        .layer(axum::middleware::from_fn(error::catch_panics))
        .with_state(app)
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
