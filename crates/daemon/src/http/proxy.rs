// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy endpoints: terminal WebSocket upgrade, web tunnels, federated
//! cloud-service sessions.

use super::ApiError;
use crate::app::App;
use crate::credentials::endpoint_for;
use crate::protocol::{CloudSessionBody, TunnelBody};
use crate::proxy::{cloud, terminal, tunnel};
use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use outpost_core::{Clock, Connection, ConnectionKind, ServiceKind, Workspace, WorkspaceState};
use outpost_provider::ShellEndpoint;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct TerminalQuery {
    pub instance: String,
}

#[derive(Debug, Deserialize)]
pub struct WebProxyQuery {
    /// Service name from the workspace's exposed services.
    #[serde(default)]
    pub service: Option<String>,
    /// Explicit port when the service isn't registered.
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct AwsProxyQuery {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub duration: Option<u64>,
}

pub async fn connections<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
) -> Json<Vec<Connection>> {
    Json(app.tracker.list())
}

/// Resolve a running workspace into an SSH endpoint.
fn reachable_endpoint<C: Clock>(
    app: &App<C>,
    name: &str,
) -> Result<(Workspace, ShellEndpoint), ApiError> {
    let workspace = app.registry.get(name)?;
    if workspace.state != WorkspaceState::Running {
        return Err(ApiError::conflict(format!(
            "workspace {name} is {}; sessions need a running workspace",
            workspace.state
        )));
    }
    let endpoint = endpoint_for(&workspace, app.credentials.as_ref())
        .ok_or_else(|| ApiError::conflict(format!("workspace {name} has no address yet")))?;
    Ok((workspace, endpoint))
}

/// `GET /terminal?instance=<name>` — upgrade to a bidirectional shell.
pub async fn terminal<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Query(query): Query<TerminalQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let (workspace, endpoint) = reachable_endpoint(&app, &query.instance)?;
    let opened_at = app.clock.epoch_ms();

    Ok(ws.on_upgrade(move |mut socket| async move {
        match app
            .shell
            .open_pty(&endpoint, terminal::DEFAULT_ROWS, terminal::DEFAULT_COLS)
            .await
        {
            Ok(pty) => {
                let (id, cancel) =
                    app.tracker.register(ConnectionKind::Terminal, &workspace.name, opened_at);
                terminal::bridge(socket, pty, cancel).await;
                app.tracker.close(id);
            }
            Err(e) => {
                // Session failures emit a status frame; lifecycle state is
                // never affected.
                tracing::warn!(workspace = %workspace.name, error = %e, "terminal open failed");
                let status =
                    serde_json::json!({ "type": "error", "message": e.to_string() }).to_string();
                let _ = socket.send(Message::Text(status)).await;
                let _ = socket.send(Message::Close(None)).await;
            }
        }
    }))
}

/// `GET /web-proxy/{instance}` — allocate a local tunnel to an in-workspace
/// web service and return its URL.
pub async fn web_proxy<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Path(instance): Path<String>,
    Query(query): Query<WebProxyQuery>,
) -> Result<Json<TunnelBody>, ApiError> {
    let (workspace, endpoint) = reachable_endpoint(&app, &instance)?;

    let (service_name, port) = match (&query.service, query.port) {
        (_, Some(port)) => (None, port),
        (Some(name), None) => {
            let service = workspace
                .services
                .iter()
                .find(|s| &s.name == name)
                .ok_or_else(|| ApiError::not_found(format!("service not found: {name}")))?;
            (Some(service.name.clone()), service.port)
        }
        (None, None) => {
            let service = workspace
                .services
                .iter()
                .find(|s| s.kind == ServiceKind::Web)
                .ok_or_else(|| {
                    ApiError::bad_request(format!(
                        "workspace {instance} exposes no web service; pass ?port="
                    ))
                })?;
            (Some(service.name.clone()), service.port)
        }
    };

    // Web services often mint a login token; ask the workspace for one and
    // carry it in the URL when present.
    let auth_token = match &service_name {
        Some(name) => {
            match app
                .shell
                .exec(&endpoint, &format!("outpost-service-token {name}"))
                .await
            {
                Ok(out) if out.exit_code == 0 && !out.stdout.trim().is_empty() => {
                    Some(out.stdout.trim().to_string())
                }
                _ => None,
            }
        }
        None => None,
    };

    let opened = tunnel::open(
        app.shell.clone(),
        endpoint,
        &workspace.name,
        port,
        auth_token,
        &app.tracker,
        app.clock.epoch_ms(),
    )
    .await?;

    Ok(Json(TunnelBody {
        url: opened.url,
        local_port: opened.local_port,
        connection_id: opened.connection_id.to_string(),
    }))
}

/// `GET /aws-proxy/{service}?region=` — mint a federated console URL.
pub async fn aws_proxy<C: Clock + 'static>(
    State(app): State<Arc<App<C>>>,
    Path(service): Path<String>,
    Query(query): Query<AwsProxyQuery>,
) -> Result<Json<CloudSessionBody>, ApiError> {
    let region = query.region.unwrap_or_else(|| app.config.default_region.clone());
    let duration = query.duration.unwrap_or(cloud::DEFAULT_TOKEN_SECS);

    // No long-lived connection is held; the token lifetime bounds the
    // session, so nothing registers with the tracker.
    let session = cloud::open(app.provider.clone(), &service, &region, duration).await?;

    Ok(Json(CloudSessionBody {
        url: session.url,
        embedding: session.embedding.to_string(),
        expires_at_ms: session.expires_at_ms,
    }))
}
