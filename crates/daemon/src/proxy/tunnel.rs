// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local-port forwarding into workspace services.
//!
//! The daemon binds an ephemeral local port; each accepted connection is
//! piped through the remote shell port to the named in-workspace service.
//! Multiple tunnels per workspace coexist on distinct local ports.

use crate::proxy::ConnectionTracker;
use outpost_core::{ConnectionId, ConnectionKind};
use outpost_provider::{RemoteShell, ShellEndpoint, ShellError, TunnelStream};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("could not bind a local port: {0}")]
    Bind(std::io::Error),

    #[error(transparent)]
    Shell(#[from] ShellError),
}

/// A live web tunnel.
pub struct Tunnel {
    pub connection_id: ConnectionId,
    pub local_port: u16,
    pub url: String,
}

/// Open a tunnel to `service_port` on the workspace, returning the local
/// URL. `auth_token`, when captured, is embedded as a query parameter the
/// way notebook front-ends expect.
pub async fn open(
    shell: Arc<dyn RemoteShell>,
    endpoint: ShellEndpoint,
    workspace: &str,
    service_port: u16,
    auth_token: Option<String>,
    tracker: &ConnectionTracker,
    opened_at_ms: u64,
) -> Result<Tunnel, TunnelError> {
    // Probe once so a dead service fails the request instead of the first
    // browser connection.
    let mut probe = shell.open_tunnel(&endpoint, "127.0.0.1", service_port).await?;
    probe.close().await;

    let listener = TcpListener::bind(("127.0.0.1", 0)).await.map_err(TunnelError::Bind)?;
    let local_port = listener.local_addr().map_err(TunnelError::Bind)?.port();

    let (connection_id, cancel) =
        tracker.register(ConnectionKind::WebTunnel, workspace, opened_at_ms);
    tracker.set_metadata(
        connection_id,
        serde_json::json!({ "localPort": local_port, "servicePort": service_port }),
    );

    let url = match &auth_token {
        Some(token) => format!("http://127.0.0.1:{local_port}/?token={token}"),
        None => format!("http://127.0.0.1:{local_port}/"),
    };

    tokio::spawn(accept_loop(listener, shell, endpoint, service_port, cancel));

    Ok(Tunnel { connection_id, local_port, url })
}

async fn accept_loop(
    listener: TcpListener,
    shell: Arc<dyn RemoteShell>,
    endpoint: ShellEndpoint,
    service_port: u16,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "tunnel accept failed");
                        continue;
                    }
                };
                tracing::debug!(%peer, service_port, "tunnel connection");
                let remote = match shell.open_tunnel(&endpoint, "127.0.0.1", service_port).await {
                    Ok(remote) => remote,
                    Err(e) => {
                        tracing::warn!(error = %e, "tunnel channel open failed");
                        continue;
                    }
                };
                tokio::spawn(pump(stream, remote, cancel.clone()));
            }
        }
    }
}

/// Copy bytes both ways until either side closes or the session is swept.
async fn pump(
    mut local: tokio::net::TcpStream,
    mut remote: Box<dyn TunnelStream>,
    cancel: CancellationToken,
) {
    let mut local_buf = vec![0u8; 16 * 1024];
    let mut remote_buf = vec![0u8; 16 * 1024];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            read = local.read(&mut local_buf) => {
                match read {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if remote.write(&local_buf[..n]).await.is_err() {
                            break;
                        }
                    }
                }
            }

            read = remote.read(&mut remote_buf) => {
                match read {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if local.write_all(&remote_buf[..n]).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    remote.close().await;
    let _ = local.shutdown().await;
}

#[cfg(test)]
#[path = "tunnel_tests.rs"]
mod tests;
