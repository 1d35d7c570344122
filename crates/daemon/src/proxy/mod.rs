// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy layer: terminal bridges, web tunnels, cloud-service sessions.
//!
//! Sessions are process-local; nothing here survives a daemon restart. The
//! tracker owns a cancellation token per session so workspace termination
//! can sweep everything attached to it.

pub mod cloud;
pub mod terminal;
pub mod tunnel;

use outpost_core::{Connection, ConnectionId, ConnectionKind, ConnectionStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

struct Tracked {
    connection: Connection,
    cancel: CancellationToken,
}

/// Registry of live proxy sessions.
#[derive(Default)]
pub struct ConnectionTracker {
    sessions: Mutex<HashMap<ConnectionId, Tracked>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session; the returned token is cancelled when the session
    /// is closed (individually or via a workspace sweep).
    pub fn register(
        &self,
        kind: ConnectionKind,
        target: &str,
        opened_at_ms: u64,
    ) -> (ConnectionId, CancellationToken) {
        let connection = Connection::open(kind, target, opened_at_ms);
        let id = connection.id;
        let cancel = CancellationToken::new();
        self.sessions
            .lock()
            .insert(id, Tracked { connection, cancel: cancel.clone() });
        tracing::info!(connection = %id, %kind, target, "proxy session opened");
        (id, cancel)
    }

    /// Attach kind-specific metadata (local port, token expiry...).
    pub fn set_metadata(&self, id: ConnectionId, metadata: serde_json::Value) {
        if let Some(tracked) = self.sessions.lock().get_mut(&id) {
            tracked.connection.metadata = metadata;
        }
    }

    /// Remove one session, cancelling its work.
    pub fn close(&self, id: ConnectionId) {
        if let Some(mut tracked) = self.sessions.lock().remove(&id) {
            tracked.cancel.cancel();
            tracked.connection.status = ConnectionStatus::Closed;
            tracing::info!(connection = %id, "proxy session closed");
        }
    }

    /// Cancel every session attached to a workspace (termination sweep).
    pub fn close_for_workspace(&self, workspace: &str) {
        let mut sessions = self.sessions.lock();
        let doomed: Vec<ConnectionId> = sessions
            .iter()
            .filter(|(_, t)| t.connection.target == workspace)
            .map(|(id, _)| *id)
            .collect();
        for id in doomed {
            if let Some(tracked) = sessions.remove(&id) {
                tracked.cancel.cancel();
                tracing::info!(connection = %id, workspace, "proxy session swept");
            }
        }
    }

    pub fn list(&self) -> Vec<Connection> {
        self.sessions.lock().values().map(|t| t.connection.clone()).collect()
    }

    pub fn open_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
