// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup: lock → store → reconcile → bind.
//!
//! The lock is taken first so two daemons never race on the store; the
//! listener binds last so the port only answers once state is consistent.

use super::{reconcile, LifecycleError, ReconcileReport};
use crate::app::App;
use crate::config::Config;
use fs2::FileExt;
use outpost_core::SystemClock;
use outpost_provider::{CloudProvider, RemoteShell};
use outpost_storage::StateStore;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Holds the exclusive daemon lock; released on drop.
pub struct LockGuard {
    #[allow(dead_code)]
    file: File,
}

pub struct StartupResult {
    pub app: Arc<App<SystemClock>>,
    pub listener: TcpListener,
    pub report: ReconcileReport,
    pub lock: LockGuard,
}

/// Start the daemon: acquire the lockfile, open and reconcile the store,
/// then bind the API port.
pub async fn startup(
    config: Config,
    provider: Arc<dyn CloudProvider>,
    shell: Arc<dyn RemoteShell>,
) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // 1. Exclusive lock before anything touches the store. Open without
    //    truncating so a losing candidate doesn't wipe the winner's PID.
    let lock_path = config.lock_path();
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| LifecycleError::LockFailed(lock_path.clone()))?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 2. Open the store; corruption or a schema downgrade aborts here.
    let store = Arc::new(StateStore::open(&config.store_dir())?);

    // 3. Assemble the application and reconcile persisted state.
    let port = config.port;
    let app = App::new(config, store, provider, shell, SystemClock);
    let report = reconcile(&app.store, &app.evaluator, &app.engine, &app.clock).await?;

    // 4. Bind last, once state is consistent.
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| LifecycleError::BindFailed(port, e))?;
    info!(port, "daemon listening");

    Ok(StartupResult { app, listener, report, lock: LockGuard { file: lock_file } })
}

/// Graceful shutdown: compact the store and remove the pid file.
pub fn shutdown<C: outpost_core::Clock>(app: &App<C>) {
    info!("shutting down");
    if let Err(e) = app.store.compact() {
        tracing::warn!(error = %e, "final snapshot failed");
    }
    let lock_path = app.config.lock_path();
    if lock_path.exists() {
        if let Err(e) = std::fs::remove_file(&lock_path) {
            tracing::warn!(error = %e, "failed to remove pid file");
        }
    }
    info!("shutdown complete");
}
