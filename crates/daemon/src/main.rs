// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! outpostd: the Outpost workstation control-plane daemon.

use clap::Parser;
use outpost_daemon::config::{Config, Flags};
use outpost_daemon::http;
use outpost_daemon::lifecycle::{self, EXIT_OK, EXIT_STARTUP};
use outpost_provider::{CloudProvider, RemoteShell, Ssh2Shell, UnconfiguredProvider};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

fn main() -> ExitCode {
    let flags = Flags::parse();
    let config = match Config::from_flags(flags) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("outpostd: {e}");
            return ExitCode::from(EXIT_STARTUP as u8);
        }
    };

    if let Err(e) = std::fs::create_dir_all(config.log_dir()) {
        eprintln!("outpostd: could not create log directory: {e}");
        return ExitCode::from(EXIT_STARTUP as u8);
    }
    let file_appender = tracing_appender::rolling::daily(config.log_dir(), "outpostd.log");
    let (writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build the async runtime");
            return ExitCode::from(EXIT_STARTUP as u8);
        }
    };

    let code = runtime.block_on(run(config));
    ExitCode::from(code as u8)
}

async fn run(config: Config) -> i32 {
    // Concrete SDK adapters are wired in by the embedding build; the stock
    // binary carries the SSH transport and an unconfigured cloud port.
    let provider: Arc<dyn CloudProvider> = Arc::new(UnconfiguredProvider);
    let shell: Arc<dyn RemoteShell> = Arc::new(Ssh2Shell::default());

    let started = match lifecycle::startup(config, provider, shell).await {
        Ok(started) => started,
        Err(e) => {
            error!(error = %e, "startup failed");
            eprintln!("outpostd: {e}");
            return e.exit_code();
        }
    };
    let lifecycle::StartupResult { app, listener, report, lock: _lock } = started;
    info!(
        workspaces = report.workspaces,
        orphaned_actions = report.orphaned_actions,
        "daemon ready"
    );

    app.spawn_background();
    spawn_signal_handler(app.clone());

    let router = http::router(app.clone());
    let shutdown = app.shutdown.clone();
    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
    {
        error!(error = %e, "http server failed");
        return EXIT_STARTUP;
    }

    lifecycle::shutdown(app.as_ref());
    EXIT_OK
}

/// SIGTERM / ctrl-c begin graceful shutdown; SIGHUP reloads the sampler
/// portion of the configuration.
fn spawn_signal_handler(app: Arc<outpost_daemon::App<outpost_core::SystemClock>>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "could not install SIGHUP handler");
                return;
            }
        };
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "could not install SIGTERM handler");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = hangup.recv() => {
                    match app.config.reload_sampler() {
                        Ok(settings) => app.sampler.apply_settings(settings),
                        Err(e) => error!(error = %e, "sampler reload rejected"),
                    }
                }
                _ = terminate.recv() => {
                    info!("SIGTERM received");
                    app.shutdown.cancel();
                    return;
                }
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        info!("interrupt received");
                    }
                    app.shutdown.cancel();
                    return;
                }
            }
        }
    });
}
