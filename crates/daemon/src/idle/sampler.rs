// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The idle sampler: one cooperative scheduler, a bounded worker pool.
//!
//! Every `sampling_interval` the scheduler emits a token per running
//! workspace; workers take tokens, run the probe over SSH with a hard
//! timeout, and insert the result into the ring. A workspace with a probe
//! still in flight is skipped, which also keeps per-workspace samples
//! strictly ordered.

use crate::config::SamplerSettings;
use crate::credentials::{endpoint_for, CredentialSource};
use crate::idle::policy::PolicyEvaluator;
use crate::idle::probe;
use crate::idle::SampleStore;
use crate::registry::Registry;
use outpost_core::{Clock, IdleSample, ProbeOutcome, WorkspaceState};
use outpost_provider::RemoteShell;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub struct Sampler<C: Clock> {
    registry: Arc<Registry<C>>,
    shell: Arc<dyn RemoteShell>,
    credentials: Arc<dyn CredentialSource>,
    samples: Arc<SampleStore>,
    evaluator: Arc<PolicyEvaluator<C>>,
    clock: C,
    settings: Mutex<SamplerSettings>,
    enabled: AtomicBool,
    in_flight: Mutex<HashSet<String>>,
}

impl<C: Clock + 'static> Sampler<C> {
    pub fn new(
        registry: Arc<Registry<C>>,
        shell: Arc<dyn RemoteShell>,
        credentials: Arc<dyn CredentialSource>,
        samples: Arc<SampleStore>,
        evaluator: Arc<PolicyEvaluator<C>>,
        clock: C,
        settings: SamplerSettings,
    ) -> Self {
        Self {
            registry,
            shell,
            credentials,
            samples,
            evaluator,
            clock,
            settings: Mutex::new(settings),
            enabled: AtomicBool::new(true),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        tracing::info!(enabled, "idle sampling toggled");
    }

    pub fn samples(&self) -> &Arc<SampleStore> {
        &self.samples
    }

    pub fn settings(&self) -> SamplerSettings {
        *self.settings.lock()
    }

    /// Apply reloaded settings (SIGHUP). The interval and probe timeout take
    /// effect on the next tick; resizing the worker pool needs a restart.
    pub fn apply_settings(&self, settings: SamplerSettings) {
        let mut current = self.settings.lock();
        if settings.worker_count != current.worker_count {
            tracing::warn!(
                "sampler worker count change ({} -> {}) requires a restart",
                current.worker_count,
                settings.worker_count
            );
        }
        tracing::info!(
            interval_secs = settings.interval.as_secs(),
            "sampler settings reloaded"
        );
        let worker_count = current.worker_count;
        *current = SamplerSettings { worker_count, ..settings };
    }

    /// Run scheduler and worker pool until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let worker_count = self.settings().worker_count;
        let (token_tx, token_rx) = mpsc::channel::<String>(worker_count * 2);
        let token_rx = Arc::new(tokio::sync::Mutex::new(token_rx));

        for worker in 0..worker_count {
            let sampler = self.clone();
            let rx = token_rx.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    let token = {
                        let mut rx = rx.lock().await;
                        tokio::select! {
                            _ = cancel.cancelled() => return,
                            token = rx.recv() => token,
                        }
                    };
                    match token {
                        Some(name) => sampler.sample_one(&name).await,
                        None => return,
                    }
                }
            });
            tracing::debug!(worker, "sampler worker started");
        }

        loop {
            let interval = self.settings().interval;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            if !self.is_enabled() {
                continue;
            }

            let running = match self.registry.list(Some(WorkspaceState::Running)) {
                Ok(list) => list,
                Err(e) => {
                    tracing::error!(error = %e, "sampler could not list workspaces");
                    continue;
                }
            };
            for ws in running {
                // Skip workspaces whose previous probe is still in flight;
                // this also keeps per-workspace samples strictly ordered.
                if !self.in_flight.lock().insert(ws.name.clone()) {
                    continue;
                }
                if token_tx.send(ws.name).await.is_err() {
                    return;
                }
            }
        }
    }

    /// Probe one workspace and feed the result through policy evaluation.
    /// Public for tests and the startup resume path.
    pub async fn sample_one(&self, name: &str) {
        let result = self.sample_inner(name).await;
        self.in_flight.lock().remove(name);
        if let Err(e) = result {
            tracing::warn!(workspace = name, error = %e, "policy evaluation failed");
        }
    }

    async fn sample_inner(&self, name: &str) -> Result<(), crate::idle::policy::PolicyError> {
        let Ok(workspace) = self.registry.get(name) else {
            return Ok(()); // deleted between tick and probe
        };
        if !workspace.state.is_sampled() {
            self.samples.clear(name);
            return Ok(());
        }

        let taken_at = self.clock.epoch_ms();
        let timeout = self.settings().probe_timeout;

        let sample = match endpoint_for(&workspace, self.credentials.as_ref()) {
            None => IdleSample::failed(name, taken_at, ProbeOutcome::Unreachable),
            Some(endpoint) => {
                match tokio::time::timeout(
                    timeout,
                    self.shell.exec(&endpoint, probe::PROBE_SCRIPT),
                )
                .await
                {
                    Err(_) => {
                        tracing::debug!(workspace = name, "probe timed out");
                        IdleSample::failed(name, taken_at, ProbeOutcome::Timeout)
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(workspace = name, error = %e, "probe unreachable");
                        IdleSample::failed(name, taken_at, ProbeOutcome::Unreachable)
                    }
                    Ok(Ok(output)) => probe::parse_output(name, taken_at, &output.stdout),
                }
            }
        };

        let inserted = self.samples.insert(sample, workspace.last_transition_at_ms);
        if inserted {
            if let Some(window) = self.samples.window(name) {
                self.evaluator.on_sample(&workspace, &window)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
