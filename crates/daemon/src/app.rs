// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The assembled daemon.
//!
//! Everything that used to be a process-wide singleton in older designs is
//! a field here: the `App` is built once at startup, passed explicitly, and
//! torn down by cancelling its shutdown token.

use crate::config::Config;
use crate::credentials::{CredentialSource, StaticKeySource};
use crate::engine::Engine;
use crate::idle::executor::ActionExecutor;
use crate::idle::policy::PolicyEvaluator;
use crate::idle::sampler::Sampler;
use crate::idle::SampleStore;
use crate::proxy::ConnectionTracker;
use crate::registry::Registry;
use crate::volumes::VolumeManager;
use outpost_core::Clock;
use outpost_provider::{CloudProvider, RemoteShell};
use outpost_storage::StateStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Interval for the provider state watcher.
const WATCHER_INTERVAL: Duration = Duration::from_secs(5);

pub struct App<C: Clock> {
    pub config: Config,
    pub clock: C,
    pub provider: Arc<dyn CloudProvider>,
    pub store: Arc<StateStore>,
    pub registry: Arc<Registry<C>>,
    pub volumes: Arc<VolumeManager<C>>,
    pub tracker: Arc<ConnectionTracker>,
    pub engine: Arc<Engine<C>>,
    pub samples: Arc<SampleStore>,
    pub evaluator: Arc<PolicyEvaluator<C>>,
    pub executor: Arc<ActionExecutor<C>>,
    pub sampler: Arc<Sampler<C>>,
    pub credentials: Arc<dyn CredentialSource>,
    pub shell: Arc<dyn RemoteShell>,
    pub started_at: Instant,
    /// Cancelled to begin graceful shutdown (API `POST /shutdown`, SIGTERM).
    pub shutdown: CancellationToken,
}

impl<C: Clock + 'static> App<C> {
    pub fn new(
        config: Config,
        store: Arc<StateStore>,
        provider: Arc<dyn CloudProvider>,
        shell: Arc<dyn RemoteShell>,
        clock: C,
    ) -> Arc<Self> {
        let registry = Arc::new(Registry::new(store.clone(), clock.clone()));
        let volumes = Arc::new(VolumeManager::new(
            store.clone(),
            provider.clone(),
            registry.clone(),
            clock.clone(),
        ));
        let tracker = Arc::new(ConnectionTracker::new());
        let engine = Arc::new(Engine::new(
            registry.clone(),
            store.clone(),
            provider.clone(),
            volumes.clone(),
            tracker.clone(),
            clock.clone(),
        ));

        let wake = Arc::new(Notify::new());
        let evaluator = Arc::new(PolicyEvaluator::new(store.clone(), clock.clone(), wake.clone()));
        let executor = Arc::new(ActionExecutor::new(
            evaluator.actions().clone(),
            engine.clone(),
            clock.clone(),
            config.dry_run,
            wake,
        ));

        let credentials: Arc<dyn CredentialSource> =
            Arc::new(StaticKeySource::new(config.ssh_key.clone()));
        let samples = Arc::new(SampleStore::default());
        let sampler = Arc::new(Sampler::new(
            registry.clone(),
            shell.clone(),
            credentials.clone(),
            samples.clone(),
            evaluator.clone(),
            clock.clone(),
            config.sampler,
        ));

        Arc::new(Self {
            config,
            clock,
            provider,
            store,
            registry,
            volumes,
            tracker,
            engine,
            samples,
            evaluator,
            executor,
            sampler,
            credentials,
            shell,
            started_at: Instant::now(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Spawn the background loops: sampler, action executor, state watcher.
    pub fn spawn_background(self: &Arc<Self>) {
        let cancel = self.shutdown.child_token();
        tokio::spawn(self.sampler.clone().run(cancel.clone()));
        tokio::spawn(self.executor.clone().run(cancel.clone()));
        tokio::spawn(self.engine.clone().run_watcher(WATCHER_INTERVAL, cancel));
    }

    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
