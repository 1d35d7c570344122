// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for daemon tests: the full component stack wired to
//! fakes, with a controllable clock.

use crate::credentials::StaticKeySource;
use crate::engine::Engine;
use crate::idle::executor::ActionExecutor;
use crate::idle::policy::PolicyEvaluator;
use crate::idle::sampler::Sampler;
use crate::idle::SampleStore;
use crate::proxy::ConnectionTracker;
use crate::registry::Registry;
use crate::volumes::VolumeManager;
use crate::config::SamplerSettings;
use outpost_core::{Clock, FakeClock, IdlePolicy, Workspace, WorkspaceState};
use outpost_provider::{FakeProvider, FakeShell};
use outpost_storage::StateStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub struct Harness {
    // Held for the lifetime of the fixture; the store lives inside it.
    _dir: tempfile::TempDir,
    pub clock: FakeClock,
    pub provider: FakeProvider,
    pub shell: FakeShell,
    pub store: Arc<StateStore>,
    pub registry: Arc<Registry<FakeClock>>,
    pub volumes: Arc<VolumeManager<FakeClock>>,
    pub tracker: Arc<ConnectionTracker>,
    pub engine: Arc<Engine<FakeClock>>,
    pub samples: Arc<SampleStore>,
    pub evaluator: Arc<PolicyEvaluator<FakeClock>>,
    pub executor: Arc<ActionExecutor<FakeClock>>,
    pub sampler: Arc<Sampler<FakeClock>>,
    pub wake: Arc<Notify>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(false)
    }

    pub fn dry_run() -> Self {
        Self::build(true)
    }

    fn build(dry_run: bool) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let clock = FakeClock::new();
        clock.set_epoch_ms(1_000_000);
        let provider = FakeProvider::ready();
        let shell = FakeShell::new();

        let store = Arc::new(StateStore::open(dir.path()).expect("store"));
        let registry = Arc::new(Registry::new(store.clone(), clock.clone()));
        let volumes = Arc::new(VolumeManager::new(
            store.clone(),
            Arc::new(provider.clone()),
            registry.clone(),
            clock.clone(),
        ));
        let tracker = Arc::new(ConnectionTracker::new());
        let engine = Arc::new(Engine::new(
            registry.clone(),
            store.clone(),
            Arc::new(provider.clone()),
            volumes.clone(),
            tracker.clone(),
            clock.clone(),
        ));

        let wake = Arc::new(Notify::new());
        let evaluator =
            Arc::new(PolicyEvaluator::new(store.clone(), clock.clone(), wake.clone()));
        let executor = Arc::new(ActionExecutor::new(
            evaluator.actions().clone(),
            engine.clone(),
            clock.clone(),
            dry_run,
            wake.clone(),
        ));

        let samples = Arc::new(SampleStore::default());
        let sampler = Arc::new(Sampler::new(
            registry.clone(),
            Arc::new(shell.clone()),
            Arc::new(StaticKeySource::new(None)),
            samples.clone(),
            evaluator.clone(),
            clock.clone(),
            SamplerSettings {
                interval: Duration::from_millis(20),
                worker_count: 2,
                probe_timeout: Duration::from_millis(200),
            },
        ));

        Self {
            _dir: dir,
            clock,
            provider,
            shell,
            store,
            registry,
            volumes,
            tracker,
            engine,
            samples,
            evaluator,
            executor,
            sampler,
            wake,
        }
    }

    /// Launch a workspace and drive it to `running` via the provider poll.
    pub async fn launch_running(&self, name: &str) -> Workspace {
        let ws = self
            .engine
            .launch(crate::engine::LaunchRequest {
                name: name.to_string(),
                template: "python-ml".to_string(),
                size: outpost_core::Size::S,
                region: "us-east-1".to_string(),
                profile: "default".to_string(),
                hibernation: true,
            })
            .await
            .expect("launch");
        assert_eq!(ws.state, WorkspaceState::Pending);
        self.engine.sync_with_provider(name).await.expect("sync");
        let ws = self.registry.get(name).expect("get");
        assert_eq!(ws.state, WorkspaceState::Running);
        ws
    }

    /// Register the standard `balanced` test policy (hibernate after a
    /// 300 s window at 90% confidence, 60 s grace).
    pub fn with_balanced_policy(&self) -> IdlePolicy {
        let policy = IdlePolicy::builder().build();
        self.evaluator.put_policy(&policy).expect("put policy");
        policy
    }

    /// Feed `count` consecutive idle samples spaced at 60 s, evaluating
    /// policy after each insert (as the sampler would).
    pub fn feed_idle_samples(&self, workspace: &Workspace, count: usize) {
        for _ in 0..count {
            self.clock.advance(Duration::from_secs(60));
            let sample =
                outpost_core::test_support::idle_sample(&workspace.name, self.clock.epoch_ms());
            assert!(self.samples.insert(sample, workspace.last_transition_at_ms));
            let window = self.samples.window(&workspace.name).expect("window");
            self.evaluator.on_sample(workspace, &window).expect("evaluate");
        }
    }
}
