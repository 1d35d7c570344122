// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transition handlers.
//!
//! Each user-facing operation validates the current state under the
//! per-workspace lock, performs the provider side effect, then records the
//! new state. The watcher loop advances the transitional states
//! (`pending`, `stopping`, `hibernating`, `resuming`, `terminating`) by
//! polling the provider.

use super::{Engine, EngineError, LaunchRequest};
use outpost_core::{Clock, IdleAction, Size, Workspace, WorkspaceState};
use outpost_provider::{with_backoff, InstanceSpec, ProviderErrorKind, RuntimeState, StopMode};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Nominal on-demand rate per size tier, used for cost attribution.
fn rate_for(size: Size) -> f64 {
    match size {
        Size::Xs => 0.05,
        Size::S => 0.10,
        Size::M => 0.25,
        Size::L => 0.50,
        Size::Xl => 1.00,
    }
}

impl<C: Clock> Engine<C> {
    /// Launch a new workspace. The record is created in `pending` before the
    /// provider call so the name is reserved atomically.
    pub async fn launch(&self, req: LaunchRequest) -> Result<Workspace, EngineError> {
        let now = self.now_ms();
        let workspace = Workspace {
            name: req.name.clone(),
            provider_id: String::new(),
            profile: req.profile,
            template: req.template.clone(),
            size: req.size,
            region: req.region.clone(),
            architecture: Default::default(),
            public_address: None,
            private_address: None,
            ssh_port: 22,
            username: "ubuntu".to_string(),
            created_at_ms: now,
            last_transition_at_ms: now,
            state: WorkspaceState::Pending,
            hourly_rate: rate_for(req.size),
            accumulated_cost: 0.0,
            last_cost_sample_at_ms: now,
            shared_volumes: Vec::new(),
            block_volumes: Vec::new(),
            services: Vec::new(),
        };
        self.registry.create(&workspace)?;
        self.record_transition(&req.name, None, WorkspaceState::Pending, "launch");

        let spec = InstanceSpec {
            name: req.name.clone(),
            template: req.template,
            size: req.size,
            region: req.region,
            architecture: workspace.architecture,
            hibernation: req.hibernation,
        };
        let provider = self.provider.clone();
        match with_backoff(self.backoff, "launch_instance", || provider.launch_instance(&spec))
            .await
        {
            Ok(launched) => {
                let updated = self.registry.update_with(&req.name, None, |ws| {
                    ws.provider_id = launched.provider_id.clone();
                    ws.public_address = launched.public_address.clone();
                    ws.private_address = launched.private_address.clone();
                    Ok(())
                })?;
                Ok(updated)
            }
            Err(e) => {
                tracing::error!(workspace = %req.name, error = %e, "launch failed");
                self.set_state(&req.name, WorkspaceState::Failed, &format!("launch: {e}"))?;
                Err(e.into())
            }
        }
    }

    /// Start a stopped workspace, or resume a hibernated one. Idempotent on
    /// an already-running workspace.
    pub async fn start(&self, name: &str) -> Result<Workspace, EngineError> {
        let _guard = self.lock(name).await;
        let ws = self.registry.get(name)?;
        match ws.state {
            WorkspaceState::Running => return Ok(ws),
            WorkspaceState::Stopped | WorkspaceState::Hibernated => {}
            from => {
                return Err(EngineError::InvalidTransition {
                    workspace: name.to_string(),
                    from,
                    requested: "start",
                })
            }
        }

        let provider = self.provider.clone();
        let id = ws.provider_id.clone();
        match with_backoff(self.backoff, "start_instance", || provider.start_instance(&id)).await {
            Ok(()) => self.set_state(name, WorkspaceState::Resuming, "start requested"),
            Err(e) if e.kind == ProviderErrorKind::CapacityUnavailable => {
                // Surface to the caller; the workspace stays where it was
                // and is not auto-retried.
                tracing::warn!(workspace = name, "no capacity to start");
                Err(e.into())
            }
            Err(e) if Self::is_auth_failure(&e) => {
                self.set_state(name, WorkspaceState::Failed, &format!("start: {e}"))?;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stop a running workspace. Repeated stops of an already-stopped
    /// workspace succeed without touching the provider.
    pub async fn stop(&self, name: &str) -> Result<Workspace, EngineError> {
        let _guard = self.lock(name).await;
        let ws = self.registry.get(name)?;
        match ws.state {
            WorkspaceState::Stopped | WorkspaceState::Stopping => return Ok(ws),
            WorkspaceState::Running => {}
            from => {
                return Err(EngineError::InvalidTransition {
                    workspace: name.to_string(),
                    from,
                    requested: "stop",
                })
            }
        }

        let provider = self.provider.clone();
        let id = ws.provider_id.clone();
        match with_backoff(self.backoff, "stop_instance", || {
            provider.stop_instance(&id, StopMode::Stop)
        })
        .await
        {
            Ok(()) => self.set_state(name, WorkspaceState::Stopping, "stop requested"),
            Err(e) if Self::is_auth_failure(&e) => {
                self.set_state(name, WorkspaceState::Failed, &format!("stop: {e}"))?;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Hibernate a running workspace (provider-side suspend with preserved
    /// memory).
    pub async fn hibernate(&self, name: &str) -> Result<Workspace, EngineError> {
        let _guard = self.lock(name).await;
        let ws = self.registry.get(name)?;
        match ws.state {
            WorkspaceState::Hibernated | WorkspaceState::Hibernating => return Ok(ws),
            WorkspaceState::Running => {}
            from => {
                return Err(EngineError::InvalidTransition {
                    workspace: name.to_string(),
                    from,
                    requested: "hibernate",
                })
            }
        }

        let provider = self.provider.clone();
        let id = ws.provider_id.clone();
        match with_backoff(self.backoff, "stop_instance", || {
            provider.stop_instance(&id, StopMode::Hibernate)
        })
        .await
        {
            Ok(()) => self.set_state(name, WorkspaceState::Hibernating, "hibernate requested"),
            Err(e) if Self::is_auth_failure(&e) => {
                self.set_state(name, WorkspaceState::Failed, &format!("hibernate: {e}"))?;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Terminate a workspace from any non-terminal state.
    pub async fn terminate(&self, name: &str) -> Result<Workspace, EngineError> {
        let _guard = self.lock(name).await;
        let ws = self.registry.get(name)?;
        if ws.state == WorkspaceState::Terminated || ws.state == WorkspaceState::Terminating {
            return Ok(ws);
        }

        // A launch that never got a provider id has nothing to tear down.
        if ws.provider_id.is_empty() {
            self.set_state(name, WorkspaceState::Terminating, "terminate requested")?;
            return self.finalize_termination(name).await;
        }

        let provider = self.provider.clone();
        let id = ws.provider_id.clone();
        match with_backoff(self.backoff, "terminate_instance", || {
            provider.terminate_instance(&id)
        })
        .await
        {
            Ok(()) => self.set_state(name, WorkspaceState::Terminating, "terminate requested"),
            Err(e) if e.kind == ProviderErrorKind::NotFound => {
                // Instance already gone provider-side.
                self.set_state(name, WorkspaceState::Terminating, "terminate requested")?;
                self.finalize_termination(name).await
            }
            Err(e) if Self::is_auth_failure(&e) => {
                self.set_state(name, WorkspaceState::Failed, &format!("terminate: {e}"))?;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply a policy-recommended action. `Notify` is a no-op at this layer;
    /// the executor records it in history.
    pub async fn apply_idle_action(
        &self,
        name: &str,
        action: IdleAction,
    ) -> Result<Workspace, EngineError> {
        match action {
            IdleAction::Stop => self.stop(name).await,
            IdleAction::Hibernate => self.hibernate(name).await,
            IdleAction::Terminate => self.terminate(name).await,
            IdleAction::Notify => Ok(self.registry.get(name)?),
        }
    }

    /// One provider poll for one workspace: advance transitional states,
    /// detect out-of-band changes, fail timed-out launches.
    pub async fn sync_with_provider(&self, name: &str) -> Result<(), EngineError> {
        let _guard = self.lock(name).await;
        let ws = self.registry.get(name)?;
        if ws.state.is_terminal() {
            return Ok(());
        }

        let now = self.now_ms();
        if ws.state == WorkspaceState::Pending && ws.provider_id.is_empty() {
            if now.saturating_sub(ws.created_at_ms) > self.pending_timeout.as_millis() as u64 {
                self.set_state(name, WorkspaceState::Failed, "launch timed out")?;
            }
            return Ok(());
        }

        let runtime = match self.provider.describe_instance(&ws.provider_id).await {
            Ok(state) => state,
            Err(e) if Self::is_auth_failure(&e) => {
                self.set_state(name, WorkspaceState::Failed, &format!("describe: {e}"))?;
                return Err(e.into());
            }
            Err(e) => {
                // Transient visibility loss; try again next tick.
                tracing::debug!(workspace = name, error = %e, "describe failed");
                return Ok(());
            }
        };

        use WorkspaceState as W;
        match (ws.state, runtime) {
            (W::Pending | W::Resuming, RuntimeState::Running) => {
                self.set_state(name, W::Running, "provider reports reachable")?;
            }
            (W::Pending, _)
                if now.saturating_sub(ws.created_at_ms)
                    > self.pending_timeout.as_millis() as u64 =>
            {
                tracing::error!(workspace = name, "launch timed out waiting for readiness");
                self.set_state(name, W::Failed, "launch timed out")?;
            }
            (W::Stopping, RuntimeState::Stopped | RuntimeState::StoppedHibernated) => {
                self.set_state(name, W::Stopped, "provider reports stopped")?;
            }
            (W::Hibernating, RuntimeState::StoppedHibernated | RuntimeState::Stopped) => {
                self.set_state(name, W::Hibernated, "provider reports hibernated")?;
            }
            (W::Terminating, RuntimeState::Gone) => {
                self.finalize_termination(name).await?;
            }
            (W::Running, RuntimeState::Gone) => {
                self.set_state(name, W::Failed, "provider reports instance gone")?;
            }
            // Out-of-band stops (console, OS shutdown).
            (W::Running, RuntimeState::Stopped) => {
                self.set_state(name, W::Stopped, "stopped outside the daemon")?;
            }
            (W::Running, RuntimeState::StoppedHibernated) => {
                self.set_state(name, W::Hibernated, "hibernated outside the daemon")?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Detach block volumes, release shared mounts, close proxy sessions,
    /// and seal the record. Caller must hold the per-workspace lock.
    async fn finalize_termination(&self, name: &str) -> Result<Workspace, EngineError> {
        if let Err(e) = self.volumes.detach_all_for(name).await {
            tracing::warn!(workspace = name, error = %e, "volume detach during termination");
        }
        if let Err(e) = self.volumes.unmount_all_for(name) {
            tracing::warn!(workspace = name, error = %e, "shared unmount during termination");
        }
        self.proxies.close_for_workspace(name);
        self.set_state(name, WorkspaceState::Terminated, "provider reports gone")
    }

    /// Record a state change, folding running time into the cost counter.
    fn set_state(
        &self,
        name: &str,
        to: WorkspaceState,
        reason: &str,
    ) -> Result<Workspace, EngineError> {
        let now = self.now_ms();
        let mut from = None;
        let updated = self.registry.update_with(name, None, |ws| {
            ws.sample_cost(now);
            from = Some(ws.transition(to, now));
            Ok(())
        })?;
        self.record_transition(name, from, to, reason);
        Ok(updated)
    }

    /// Poll the provider for every workspace in a transitional state.
    pub async fn run_watcher(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        const TRANSITIONAL: [WorkspaceState; 5] = [
            WorkspaceState::Pending,
            WorkspaceState::Stopping,
            WorkspaceState::Hibernating,
            WorkspaceState::Resuming,
            WorkspaceState::Terminating,
        ];

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let names: Vec<String> = match self.registry.list(None) {
                Ok(all) => all
                    .into_iter()
                    .filter(|ws| TRANSITIONAL.contains(&ws.state))
                    .map(|ws| ws.name)
                    .collect(),
                Err(e) => {
                    tracing::error!(error = %e, "watcher could not list workspaces");
                    continue;
                }
            };

            for name in names {
                if let Err(e) = self.sync_with_provider(&name).await {
                    tracing::warn!(workspace = %name, error = %e, "provider sync failed");
                }
            }
        }
    }
}
