// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fakes for the cloud and shell ports.
//!
//! `FakeProvider` keeps an instance table and records every call so tests can
//! assert exactly which provider operations ran. `FakeShell` replays scripted
//! exec output and exposes scriptable PTY/tunnel endpoints.

use crate::cloud::{
    CloudProvider, FederationToken, InstanceSpec, Launched, ProviderError, ProviderErrorKind,
    RuntimeState, StopMode,
};
use crate::shell::{
    ExecOutput, PtySession, RemoteShell, ShellEndpoint, ShellError, TunnelStream,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    Launch { name: String },
    Start { id: String },
    Stop { id: String, mode: StopMode },
    Terminate { id: String },
    Describe { id: String },
    CreateSharedVolume { name: String },
    DeleteSharedVolume { id: String },
    CreateBlockVolume { name: String },
    AttachBlockVolume { volume: String, instance: String },
    DetachBlockVolume { volume: String },
    DeleteBlockVolume { volume: String },
    IssueFederationToken { service: String, region: String },
}

#[derive(Debug, Clone)]
struct FakeInstance {
    state: RuntimeState,
}

#[derive(Default)]
struct ProviderState {
    instances: std::collections::HashMap<String, FakeInstance>,
    calls: Vec<FakeCall>,
    queued_errors: VecDeque<ProviderError>,
    launch_counter: u32,
    /// When true, launched instances report `Running` immediately.
    launch_ready: bool,
}

/// Scriptable in-memory [`CloudProvider`].
#[derive(Clone, Default)]
pub struct FakeProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose launches come up `Running` without polling delays.
    pub fn ready() -> Self {
        let provider = Self::default();
        provider.state.lock().launch_ready = true;
        provider
    }

    /// Queue an error; the next provider call returns it instead of acting.
    pub fn queue_error(&self, error: ProviderError) {
        self.state.lock().queued_errors.push_back(error);
    }

    /// Force an instance into a runtime state (e.g. simulate hibernation
    /// completing or the provider losing the instance).
    pub fn set_instance_state(&self, provider_id: &str, state: RuntimeState) {
        if let Some(instance) = self.state.lock().instances.get_mut(provider_id) {
            instance.state = state;
        }
    }

    /// Everything recorded so far.
    pub fn calls(&self) -> Vec<FakeCall> {
        self.state.lock().calls.clone()
    }

    /// Calls excluding the noisy `Describe` polls.
    pub fn mutating_calls(&self) -> Vec<FakeCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, FakeCall::Describe { .. }))
            .collect()
    }

    pub fn stop_call_count(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, FakeCall::Stop { .. })).count()
    }

    fn begin(&self, call: FakeCall) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        match state.queued_errors.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CloudProvider for FakeProvider {
    async fn launch_instance(&self, spec: &InstanceSpec) -> Result<Launched, ProviderError> {
        self.begin(FakeCall::Launch { name: spec.name.clone() })?;
        let mut state = self.state.lock();
        state.launch_counter += 1;
        let provider_id = format!("i-{:04}", state.launch_counter);
        let initial =
            if state.launch_ready { RuntimeState::Running } else { RuntimeState::Pending };
        state.instances.insert(provider_id.clone(), FakeInstance { state: initial });
        Ok(Launched {
            provider_id,
            public_address: Some(format!("198.51.100.{}", state.launch_counter)),
            private_address: Some(format!("10.0.0.{}", state.launch_counter)),
        })
    }

    async fn start_instance(&self, provider_id: &str) -> Result<(), ProviderError> {
        self.begin(FakeCall::Start { id: provider_id.to_string() })?;
        let mut state = self.state.lock();
        match state.instances.get_mut(provider_id) {
            Some(instance) => {
                instance.state = RuntimeState::Running;
                Ok(())
            }
            None => Err(ProviderError::not_found(provider_id)),
        }
    }

    async fn stop_instance(&self, provider_id: &str, mode: StopMode) -> Result<(), ProviderError> {
        self.begin(FakeCall::Stop { id: provider_id.to_string(), mode })?;
        let mut state = self.state.lock();
        match state.instances.get_mut(provider_id) {
            Some(instance) => {
                instance.state = match mode {
                    StopMode::Stop => RuntimeState::Stopped,
                    StopMode::Hibernate => RuntimeState::StoppedHibernated,
                };
                Ok(())
            }
            None => Err(ProviderError::not_found(provider_id)),
        }
    }

    async fn terminate_instance(&self, provider_id: &str) -> Result<(), ProviderError> {
        self.begin(FakeCall::Terminate { id: provider_id.to_string() })?;
        let mut state = self.state.lock();
        match state.instances.get_mut(provider_id) {
            Some(instance) => {
                instance.state = RuntimeState::Gone;
                Ok(())
            }
            None => Err(ProviderError::not_found(provider_id)),
        }
    }

    async fn describe_instance(&self, provider_id: &str) -> Result<RuntimeState, ProviderError> {
        self.begin(FakeCall::Describe { id: provider_id.to_string() })?;
        let state = self.state.lock();
        match state.instances.get(provider_id) {
            Some(instance) => Ok(instance.state),
            None => Ok(RuntimeState::Gone),
        }
    }

    async fn create_shared_volume(
        &self,
        name: &str,
        _size_bytes: u64,
    ) -> Result<String, ProviderError> {
        self.begin(FakeCall::CreateSharedVolume { name: name.to_string() })?;
        Ok(format!("fs-{name}"))
    }

    async fn delete_shared_volume(&self, provider_id: &str) -> Result<(), ProviderError> {
        self.begin(FakeCall::DeleteSharedVolume { id: provider_id.to_string() })
    }

    async fn create_block_volume(
        &self,
        name: &str,
        _size_bytes: u64,
    ) -> Result<String, ProviderError> {
        self.begin(FakeCall::CreateBlockVolume { name: name.to_string() })?;
        Ok(format!("vol-{name}"))
    }

    async fn attach_block_volume(
        &self,
        volume_id: &str,
        instance_id: &str,
    ) -> Result<(), ProviderError> {
        self.begin(FakeCall::AttachBlockVolume {
            volume: volume_id.to_string(),
            instance: instance_id.to_string(),
        })
    }

    async fn detach_block_volume(&self, volume_id: &str) -> Result<(), ProviderError> {
        self.begin(FakeCall::DetachBlockVolume { volume: volume_id.to_string() })
    }

    async fn delete_block_volume(&self, volume_id: &str) -> Result<(), ProviderError> {
        self.begin(FakeCall::DeleteBlockVolume { volume: volume_id.to_string() })
    }

    async fn issue_federation_token(
        &self,
        service: &str,
        region: &str,
        duration_secs: u64,
    ) -> Result<FederationToken, ProviderError> {
        self.begin(FakeCall::IssueFederationToken {
            service: service.to_string(),
            region: region.to_string(),
        })?;
        Ok(FederationToken {
            access_key: "AKIAFAKE".to_string(),
            secret_key: "fake-secret".to_string(),
            session_token: format!("fake-session-{service}"),
            expires_at_ms: duration_secs * 1000,
        })
    }
}

impl FakeProvider {
    /// Convenience for tests that want a provider-side auth failure.
    pub fn auth_failed() -> ProviderError {
        ProviderError::new(ProviderErrorKind::AuthFailed, "credentials rejected")
    }
}

// ---- Fake shell ----

#[derive(Default)]
struct ShellState {
    exec_results: VecDeque<Result<ExecOutput, ShellError>>,
    default_exec: Option<ExecOutput>,
    exec_commands: Vec<String>,
    exec_delay: Option<std::time::Duration>,
    ptys: Vec<FakePtyHandle>,
    tunnels: Vec<FakePtyHandle>,
}

/// Scriptable in-memory [`RemoteShell`].
#[derive(Clone, Default)]
pub struct FakeShell {
    state: Arc<Mutex<ShellState>>,
}

impl FakeShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next exec result (FIFO).
    pub fn push_exec(&self, result: Result<ExecOutput, ShellError>) {
        self.state.lock().exec_results.push_back(result);
    }

    /// Output returned when the script queue is empty.
    pub fn set_default_exec(&self, output: ExecOutput) {
        self.state.lock().default_exec = Some(output);
    }

    /// Delay every exec (for probe-timeout tests).
    pub fn set_exec_delay(&self, delay: std::time::Duration) {
        self.state.lock().exec_delay = Some(delay);
    }

    /// Commands executed so far.
    pub fn exec_commands(&self) -> Vec<String> {
        self.state.lock().exec_commands.clone()
    }

    /// Handle to the most recently opened PTY, if any.
    pub fn last_pty(&self) -> Option<FakePtyHandle> {
        self.state.lock().ptys.last().cloned()
    }

    /// Handle to the most recently opened tunnel, if any.
    pub fn last_tunnel(&self) -> Option<FakePtyHandle> {
        self.state.lock().tunnels.last().cloned()
    }
}

#[async_trait]
impl RemoteShell for FakeShell {
    async fn exec(
        &self,
        _endpoint: &ShellEndpoint,
        command: &str,
    ) -> Result<ExecOutput, ShellError> {
        let delay = {
            let mut state = self.state.lock();
            state.exec_commands.push(command.to_string());
            state.exec_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        if let Some(result) = state.exec_results.pop_front() {
            return result;
        }
        match &state.default_exec {
            Some(output) => Ok(output.clone()),
            None => Ok(ExecOutput { exit_code: 0, stdout: String::new(), stderr: String::new() }),
        }
    }

    async fn open_pty(
        &self,
        _endpoint: &ShellEndpoint,
        rows: u32,
        cols: u32,
    ) -> Result<Box<dyn PtySession>, ShellError> {
        let handle = FakePtyHandle::new();
        handle.shared.resizes.lock().push((rows, cols));
        self.state.lock().ptys.push(handle.clone());
        Ok(Box::new(FakePty { handle }))
    }

    async fn open_tunnel(
        &self,
        _endpoint: &ShellEndpoint,
        _remote_host: &str,
        _remote_port: u16,
    ) -> Result<Box<dyn TunnelStream>, ShellError> {
        let handle = FakePtyHandle::new();
        self.state.lock().tunnels.push(handle.clone());
        Ok(Box::new(FakePty { handle }))
    }
}

#[derive(Default)]
struct PtyShared {
    /// Bytes the test feeds to the daemon (remote → local).
    output: Mutex<VecDeque<Vec<u8>>>,
    /// Bytes the daemon wrote (local → remote).
    written: Mutex<Vec<u8>>,
    resizes: Mutex<Vec<(u32, u32)>>,
    closed: Mutex<bool>,
    notify: Notify,
}

/// Test-side control handle for a fake PTY or tunnel.
#[derive(Clone, Default)]
pub struct FakePtyHandle {
    shared: Arc<PtyShared>,
}

impl FakePtyHandle {
    fn new() -> Self {
        Self::default()
    }

    /// Feed remote output to the daemon side.
    pub fn push_output(&self, bytes: &[u8]) {
        self.shared.output.lock().push_back(bytes.to_vec());
        self.shared.notify.notify_waiters();
    }

    /// Simulate the remote end closing.
    pub fn close_remote(&self) {
        *self.shared.closed.lock() = true;
        self.shared.notify.notify_waiters();
    }

    /// Everything the daemon wrote, lossily decoded.
    pub fn written_utf8(&self) -> String {
        String::from_utf8_lossy(&self.shared.written.lock()).into_owned()
    }

    /// Recorded geometry changes, including the initial one.
    pub fn resizes(&self) -> Vec<(u32, u32)> {
        self.shared.resizes.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.shared.closed.lock()
    }
}

struct FakePty {
    handle: FakePtyHandle,
}

#[async_trait]
impl PtySession for FakePty {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ShellError> {
        loop {
            let notified = self.handle.shared.notify.notified();
            {
                let mut queue = self.handle.shared.output.lock();
                if let Some(mut chunk) = queue.pop_front() {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        chunk.drain(..n);
                        queue.push_front(chunk);
                    }
                    return Ok(n);
                }
                if *self.handle.shared.closed.lock() {
                    return Ok(0);
                }
            }
            notified.await;
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), ShellError> {
        if *self.handle.shared.closed.lock() {
            return Err(ShellError::Closed);
        }
        self.handle.shared.written.lock().extend_from_slice(data);
        self.handle.shared.notify.notify_waiters();
        Ok(())
    }

    async fn resize(&mut self, rows: u32, cols: u32) -> Result<(), ShellError> {
        self.handle.shared.resizes.lock().push((rows, cols));
        Ok(())
    }

    async fn close(&mut self) {
        self.handle.close_remote();
    }
}

#[async_trait]
impl TunnelStream for FakePty {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ShellError> {
        PtySession::read(self, buf).await
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), ShellError> {
        PtySession::write(self, data).await
    }

    async fn close(&mut self) {
        PtySession::close(self).await;
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
