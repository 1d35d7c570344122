// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::cloud::{CloudProvider, InstanceSpec, RuntimeState, StopMode};
use crate::shell::{KeyMaterial, PtySession as _, RemoteShell, ShellEndpoint};
use outpost_core::{Arch, Size};

fn spec(name: &str) -> InstanceSpec {
    InstanceSpec {
        name: name.to_string(),
        template: "python-ml".to_string(),
        size: Size::S,
        region: "us-east-1".to_string(),
        architecture: Arch::X86_64,
        hibernation: true,
    }
}

fn endpoint() -> ShellEndpoint {
    ShellEndpoint {
        host: "198.51.100.7".to_string(),
        port: 22,
        username: "ubuntu".to_string(),
        key_material: KeyMaterial::Agent,
    }
}

#[tokio::test]
async fn launch_then_lifecycle() {
    let provider = FakeProvider::new();
    let launched = provider.launch_instance(&spec("w1")).await.unwrap();
    assert_eq!(launched.provider_id, "i-0001");
    assert_eq!(
        provider.describe_instance(&launched.provider_id).await.unwrap(),
        RuntimeState::Pending
    );

    provider.set_instance_state(&launched.provider_id, RuntimeState::Running);
    provider.stop_instance(&launched.provider_id, StopMode::Hibernate).await.unwrap();
    assert_eq!(
        provider.describe_instance(&launched.provider_id).await.unwrap(),
        RuntimeState::StoppedHibernated
    );

    provider.terminate_instance(&launched.provider_id).await.unwrap();
    assert_eq!(
        provider.describe_instance(&launched.provider_id).await.unwrap(),
        RuntimeState::Gone
    );
}

#[tokio::test]
async fn queued_error_fires_once() {
    let provider = FakeProvider::ready();
    provider.queue_error(ProviderError::transient("hiccup"));

    let err = provider.launch_instance(&spec("w1")).await.unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Transient);

    // Second attempt succeeds.
    provider.launch_instance(&spec("w1")).await.unwrap();
    assert_eq!(provider.mutating_calls().len(), 2);
}

#[tokio::test]
async fn describe_unknown_instance_reports_gone() {
    let provider = FakeProvider::new();
    assert_eq!(provider.describe_instance("i-missing").await.unwrap(), RuntimeState::Gone);
}

#[tokio::test]
async fn fake_shell_scripts_exec_output() {
    let shell = FakeShell::new();
    shell.push_exec(Ok(ExecOutput {
        exit_code: 0,
        stdout: "cpu=2.0\n".to_string(),
        stderr: String::new(),
    }));

    let out = shell.exec(&endpoint(), "probe").await.unwrap();
    assert_eq!(out.stdout, "cpu=2.0\n");
    assert_eq!(shell.exec_commands(), vec!["probe"]);

    // Queue drained: falls back to the default.
    let out = shell.exec(&endpoint(), "probe").await.unwrap();
    assert_eq!(out.stdout, "");
}

#[tokio::test]
async fn fake_pty_round_trips_bytes() {
    let shell = FakeShell::new();
    let mut pty = shell.open_pty(&endpoint(), 24, 80).await.unwrap();
    let handle = shell.last_pty().unwrap();

    pty.write(b"echo hello\n").await.unwrap();
    assert_eq!(handle.written_utf8(), "echo hello\n");

    handle.push_output(b"hello\n");
    let mut buf = [0u8; 64];
    let n = pty.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"hello\n");

    handle.close_remote();
    assert_eq!(pty.read(&mut buf).await.unwrap(), 0, "EOF after remote close");
}

#[tokio::test]
async fn fake_pty_records_resizes() {
    let shell = FakeShell::new();
    let mut pty = shell.open_pty(&endpoint(), 24, 80).await.unwrap();
    pty.resize(50, 132).await.unwrap();
    assert_eq!(shell.last_pty().unwrap().resizes(), vec![(24, 80), (50, 132)]);
}
