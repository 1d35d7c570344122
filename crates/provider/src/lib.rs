// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! outpost-provider: Ports to the cloud and to remote workstations.
//!
//! All IaaS calls go through the [`CloudProvider`] trait; all SSH traffic
//! (idle probes, terminal sessions, tunnels) goes through [`RemoteShell`].
//! The daemon never touches a concrete SDK or socket directly, which is what
//! lets the whole control plane run against fakes in tests.

pub mod cloud;
pub mod retry;
pub mod shell;
mod ssh;
mod unconfigured;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use cloud::{
    CloudProvider, FederationToken, InstanceSpec, Launched, ProviderError, ProviderErrorKind,
    RuntimeState, StopMode,
};
pub use retry::{with_backoff, BackoffPolicy};
pub use shell::{
    ExecOutput, KeyMaterial, PtySession, RemoteShell, ShellEndpoint, ShellError, TunnelStream,
};
pub use ssh::Ssh2Shell;
pub use unconfigured::UnconfiguredProvider;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeCall, FakeProvider, FakeShell};
