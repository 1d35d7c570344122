// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The remote shell port.
//!
//! Idle probes, interactive terminals, and web tunnels all reach a
//! workstation through this interface. Credential lookup is injected via
//! [`KeyMaterial`] on the endpoint — implementations never go hunting for
//! key files on their own.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("exec failed: {0}")]
    Exec(String),

    #[error("channel I/O failed: {0}")]
    Io(String),

    #[error("operation timed out")]
    Timeout,

    #[error("session closed")]
    Closed,
}

/// How to authenticate against a workstation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// PEM-encoded private key held in memory (the workspace record's key).
    PrivateKeyPem(String),
    /// Path to an on-disk private key.
    KeyFile(PathBuf),
    /// Defer to a running SSH agent.
    Agent,
}

/// Address + credentials for one workstation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellEndpoint {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub key_material: KeyMaterial,
}

impl ShellEndpoint {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Captured output of a non-interactive command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// An interactive pseudo-terminal on a workstation.
///
/// `read` returning 0 means the remote side closed. Implementations must
/// release the underlying transport on drop as well as on `close`.
#[async_trait]
pub trait PtySession: Send {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ShellError>;

    async fn write(&mut self, data: &[u8]) -> Result<(), ShellError>;

    /// Propagate a window-change to the remote terminal.
    async fn resize(&mut self, rows: u32, cols: u32) -> Result<(), ShellError>;

    async fn close(&mut self);
}

/// A forwarded byte stream to an in-workspace service.
#[async_trait]
pub trait TunnelStream: Send {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ShellError>;

    async fn write(&mut self, data: &[u8]) -> Result<(), ShellError>;

    async fn close(&mut self);
}

/// Transport into workstations: one-shot commands, PTYs, and tunnels.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run a command and capture its output.
    async fn exec(
        &self,
        endpoint: &ShellEndpoint,
        command: &str,
    ) -> Result<ExecOutput, ShellError>;

    /// Open an interactive shell with an initial terminal geometry.
    async fn open_pty(
        &self,
        endpoint: &ShellEndpoint,
        rows: u32,
        cols: u32,
    ) -> Result<Box<dyn PtySession>, ShellError>;

    /// Open a forwarded connection to `remote_host:remote_port` as seen from
    /// the workstation.
    async fn open_tunnel(
        &self,
        endpoint: &ShellEndpoint,
        remote_host: &str,
        remote_port: u16,
    ) -> Result<Box<dyn TunnelStream>, ShellError>;
}
