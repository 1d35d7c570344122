// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH implementation of the remote shell port.
//!
//! libssh2 is blocking, so every session lives on a dedicated blocking
//! context: one-shot execs run inside `spawn_blocking`; interactive channels
//! (PTYs, tunnels) get a pump thread that shuttles bytes to and from async
//! land over channels. The daemon side only ever sees the async traits.

use crate::shell::{
    ExecOutput, KeyMaterial, PtySession, RemoteShell, ShellEndpoint, ShellError, TunnelStream,
};
use async_trait::async_trait;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tokio::sync::mpsc;

const PUMP_IDLE_SLEEP: Duration = Duration::from_millis(10);
const PUMP_BUF_LEN: usize = 32 * 1024;

/// ssh2-backed [`RemoteShell`].
#[derive(Clone)]
pub struct Ssh2Shell {
    connect_timeout: Duration,
}

impl Default for Ssh2Shell {
    fn default() -> Self {
        Self { connect_timeout: Duration::from_secs(10) }
    }
}

impl Ssh2Shell {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl RemoteShell for Ssh2Shell {
    async fn exec(
        &self,
        endpoint: &ShellEndpoint,
        command: &str,
    ) -> Result<ExecOutput, ShellError> {
        let endpoint = endpoint.clone();
        let command = command.to_string();
        let timeout = self.connect_timeout;

        tokio::task::spawn_blocking(move || exec_blocking(&endpoint, &command, timeout))
            .await
            .map_err(|e| ShellError::Io(format!("exec task: {e}")))?
    }

    async fn open_pty(
        &self,
        endpoint: &ShellEndpoint,
        rows: u32,
        cols: u32,
    ) -> Result<Box<dyn PtySession>, ShellError> {
        let pump = ChannelPump::spawn(endpoint.clone(), self.connect_timeout, move |session| {
            let mut channel = session
                .channel_session()
                .map_err(|e| ShellError::Connect(format!("channel: {e}")))?;
            channel
                .request_pty("xterm-256color", None, Some((cols, rows, 0, 0)))
                .map_err(|e| ShellError::Connect(format!("pty: {e}")))?;
            channel.shell().map_err(|e| ShellError::Connect(format!("shell: {e}")))?;
            Ok(channel)
        })
        .await?;
        Ok(Box::new(pump))
    }

    async fn open_tunnel(
        &self,
        endpoint: &ShellEndpoint,
        remote_host: &str,
        remote_port: u16,
    ) -> Result<Box<dyn TunnelStream>, ShellError> {
        let host = remote_host.to_string();
        let pump = ChannelPump::spawn(endpoint.clone(), self.connect_timeout, move |session| {
            session
                .channel_direct_tcpip(&host, remote_port, None)
                .map_err(|e| ShellError::Connect(format!("direct-tcpip: {e}")))
        })
        .await?;
        Ok(Box::new(pump))
    }
}

fn connect_blocking(
    endpoint: &ShellEndpoint,
    timeout: Duration,
) -> Result<ssh2::Session, ShellError> {
    let addr = endpoint
        .addr()
        .to_socket_addrs()
        .map_err(|e| ShellError::Connect(format!("resolve {}: {e}", endpoint.addr())))?
        .next()
        .ok_or_else(|| ShellError::Connect(format!("no address for {}", endpoint.addr())))?;

    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| ShellError::Connect(format!("tcp {}: {e}", endpoint.addr())))?;

    let mut session =
        ssh2::Session::new().map_err(|e| ShellError::Connect(format!("session: {e}")))?;
    session.set_tcp_stream(tcp);
    session.handshake().map_err(|e| ShellError::Connect(format!("handshake: {e}")))?;

    match &endpoint.key_material {
        KeyMaterial::PrivateKeyPem(pem) => session
            .userauth_pubkey_memory(&endpoint.username, None, pem, None)
            .map_err(|e| ShellError::Auth(e.to_string()))?,
        KeyMaterial::KeyFile(path) => session
            .userauth_pubkey_file(&endpoint.username, None, path, None)
            .map_err(|e| ShellError::Auth(e.to_string()))?,
        KeyMaterial::Agent => session
            .userauth_agent(&endpoint.username)
            .map_err(|e| ShellError::Auth(e.to_string()))?,
    }
    if !session.authenticated() {
        return Err(ShellError::Auth(format!("user {} not authenticated", endpoint.username)));
    }
    Ok(session)
}

fn exec_blocking(
    endpoint: &ShellEndpoint,
    command: &str,
    timeout: Duration,
) -> Result<ExecOutput, ShellError> {
    let session = connect_blocking(endpoint, timeout)?;
    let mut channel =
        session.channel_session().map_err(|e| ShellError::Exec(format!("channel: {e}")))?;
    channel.exec(command).map_err(|e| ShellError::Exec(e.to_string()))?;

    let mut stdout = String::new();
    channel.read_to_string(&mut stdout).map_err(|e| ShellError::Io(e.to_string()))?;
    let mut stderr = String::new();
    channel
        .stderr()
        .read_to_string(&mut stderr)
        .map_err(|e| ShellError::Io(e.to_string()))?;

    channel.wait_close().map_err(|e| ShellError::Io(e.to_string()))?;
    let exit_code = channel.exit_status().map_err(|e| ShellError::Io(e.to_string()))?;

    Ok(ExecOutput { exit_code, stdout, stderr })
}

enum PumpCmd {
    Write(Vec<u8>),
    Resize { rows: u32, cols: u32 },
    Close,
}

/// Bridges one blocking ssh2 channel to async code.
///
/// The pump thread owns the session and channel, polling them non-blocking:
/// remote bytes go out over `out_rx`, commands come in over `cmd_tx`. Bounded
/// channels give natural backpressure — when the async side stops draining
/// `out_rx`, the pump stops reading the channel.
struct ChannelPump {
    cmd_tx: std::sync::mpsc::Sender<PumpCmd>,
    out_rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl ChannelPump {
    async fn spawn<F>(
        endpoint: ShellEndpoint,
        timeout: Duration,
        open: F,
    ) -> Result<Self, ShellError>
    where
        F: FnOnce(&ssh2::Session) -> Result<ssh2::Channel, ShellError> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel::<PumpCmd>();
        let (out_tx, out_rx) = mpsc::channel::<Vec<u8>>(8);
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel::<Result<(), ShellError>>();

        std::thread::spawn(move || {
            let session = match connect_blocking(&endpoint, timeout) {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let channel = match open(&session) {
                Ok(c) => c,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));
            pump_loop(session, channel, cmd_rx, out_tx);
        });

        ready_rx
            .await
            .map_err(|_| ShellError::Connect("pump thread died during setup".to_string()))??;

        Ok(Self { cmd_tx, out_rx, pending: Vec::new() })
    }

    fn drain_pending(&mut self, buf: &mut [u8]) -> usize {
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        n
    }
}

#[async_trait]
impl PtySession for ChannelPump {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ShellError> {
        if !self.pending.is_empty() {
            return Ok(self.drain_pending(buf));
        }
        match self.out_rx.recv().await {
            Some(bytes) => {
                self.pending = bytes;
                Ok(self.drain_pending(buf))
            }
            None => Ok(0),
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), ShellError> {
        self.cmd_tx.send(PumpCmd::Write(data.to_vec())).map_err(|_| ShellError::Closed)
    }

    async fn resize(&mut self, rows: u32, cols: u32) -> Result<(), ShellError> {
        self.cmd_tx.send(PumpCmd::Resize { rows, cols }).map_err(|_| ShellError::Closed)
    }

    async fn close(&mut self) {
        let _ = self.cmd_tx.send(PumpCmd::Close);
    }
}

#[async_trait]
impl TunnelStream for ChannelPump {
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

/// Non-blocking poll loop over one channel.
///
/// libssh2 signals WouldBlock on both reads and writes when the session is
/// in non-blocking mode; the loop interleaves channel reads with queued
/// commands and sleeps briefly when neither side has work.
fn pump_loop(
    session: ssh2::Session,
    mut channel: ssh2::Channel,
    cmd_rx: std::sync::mpsc::Receiver<PumpCmd>,
    out_tx: mpsc::Sender<Vec<u8>>,
) {
    session.set_blocking(false);
    let mut buf = vec![0u8; PUMP_BUF_LEN];
    let mut write_backlog: Vec<u8> = Vec::new();

    'outer: loop {
        let mut progressed = false;

        // Remote → async. blocking_send doubles as backpressure: a full
        // out channel pauses channel reads until the consumer drains it.
        match channel.read(&mut buf) {
            Ok(0) => {
                if channel.eof() {
                    break;
                }
            }
            Ok(n) => {
                progressed = true;
                if out_tx.blocking_send(buf[..n].to_vec()).is_err() {
                    break; // consumer gone
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(_) => break,
        }

        // Commands → remote.
        loop {
            if write_backlog.is_empty() {
                match cmd_rx.try_recv() {
                    Ok(PumpCmd::Write(data)) => write_backlog = data,
                    Ok(PumpCmd::Resize { rows, cols }) => {
                        let _ = channel.request_pty_size(cols, rows, None, None);
                        progressed = true;
                        continue;
                    }
                    Ok(PumpCmd::Close) => break 'outer,
                    Err(std::sync::mpsc::TryRecvError::Empty) => break,
                    Err(std::sync::mpsc::TryRecvError::Disconnected) => break 'outer,
                }
            }
            match channel.write(&write_backlog) {
                Ok(n) => {
                    progressed = true;
                    write_backlog.drain(..n);
                    if !write_backlog.is_empty() {
                        break; // partial write, try again next round
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(_) => break 'outer,
            }
        }

        if !progressed {
            std::thread::sleep(PUMP_IDLE_SLEEP);
        }
    }

    session.set_blocking(true);
    let _ = channel.close();
}
