// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal bridge behavior against a fake socket and fake PTY.

use super::*;
use axum::extract::ws::Message;
use futures_util::task::{Context, Poll};
use outpost_provider::{FakeShell, KeyMaterial, RemoteShell, ShellEndpoint};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;

/// In-memory Stream+Sink standing in for a client WebSocket.
struct FakeSocket {
    incoming: mpsc::UnboundedReceiver<Result<Message, std::convert::Infallible>>,
    outgoing: mpsc::UnboundedSender<Message>,
}

struct FakeClient {
    to_daemon: mpsc::UnboundedSender<Result<Message, std::convert::Infallible>>,
    from_daemon: mpsc::UnboundedReceiver<Message>,
}

fn socket_pair() -> (FakeSocket, FakeClient) {
    let (to_daemon, incoming) = mpsc::unbounded_channel();
    let (outgoing, from_daemon) = mpsc::unbounded_channel();
    (FakeSocket { incoming, outgoing }, FakeClient { to_daemon, from_daemon })
}

impl Stream for FakeSocket {
    type Item = Result<Message, std::convert::Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.incoming.poll_recv(cx)
    }
}

impl Sink<Message> for FakeSocket {
    type Error = std::convert::Infallible;

    fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        let _ = self.outgoing.send(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
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

async fn recv_binary(client: &mut FakeClient) -> Vec<u8> {
    loop {
        match tokio::time::timeout(Duration::from_secs(5), client.from_daemon.recv())
            .await
            .expect("expected a frame within 5 s")
            .expect("bridge closed unexpectedly")
        {
            Message::Binary(data) => return data,
            _ => continue,
        }
    }
}

#[tokio::test]
async fn echo_round_trip() {
    let shell = FakeShell::new();
    let pty = shell.open_pty(&endpoint(), DEFAULT_ROWS, DEFAULT_COLS).await.unwrap();
    let handle = shell.last_pty().unwrap();
    let (socket, mut client) = socket_pair();
    let cancel = CancellationToken::new();

    let task = tokio::spawn(bridge(socket, pty, cancel));

    // Structured input frame reaches the shell stdin.
    client
        .to_daemon
        .send(Ok(Message::Text(r#"{"type":"input","data":"echo hello\n"}"#.to_string())))
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !handle.written_utf8().contains("echo hello\n") {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("input should reach the pty");

    // Shell output comes back verbatim as a binary frame.
    handle.push_output(b"hello\n");
    assert_eq!(recv_binary(&mut client).await, b"hello\n");

    // Client closes; the daemon closes its shell end.
    drop(client.to_daemon);
    tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    assert!(handle.is_closed(), "shell must be closed after client hangup");
}

#[tokio::test]
async fn resize_frames_reach_the_pty() {
    let shell = FakeShell::new();
    let pty = shell.open_pty(&endpoint(), DEFAULT_ROWS, DEFAULT_COLS).await.unwrap();
    let handle = shell.last_pty().unwrap();
    let (socket, client) = socket_pair();

    let task = tokio::spawn(bridge(socket, pty, CancellationToken::new()));

    client
        .to_daemon
        .send(Ok(Message::Text(r#"{"type":"resize","rows":50,"cols":132}"#.to_string())))
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !handle.resizes().contains(&(50, 132)) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("resize should reach the pty");

    drop(client);
    task.await.unwrap();
}

#[tokio::test]
async fn non_conformant_text_is_raw_input() {
    let shell = FakeShell::new();
    let pty = shell.open_pty(&endpoint(), DEFAULT_ROWS, DEFAULT_COLS).await.unwrap();
    let handle = shell.last_pty().unwrap();
    let (socket, client) = socket_pair();

    let task = tokio::spawn(bridge(socket, pty, CancellationToken::new()));

    client.to_daemon.send(Ok(Message::Text("ls -la\n".to_string()))).unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !handle.written_utf8().contains("ls -la\n") {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("raw text should be forwarded as input");

    drop(client);
    task.await.unwrap();
}

#[tokio::test]
async fn remote_eof_closes_the_session() {
    let shell = FakeShell::new();
    let pty = shell.open_pty(&endpoint(), DEFAULT_ROWS, DEFAULT_COLS).await.unwrap();
    let handle = shell.last_pty().unwrap();
    let (socket, mut client) = socket_pair();

    let task = tokio::spawn(bridge(socket, pty, CancellationToken::new()));

    handle.close_remote();
    // The daemon should emit a close frame and finish.
    tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    let mut saw_close = false;
    while let Ok(msg) = client.from_daemon.try_recv() {
        if matches!(msg, Message::Close(_)) {
            saw_close = true;
        }
    }
    assert!(saw_close, "client should receive a close frame");
}

#[tokio::test]
async fn workspace_sweep_cancels_the_bridge() {
    let shell = FakeShell::new();
    let pty = shell.open_pty(&endpoint(), DEFAULT_ROWS, DEFAULT_COLS).await.unwrap();
    let handle = shell.last_pty().unwrap();
    let (socket, _client) = socket_pair();
    let cancel = CancellationToken::new();

    let task = tokio::spawn(bridge(socket, pty, cancel.clone()));
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    assert!(handle.is_closed());
}
