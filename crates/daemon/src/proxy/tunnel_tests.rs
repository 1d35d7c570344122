// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use outpost_core::ConnectionKind;
use outpost_provider::{FakeShell, KeyMaterial};
use std::time::Duration;
use tokio::io::AsyncReadExt as _;

fn endpoint() -> ShellEndpoint {
    ShellEndpoint {
        host: "198.51.100.7".to_string(),
        port: 22,
        username: "ubuntu".to_string(),
        key_material: KeyMaterial::Agent,
    }
}

#[tokio::test]
async fn open_allocates_distinct_local_ports() {
    let shell = Arc::new(FakeShell::new());
    let tracker = ConnectionTracker::new();

    let a = open(shell.clone(), endpoint(), "w1", 8888, None, &tracker, 1000).await.unwrap();
    let b = open(shell.clone(), endpoint(), "w1", 8787, None, &tracker, 1000).await.unwrap();

    assert_ne!(a.local_port, b.local_port, "tunnels coexist on distinct ports");
    assert_eq!(tracker.open_count(), 2);
    assert!(a.url.contains(&format!("127.0.0.1:{}", a.local_port)));
}

#[tokio::test]
async fn url_embeds_captured_token() {
    let shell = Arc::new(FakeShell::new());
    let tracker = ConnectionTracker::new();

    let tunnel = open(
        shell,
        endpoint(),
        "w1",
        8888,
        Some("s3cret".to_string()),
        &tracker,
        1000,
    )
    .await
    .unwrap();
    assert!(tunnel.url.ends_with("/?token=s3cret"));
}

#[tokio::test]
async fn bytes_flow_through_the_tunnel() {
    let shell = Arc::new(FakeShell::new());
    let tracker = ConnectionTracker::new();
    let tunnel = open(shell.clone(), endpoint(), "w1", 8888, None, &tracker, 1000).await.unwrap();

    let mut client = tokio::net::TcpStream::connect(("127.0.0.1", tunnel.local_port))
        .await
        .unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut client, b"GET / HTTP/1.0\r\n\r\n").await.unwrap();

    // The service-side fake receives what the client wrote...
    let handle = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(handle) = shell.last_tunnel() {
                if handle.written_utf8().contains("GET /") {
                    return handle;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("tunnel should forward client bytes");

    // ...and its response reaches the client.
    handle.push_output(b"HTTP/1.0 200 OK\r\n\r\n");
    let mut buf = vec![0u8; 64];
    let n = tokio::time::timeout(Duration::from_secs(5), client.read(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert!(String::from_utf8_lossy(&buf[..n]).starts_with("HTTP/1.0 200 OK"));
}

#[tokio::test]
async fn closing_the_connection_releases_the_port() {
    let shell = Arc::new(FakeShell::new());
    let tracker = ConnectionTracker::new();
    let tunnel = open(shell, endpoint(), "w1", 8888, None, &tracker, 1000).await.unwrap();

    tracker.close(tunnel.connection_id);
    assert_eq!(tracker.open_count(), 0);

    // The acceptor winds down; new connections are refused once it is gone.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let result = tokio::net::TcpStream::connect(("127.0.0.1", tunnel.local_port)).await;
    assert!(result.is_err(), "acceptor should be gone after close");
}

#[test]
fn tracked_kind_is_web_tunnel() {
    let tracker = ConnectionTracker::new();
    let (_, _) = tracker.register(ConnectionKind::WebTunnel, "w1", 0);
    assert_eq!(tracker.list()[0].kind, ConnectionKind::WebTunnel);
}
