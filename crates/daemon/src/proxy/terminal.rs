// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket ↔ PTY bridge for interactive terminal sessions.
//!
//! Client text frames carry control messages (`input`, `resize`); anything
//! that doesn't parse is forwarded as raw input. Shell output flows to the
//! client as binary frames in production order. Backpressure is inherent:
//! the bridge does not read the PTY while a client send is in flight.

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use outpost_provider::PtySession;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Minimum read buffer for shell output.
pub const READ_BUF_LEN: usize = 32 * 1024;

/// Default geometry until the client sends its first resize.
pub const DEFAULT_ROWS: u32 = 24;
pub const DEFAULT_COLS: u32 = 80;

/// Control messages carried in client text frames.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlMsg {
    Input { data: String },
    Resize { rows: u32, cols: u32 },
}

/// Pump bytes between a WebSocket client and a workspace PTY until either
/// side closes or `cancel` fires. All resources are released on every exit
/// path; the caller only has to deregister the session.
pub async fn bridge<S, E>(mut socket: S, mut pty: Box<dyn PtySession>, cancel: CancellationToken)
where
    S: Stream<Item = Result<Message, E>> + Sink<Message> + Unpin + Send,
{
    let mut buf = vec![0u8; READ_BUF_LEN];

    loop {
        tokio::select! {
            // Client → shell.
            incoming = socket.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ControlMsg>(&text) {
                            Ok(ControlMsg::Input { data }) => {
                                if pty.write(data.as_bytes()).await.is_err() {
                                    break;
                                }
                            }
                            Ok(ControlMsg::Resize { rows, cols }) => {
                                if pty.resize(rows, cols).await.is_err() {
                                    break;
                                }
                            }
                            // Non-conformant text is raw input.
                            Err(_) => {
                                if pty.write(text.as_bytes()).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if pty.write(&data).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong handled by the transport
                    Some(Err(_)) => break,
                }
            }

            // Shell → client. Output bytes go out verbatim as binary frames;
            // awaiting the send here is what pauses shell reads when the
            // client is slow.
            read = pty.read(&mut buf) => {
                match read {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if socket.send(Message::Binary(buf[..n].to_vec())).await.is_err() {
                            break;
                        }
                    }
                }
            }

            _ = cancel.cancelled() => break,
        }
    }

    pty.close().await;
    let _ = socket.send(Message::Close(None)).await;
}

#[cfg(test)]
#[path = "terminal_tests.rs"]
mod tests;
