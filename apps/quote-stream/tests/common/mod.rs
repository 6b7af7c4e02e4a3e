//! In-process mock gateway for integration tests.
//!
//! Accepts one WebSocket connection at a time (the client under test holds
//! at most one socket), records every inbound text frame as JSON, and lets
//! tests push frames or server-initiated closes.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use naps_quote_stream::{ReconnectConfig, StreamConfig};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// Commands a test drives the gateway with.
#[derive(Debug, Clone)]
pub enum GatewayCmd {
    /// Send a text frame to the connected client.
    Send(String),
    /// Close the current connection from the server side.
    Close,
}

/// Handle to the spawned mock gateway.
pub struct MockGateway {
    addr: SocketAddr,
    frames: mpsc::UnboundedReceiver<serde_json::Value>,
    cmd_tx: broadcast::Sender<GatewayCmd>,
    handle: JoinHandle<()>,
}

impl MockGateway {
    /// Bind a listener on an ephemeral port and start serving.
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frame_tx, frames) = mpsc::unbounded_channel();
        let (cmd_tx, _) = broadcast::channel(64);
        let accept_cmd_tx = cmd_tx.clone();

        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                let mut cmds = accept_cmd_tx.subscribe();
                let frame_tx = frame_tx.clone();

                loop {
                    tokio::select! {
                        cmd = cmds.recv() => match cmd {
                            Ok(GatewayCmd::Send(text)) => {
                                if ws.send(Message::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                            Ok(GatewayCmd::Close) => {
                                let _ = ws.close(None).await;
                                break;
                            }
                            Err(_) => break,
                        },
                        message = ws.next() => match message {
                            Some(Ok(Message::Text(text))) => {
                                if let Ok(value) = serde_json::from_str(&text) {
                                    let _ = frame_tx.send(value);
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(_)) => break,
                        }
                    }
                }
            }
        });

        Self {
            addr,
            frames,
            cmd_tx,
            handle,
        }
    }

    /// WebSocket URL of the gateway.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Push a text frame to the connected client.
    ///
    /// Only valid once a connection is established (confirm by reading a
    /// frame the client sent first).
    pub fn send(&self, text: &str) {
        let _ = self.cmd_tx.send(GatewayCmd::Send(text.to_string()));
    }

    /// Close the current connection from the server side.
    pub fn close_connection(&self) {
        let _ = self.cmd_tx.send(GatewayCmd::Close);
    }

    /// Next frame the client sent, parsed as JSON.
    pub async fn next_frame(&mut self) -> serde_json::Value {
        tokio::time::timeout(Duration::from_secs(2), self.frames.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("gateway task ended")
    }

    /// Assert that no frame arrives within the window.
    pub async fn expect_no_frame(&mut self, window: Duration) {
        let result = tokio::time::timeout(window, self.frames.recv()).await;
        assert!(result.is_err(), "unexpected frame: {result:?}");
    }

    /// Stop the gateway task.
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

/// Client configuration with fast, deterministic reconnect timing.
pub fn test_config(url: String) -> StreamConfig {
    StreamConfig {
        url,
        token: None,
        reconnect: ReconnectConfig {
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(200),
            jitter_factor: 0.0,
            max_attempts: 5,
        },
        ping_interval: Duration::from_secs(30),
    }
}

/// Poll a predicate until it holds, or fail after two seconds.
pub async fn wait_until(predicate: impl Fn() -> bool) {
    for _ in 0..400 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 2s");
}
