//! Gateway Connection Task
//!
//! Owns the single WebSocket connection to the market-data gateway and runs
//! its lifecycle:
//!
//! - connect, authenticate (optional), replay subscriptions, emit `open`
//! - forward subscribe/unsubscribe deltas from the facade while open
//! - fan incoming quotes out to registered callbacks
//! - reconnect with bounded linear backoff; emit `exhausted` when the
//!   budget is spent
//!
//! Control-frame deltas are only meaningful within one socket session. On
//! every (re)connect the registry replay is authoritative, so deltas queued
//! across the session boundary are discarded before the replay.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;

use super::codec::JsonCodec;
use super::messages::{ControlFrame, InboundMessage};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::domain::streaming::{
    ConnectionState, EventListeners, SharedState, StreamEvent, Symbol,
};
use crate::domain::subscription::SubscriptionRegistry;
use crate::infrastructure::metrics;

/// Default interval between application-level ping frames.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in the gateway connection task.
#[derive(Debug, thiserror::Error)]
pub enum StreamClientError {
    /// The connection attempt failed before the socket opened.
    #[error("gateway connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket transport error on an open connection.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Sending an outbound frame failed.
    #[error("failed to send frame: {0}")]
    SendFailed(String),

    /// The gateway closed the connection.
    #[error("connection closed (code: {code:?})")]
    ConnectionClosed {
        /// WebSocket close code, if the gateway sent one.
        code: Option<u16>,
    },

    /// Maximum reconnection attempts exceeded.
    #[error("maximum reconnection attempts exceeded")]
    MaxReconnectAttemptsExceeded,
}

// =============================================================================
// Configuration
// =============================================================================

/// Bearer token for gateway authentication.
///
/// The `Debug` implementation redacts the token for safe logging.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a token string.
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// The raw token, for writing the auth frame.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AuthToken").field(&"[REDACTED]").finish()
    }
}

/// Configuration for the gateway connection.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket endpoint URL.
    pub url: String,
    /// Optional bearer token sent as an auth frame after open.
    pub token: Option<AuthToken>,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
    /// Interval between application-level ping frames.
    pub ping_interval: Duration,
}

impl StreamConfig {
    /// Create a configuration with defaults for the given endpoint.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            reconnect: ReconnectConfig::default(),
            ping_interval: DEFAULT_PING_INTERVAL,
        }
    }
}

// =============================================================================
// Connection Task
// =============================================================================

/// The gateway connection task.
///
/// Constructed by the facade with shared handles to the registry, listener
/// sets, and state cell; consumed by [`ConnectionTask::run`], which is
/// spawned onto the runtime.
pub struct ConnectionTask {
    config: StreamConfig,
    codec: JsonCodec,
    registry: Arc<SubscriptionRegistry>,
    listeners: Arc<EventListeners>,
    state: Arc<SharedState>,
    frame_rx: mpsc::UnboundedReceiver<ControlFrame>,
    cancel: CancellationToken,
}

impl ConnectionTask {
    /// Create a new connection task.
    #[must_use]
    pub fn new(
        config: StreamConfig,
        registry: Arc<SubscriptionRegistry>,
        listeners: Arc<EventListeners>,
        state: Arc<SharedState>,
        frame_rx: mpsc::UnboundedReceiver<ControlFrame>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            codec: JsonCodec::new(),
            registry,
            listeners,
            state,
            frame_rx,
            cancel,
        }
    }

    /// Run the connection loop until cancelled or the reconnect budget is
    /// spent.
    ///
    /// # Errors
    ///
    /// Returns [`StreamClientError::MaxReconnectAttemptsExceeded`] after the
    /// final failed attempt. Cancellation is a clean shutdown, not an error.
    pub async fn run(self) -> Result<(), StreamClientError> {
        let Self {
            config,
            codec,
            registry,
            listeners,
            state,
            mut frame_rx,
            cancel,
        } = self;

        let ctx = SessionContext {
            config: &config,
            codec: &codec,
            registry: &registry,
            listeners: &listeners,
            state: &state,
            cancel: &cancel,
        };
        let mut policy = ReconnectPolicy::new(config.reconnect.clone());

        loop {
            if ctx.cancel.is_cancelled() {
                ctx.state.set(ConnectionState::Closed);
                tracing::info!("Quote stream cancelled");
                return Ok(());
            }

            match run_session(&ctx, &mut frame_rx, &mut policy).await {
                Ok(()) => {
                    ctx.state.set(ConnectionState::Closed);
                    tracing::info!("Quote stream closed");
                    return Ok(());
                }
                Err(error) => {
                    tracing::warn!(error = %error, "Gateway session ended");
                    emit_session_end(ctx.listeners, &error);

                    if ctx.cancel.is_cancelled() {
                        ctx.state.set(ConnectionState::Closed);
                        return Ok(());
                    }

                    if let Some(delay) = policy.next_delay() {
                        let attempt = policy.attempt_count();
                        ctx.state.set(ConnectionState::Reconnecting);
                        metrics::record_reconnect_attempt();
                        tracing::info!(
                            attempt,
                            delay_ms = delay.as_millis(),
                            "Reconnecting to gateway"
                        );

                        tokio::select! {
                            () = ctx.cancel.cancelled() => {
                                ctx.state.set(ConnectionState::Closed);
                                tracing::info!("Quote stream cancelled during reconnect delay");
                                return Ok(());
                            }
                            () = tokio::time::sleep(delay) => {}
                        }
                    } else {
                        let attempts = policy.attempt_count();
                        ctx.state.set(ConnectionState::Exhausted);
                        tracing::error!(attempts, "Reconnect budget exhausted; giving up");
                        ctx.listeners.emit(&StreamEvent::Exhausted { attempts });
                        return Err(StreamClientError::MaxReconnectAttemptsExceeded);
                    }
                }
            }
        }
    }
}

/// Shared borrows threaded through one socket session.
struct SessionContext<'a> {
    config: &'a StreamConfig,
    codec: &'a JsonCodec,
    registry: &'a SubscriptionRegistry,
    listeners: &'a EventListeners,
    state: &'a SharedState,
    cancel: &'a CancellationToken,
}

/// Map a session-ending error onto lifecycle events.
///
/// A failed connection attempt (socket never opened) is an `error`; a closed
/// session is a `close`; a mid-session transport failure is both, in that
/// order, since the error is what ends the session.
fn emit_session_end(listeners: &EventListeners, error: &StreamClientError) {
    match error {
        StreamClientError::ConnectionFailed(message) => {
            listeners.emit(&StreamEvent::Error {
                message: message.clone(),
            });
        }
        StreamClientError::ConnectionClosed { code } => {
            listeners.emit(&StreamEvent::Close { code: *code });
        }
        other => {
            listeners.emit(&StreamEvent::Error {
                message: other.to_string(),
            });
            listeners.emit(&StreamEvent::Close { code: None });
        }
    }
}

/// Connect and serve one socket session until it ends.
///
/// Returns `Ok(())` only on cancellation or facade teardown; every other
/// exit is an error that the caller maps to reconnect handling.
async fn run_session(
    ctx: &SessionContext<'_>,
    frame_rx: &mut mpsc::UnboundedReceiver<ControlFrame>,
    policy: &mut ReconnectPolicy,
) -> Result<(), StreamClientError> {
    ctx.state.set(ConnectionState::Connecting);
    tracing::info!(url = %ctx.config.url, "Connecting to market-data gateway");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(&ctx.config.url)
        .await
        .map_err(|e| StreamClientError::ConnectionFailed(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();

    policy.reset();
    ctx.state.set(ConnectionState::Open);
    tracing::info!("Gateway connection open");

    if let Some(token) = &ctx.config.token {
        send_frame(ctx.codec, &mut write, &ControlFrame::auth(token.expose())).await?;
    }

    // Deltas queued across the session boundary are stale; the replay below
    // reflects the authoritative registry.
    while frame_rx.try_recv().is_ok() {}

    for symbol in ctx.registry.symbols() {
        send_frame(ctx.codec, &mut write, &ControlFrame::subscribe(&symbol)).await?;
    }

    ctx.listeners.emit(&StreamEvent::Open);

    let mut ping = tokio::time::interval(ctx.config.ping_interval);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick of an interval completes immediately; consume it so
    // pings start one full interval after open.
    ping.tick().await;

    loop {
        tokio::select! {
            () = ctx.cancel.cancelled() => {
                let _ = write.send(close_frame()).await;
                return Ok(());
            }
            frame = frame_rx.recv() => {
                match frame {
                    Some(frame) => send_frame(ctx.codec, &mut write, &frame).await?,
                    None => {
                        // Every facade and subscription handle is gone;
                        // nothing can observe this stream anymore.
                        tracing::debug!("Facade dropped; closing gateway connection");
                        let _ = write.send(close_frame()).await;
                        return Ok(());
                    }
                }
            }
            _ = ping.tick() => {
                send_frame(ctx.codec, &mut write, &ControlFrame::Ping).await?;
            }
            message = read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => handle_text_frame(ctx, &text),
                    Some(Ok(Message::Ping(payload))) => {
                        write
                            .send(Message::Pong(payload))
                            .await
                            .map_err(|e| StreamClientError::SendFailed(e.to_string()))?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.as_ref().map(|f| u16::from(f.code));
                        tracing::info!(?code, "Gateway sent close frame");
                        return Err(StreamClientError::ConnectionClosed { code });
                    }
                    Some(Ok(_)) => {
                        // Binary and pong frames are ignored.
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Err(StreamClientError::ConnectionClosed { code: None });
                    }
                }
            }
        }
    }
}

/// Normal-closure frame for explicit teardown.
fn close_frame() -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "client disconnect".into(),
    }))
}

/// Serialize and send a control frame.
async fn send_frame<W>(
    codec: &JsonCodec,
    write: &mut W,
    frame: &ControlFrame,
) -> Result<(), StreamClientError>
where
    W: SinkExt<Message> + Unpin,
    W::Error: std::fmt::Display,
{
    let json = codec
        .encode(frame)
        .map_err(|e| StreamClientError::SendFailed(e.to_string()))?;

    tracing::debug!(frame = %json, "Sending control frame");

    write
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| StreamClientError::SendFailed(e.to_string()))
}

/// Decode and handle one inbound text frame.
///
/// Frame-level failures are logged and dropped; they never end the session.
fn handle_text_frame(ctx: &SessionContext<'_>, text: &str) {
    match ctx.codec.decode(text) {
        Ok(InboundMessage::Quote(quote)) => match Symbol::new(&quote.symbol) {
            Ok(symbol) => {
                let outcome = ctx.registry.dispatch(&symbol, &quote);
                metrics::record_quotes_delivered(outcome.delivered);
                if outcome.panicked > 0 {
                    metrics::record_callback_panics(outcome.panicked);
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "Dropping quote with unusable symbol");
                metrics::record_frame_dropped();
            }
        },
        Ok(InboundMessage::Heartbeat) => {
            tracing::trace!("Gateway heartbeat");
        }
        Ok(InboundMessage::AuthResult(result)) => {
            if result.success {
                tracing::info!("Gateway authentication successful");
            } else {
                let message = result
                    .message
                    .unwrap_or_else(|| "authentication failed".to_string());
                tracing::error!(error = %message, "Gateway authentication failed");
                ctx.listeners.emit(&StreamEvent::Error { message });
            }
        }
        Ok(InboundMessage::ServerError(error)) => {
            tracing::error!(code = ?error.code, msg = %error.message, "Gateway error");
            ctx.listeners.emit(&StreamEvent::Error {
                message: error.message,
            });
        }
        Ok(InboundMessage::Unknown(_)) => {
            tracing::trace!("Ignoring unrecognized frame");
        }
        Err(error) => {
            tracing::warn!(error = %error, "Dropping malformed frame");
            metrics::record_frame_dropped();
        }
    }
}
