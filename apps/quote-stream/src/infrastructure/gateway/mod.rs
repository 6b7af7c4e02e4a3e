//! Market-Data Gateway Adapter
//!
//! WebSocket client for the NAPS market-data gateway:
//!
//! - `messages`: wire frame types (JSON)
//! - `codec`: inbound frame decoding with an unknown-frame fallback
//! - `reconnect`: bounded linear backoff policy
//! - `client`: the connection task and its configuration

pub mod client;
pub mod codec;
pub mod messages;
pub mod reconnect;

pub use client::{AuthToken, ConnectionTask, StreamClientError, StreamConfig};
pub use codec::{CodecError, JsonCodec};
pub use messages::{
    AuthResultMessage, ControlFrame, InboundMessage, QuoteMessage, ServerErrorMessage,
};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
