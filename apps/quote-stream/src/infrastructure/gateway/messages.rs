//! Gateway Wire Messages
//!
//! Frame types for the JSON protocol spoken with the market-data gateway.
//!
//! # Outbound Control Frames
//!
//! ```json
//! {"type": "subscribe", "symbol": "AAPL"}
//! {"type": "unsubscribe", "symbol": "AAPL"}
//! {"type": "auth", "token": "..."}
//! {"type": "ping"}
//! ```
//!
//! # Inbound Frames
//!
//! Inbound frames are tagged by a `type` field where the gateway sends one
//! (`heartbeat`, `error`, `auth_success`, `auth_error`). Anything else that
//! carries a `symbol` field is a quote; its schema beyond `symbol` is owned
//! by the gateway and passed through verbatim. Everything else decodes to
//! [`InboundMessage::Unknown`].

use serde::{Deserialize, Serialize};

pub use crate::domain::streaming::QuoteMessage;

// =============================================================================
// Outbound Control Frames
// =============================================================================

/// A control frame sent to the gateway.
///
/// Control frames are fire-and-forget; the protocol has no ack channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// Start pushing quotes for a symbol.
    Subscribe {
        /// Normalized symbol to subscribe.
        symbol: String,
    },
    /// Stop pushing quotes for a symbol.
    Unsubscribe {
        /// Normalized symbol to unsubscribe.
        symbol: String,
    },
    /// Authenticate the connection.
    Auth {
        /// Bearer token from the session store.
        token: String,
    },
    /// Application-level keepalive.
    Ping,
}

impl ControlFrame {
    /// Build a subscribe frame for a symbol.
    #[must_use]
    pub fn subscribe(symbol: &crate::domain::streaming::Symbol) -> Self {
        Self::Subscribe {
            symbol: symbol.as_str().to_string(),
        }
    }

    /// Build an unsubscribe frame for a symbol.
    #[must_use]
    pub fn unsubscribe(symbol: &crate::domain::streaming::Symbol) -> Self {
        Self::Unsubscribe {
            symbol: symbol.as_str().to_string(),
        }
    }

    /// Build an auth frame.
    #[must_use]
    pub fn auth(token: &str) -> Self {
        Self::Auth {
            token: token.to_string(),
        }
    }

    /// Serialize the frame to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Inbound Frames
// =============================================================================

/// Authentication outcome reported by the gateway.
///
/// # Wire Format (JSON)
/// ```json
/// {"type": "auth_success"}
/// {"type": "auth_error", "message": "token expired"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResultMessage {
    /// Whether authentication succeeded.
    pub success: bool,

    /// Optional detail from the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Server-side error report.
///
/// # Wire Format (JSON)
/// ```json
/// {"type": "error", "message": "subscription limit exceeded"}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerErrorMessage {
    /// Error description.
    #[serde(default)]
    pub message: String,

    /// Optional numeric error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// A quote for one symbol.
    Quote(QuoteMessage),
    /// Gateway keepalive; dropped after logging.
    Heartbeat,
    /// Authentication outcome.
    AuthResult(AuthResultMessage),
    /// Server-side error report.
    ServerError(ServerErrorMessage),
    /// A frame this client does not understand, kept raw.
    Unknown(serde_json::Value),
}

// =============================================================================
// Tests
// =============================================================================
