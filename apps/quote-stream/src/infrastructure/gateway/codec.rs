//! Gateway Frame Codec
//!
//! Decodes inbound JSON text frames into [`InboundMessage`] values.
//!
//! Decoding is deliberately forgiving: a frame that fails to decode is an
//! error for the *frame*, never for the connection. The connection task logs
//! and drops bad frames and keeps reading.

use super::messages::{AuthResultMessage, InboundMessage, QuoteMessage, ServerErrorMessage};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON parsing failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame was valid JSON but not an object.
    #[error("expected JSON object, got: {0}")]
    NotAnObject(String),
}

/// JSON codec for gateway frames.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame into an [`InboundMessage`].
    ///
    /// Frames are dispatched on their `type` tag. Untagged frames carrying a
    /// `symbol` field are quotes; the remaining cases fall back to
    /// [`InboundMessage::Unknown`] rather than failing, so unrecognized
    /// gateway extensions pass through harmlessly.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON object or if a tagged
    /// frame's body does not match its tag's schema.
    pub fn decode(&self, text: &str) -> Result<InboundMessage, CodecError> {
        let value: serde_json::Value = serde_json::from_str(text)?;

        if !value.is_object() {
            let preview: String = text.trim().chars().take(50).collect();
            return Err(CodecError::NotAnObject(preview));
        }

        let tag = value.get("type").and_then(serde_json::Value::as_str);

        let message = match tag {
            Some("heartbeat") => InboundMessage::Heartbeat,
            Some("error") => {
                let m: ServerErrorMessage = serde_json::from_value(value)?;
                InboundMessage::ServerError(m)
            }
            Some("auth_success") => InboundMessage::AuthResult(AuthResultMessage {
                success: true,
                message: value
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .map(String::from),
            }),
            Some("auth_error") => InboundMessage::AuthResult(AuthResultMessage {
                success: false,
                message: value
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .map(String::from),
            }),
            Some("quote") => {
                let m: QuoteMessage = serde_json::from_value(value)?;
                InboundMessage::Quote(m)
            }
            Some(_) => InboundMessage::Unknown(value),
            None if value.get("symbol").is_some() => {
                let m: QuoteMessage = serde_json::from_value(value)?;
                InboundMessage::Quote(m)
            }
            None => InboundMessage::Unknown(value),
        };

        Ok(message)
    }

    /// Encode a value to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode<T: serde::Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }
}
