//! Wire codec for JSON-RPC frames.
//!
//! A [`Codec`] turns envelopes into frame payloads and back. The session keeps
//! one behind an `Arc<dyn Codec>`, so the trait stays object safe: it works on
//! the concrete envelope types rather than generic `T: Serialize`.

use bytes::Bytes;
use serde::Serialize;

use crate::jsonrpc::{JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Wire format codec error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Envelope could not be serialized
    #[error("encode: {0}")]
    Encode(String),

    /// Frame is not a well-formed JSON-RPC message
    #[error("decode: {0}")]
    Decode(String),

    /// Response result does not match the shape the request expects
    #[error("unexpected {expected} reply: {message}")]
    UnexpectedReply {
        /// Reply kind that was expected
        expected: &'static str,
        /// Deserialization failure
        message: String,
    },
}

impl CodecError {
    /// Create an encoding error
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }

    /// Create a decoding error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Wire format codec trait
///
/// `Send + Sync` because one instance is shared by the caller-facing session
/// handle and its background listener.
pub trait Codec: Send + Sync + std::fmt::Debug {
    /// Encode an outbound request
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the request cannot be serialized.
    fn encode_request(&self, request: &JsonRpcRequest) -> CodecResult<Bytes>;

    /// Encode an outbound notification
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the notification cannot be serialized.
    fn encode_notification(&self, notification: &JsonRpcNotification) -> CodecResult<Bytes>;

    /// Encode a reply to a server-initiated request
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the response cannot be serialized.
    fn encode_response(&self, response: &JsonRpcResponse) -> CodecResult<Bytes>;

    /// Decode one inbound frame
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] for malformed or unclassifiable frames.
    fn decode_message(&self, bytes: &[u8]) -> CodecResult<JsonRpcMessage>;

    /// Get the content type for this codec (e.g., "application/json")
    fn content_type(&self) -> &'static str;

    /// Get codec name for debugging
    fn name(&self) -> &'static str;
}

/// JSON codec using serde_json
///
/// Always emits compact single-line JSON so every frame fits on one line.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec
    pub fn new() -> Self {
        Self
    }

    fn encode_value<T: Serialize>(value: &T) -> CodecResult<Bytes> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| CodecError::encode(e.to_string()))
    }
}

impl Codec for JsonCodec {
    fn encode_request(&self, request: &JsonRpcRequest) -> CodecResult<Bytes> {
        Self::encode_value(request)
    }

    fn encode_notification(&self, notification: &JsonRpcNotification) -> CodecResult<Bytes> {
        Self::encode_value(notification)
    }

    fn encode_response(&self, response: &JsonRpcResponse) -> CodecResult<Bytes> {
        Self::encode_value(response)
    }

    fn decode_message(&self, bytes: &[u8]) -> CodecResult<JsonRpcMessage> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| CodecError::decode(e.to_string()))?;
        JsonRpcMessage::from_value(value).map_err(|e| CodecError::decode(e.to_string()))
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
