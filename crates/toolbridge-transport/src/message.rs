//! Transport message types.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One frame sent or received over a transport.
///
/// The payload is opaque to the transport; the session's codec gives it
/// meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    /// The binary payload of the message.
    pub payload: Bytes,

    /// Metadata associated with the message.
    pub metadata: TransportMessageMetadata,
}

impl TransportMessage {
    /// Creates a new `TransportMessage` from a payload.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            metadata: TransportMessageMetadata::default(),
        }
    }

    /// Creates a new `TransportMessage` with the given payload and metadata.
    pub fn with_metadata(payload: impl Into<Bytes>, metadata: TransportMessageMetadata) -> Self {
        Self {
            payload: payload.into(),
            metadata,
        }
    }

    /// Returns the size of the message payload in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Returns the content type of the message, if specified.
    pub fn content_type(&self) -> Option<&str> {
        self.metadata.content_type.as_deref()
    }

    /// Returns the correlation ID of the message, if specified.
    pub fn correlation_id(&self) -> Option<&str> {
        self.metadata.correlation_id.as_deref()
    }
}

/// Metadata associated with a `TransportMessage`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMessageMetadata {
    /// The MIME type of the message payload (e.g., "application/json").
    pub content_type: Option<String>,

    /// Request id the frame belongs to, for tracing.
    pub correlation_id: Option<String>,
}

impl TransportMessageMetadata {
    /// Creates metadata with a content type.
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            ..Default::default()
        }
    }

    /// Sets the correlation ID.
    #[must_use]
    pub fn correlated(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_message_creation() {
        let msg = TransportMessage::new("test payload");
        assert_eq!(msg.size(), 12);
        assert_eq!(msg.content_type(), None);
    }

    #[test]
    fn test_transport_message_metadata() {
        let metadata = TransportMessageMetadata::with_content_type("application/json").correlated("7");
        let msg = TransportMessage::with_metadata(Bytes::from_static(b"{}"), metadata);

        assert_eq!(msg.content_type(), Some("application/json"));
        assert_eq!(msg.correlation_id(), Some("7"));
    }
}
