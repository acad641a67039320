//! Values a session hands back to callers.

use std::fmt;

use serde::{Deserialize, Serialize};
use toolbridge_protocol::{
    CallToolResult, ClientCapabilities, Content, Implementation, InitializeResult,
    ServerCapabilities,
};

/// Lifecycle of a [`Session`](super::Session).
///
/// `Unopened -> Initializing -> Ready -> Closed`; any state may jump to
/// `Closed`, and `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, no I/O yet
    Unopened,
    /// Handshake in flight
    Initializing,
    /// Handshake done, calls accepted
    Ready,
    /// Torn down
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unopened => write!(f, "unopened"),
            Self::Initializing => write!(f, "initializing"),
            Self::Ready => write!(f, "ready"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Outcome of a successful handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySet {
    /// Protocol version the server chose
    pub protocol_version: String,
    /// Server identity
    pub server_info: Implementation,
    /// What this client declared
    pub client_capabilities: ClientCapabilities,
    /// What the server advertised
    pub server_capabilities: ServerCapabilities,
    /// Server usage hints, if any
    pub instructions: Option<String>,
}

impl CapabilitySet {
    pub(crate) fn negotiated(declared: ClientCapabilities, result: InitializeResult) -> Self {
        Self {
            protocol_version: result.protocol_version,
            server_info: result.server_info,
            client_capabilities: declared,
            server_capabilities: result.capabilities,
            instructions: result.instructions,
        }
    }

    /// Whether the server advertised tool support
    pub fn server_supports_tools(&self) -> bool {
        self.server_capabilities.tools.is_some()
    }
}

/// Result of a `tools/call`.
///
/// `Error` is a tool that ran and reported failure (`isError: true`), which
/// is distinct from a JSON-RPC error reply.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    /// Tool succeeded
    Ok(Vec<Content>),
    /// Tool reported an execution failure
    Error(Vec<Content>),
}

impl CallResult {
    /// Whether the tool reported failure
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Content items, in order
    pub fn content(&self) -> &[Content] {
        match self {
            Self::Ok(items) | Self::Error(items) => items,
        }
    }

    /// Concatenation of every text item, in order. Other kinds are skipped.
    pub fn text(&self) -> String {
        self.content().iter().filter_map(Content::as_text).collect()
    }
}

impl From<CallToolResult> for CallResult {
    fn from(result: CallToolResult) -> Self {
        if result.is_error == Some(true) {
            Self::Error(result.content)
        } else {
            Self::Ok(result.content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_call_result_from_wire() {
        let ok: CallToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "a"},
                {"type": "image", "data": "AA==", "mimeType": "image/png"},
                {"type": "hologram"},
                {"type": "text", "text": "b"}
            ]
        }))
        .unwrap();
        let result = CallResult::from(ok);
        assert!(!result.is_error());
        assert_eq!(result.content().len(), 4);
        assert_eq!(result.text(), "ab");

        let failed: CallToolResult = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "division by zero"}],
            "isError": true
        }))
        .unwrap();
        let result = CallResult::from(failed);
        assert!(result.is_error());
        assert_eq!(result.text(), "division by zero");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Ready.to_string(), "ready");
        assert_eq!(SessionState::Closed.to_string(), "closed");
    }
}
