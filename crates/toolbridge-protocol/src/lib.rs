//! # toolbridge-protocol
//!
//! JSON-RPC 2.0 envelopes and the tool subset of the Model Context Protocol,
//! as spoken by a tool-calling client.
//!
//! - [`jsonrpc`]: request, response and notification envelopes
//! - [`types`]: handshake, tool listing, tool call and roots payloads
//! - [`codec`]: the [`Codec`] trait and the default [`JsonCodec`]
//! - [`reply`]: [`ParsedMessage`], a response decoded for the request it answers
//!
//! ```rust
//! use toolbridge_protocol::{Codec, JsonCodec, JsonRpcMessage};
//!
//! let codec = JsonCodec::new();
//! let message = codec
//!     .decode_message(br#"{"jsonrpc":"2.0","method":"ping","id":"s1"}"#)
//!     .unwrap();
//! assert!(matches!(message, JsonRpcMessage::Request(_)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod jsonrpc;
pub mod reply;
pub mod types;

pub use codec::{Codec, CodecError, CodecResult, JsonCodec};
pub use jsonrpc::{
    JSONRPC_VERSION, JsonRpcError, JsonRpcErrorCode, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, JsonRpcResponsePayload, MessageId, ResponseId,
};
pub use reply::{ParsedMessage, ReplyKind};
pub use types::{
    CallToolRequest, CallToolResult, ClientCapabilities, Content, Implementation,
    InitializeRequest, InitializeResult, ListRootsResult, ListToolsRequest, ListToolsResult, Root,
    RootsCapability, ServerCapabilities, Tool, ToolSchema,
};

/// Protocol version this client speaks
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Method names used by the tool subset
pub mod methods {
    /// Handshake request
    pub const INITIALIZE: &str = "initialize";
    /// Handshake completion notification
    pub const INITIALIZED: &str = "notifications/initialized";
    /// Tool listing
    pub const TOOLS_LIST: &str = "tools/list";
    /// Tool invocation
    pub const TOOLS_CALL: &str = "tools/call";
    /// Liveness check, in either direction
    pub const PING: &str = "ping";
    /// Server asks for the client's roots
    pub const ROOTS_LIST: &str = "roots/list";
    /// Server's tool set changed
    pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
}
