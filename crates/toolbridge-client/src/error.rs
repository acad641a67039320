//! Error taxonomy for sessions, the tool registry and tool invocation.
//!
//! Callers never see raw I/O errors: transports report [`TransportError`],
//! which the session wraps as [`SessionError::TransportFailure`].

use std::time::Duration;

use thiserror::Error;
use toolbridge_protocol::CodecError;
use toolbridge_transport::TransportError;

use crate::session::SessionState;

/// A specialized `Result` type for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Failures of a [`Session`](crate::Session) operation.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SessionError {
    /// The byte stream failed, or the peer closed it.
    #[error("Transport failure: {0}")]
    TransportFailure(#[from] TransportError),

    /// The server did not answer `initialize` in time.
    #[error("Handshake timed out after {timeout:?}")]
    HandshakeTimeout {
        /// Time allowed for the handshake reply
        timeout: Duration,
    },

    /// The server answered `initialize` with a JSON-RPC error.
    #[error("Handshake rejected by server: {message} ({code})")]
    HandshakeRejected {
        /// JSON-RPC error code
        code: i32,
        /// Server-provided message
        message: String,
    },

    /// The operation needs a `Ready` session.
    #[error("Session is not ready (state: {state})")]
    NotReady {
        /// State the session was in
        state: SessionState,
    },

    /// `initialize` was already called on this session.
    #[error("Session already initialized")]
    AlreadyInitialized,

    /// The session was closed before or while the operation ran.
    #[error("Session closed")]
    SessionClosed,

    /// No reply arrived before the call's deadline. A late reply is discarded.
    #[error("{operation} timed out after {timeout:?}")]
    CallTimeout {
        /// Method, with the tool name for `tools/call`
        operation: String,
        /// Time allowed for the reply
        timeout: Duration,
    },

    /// The server answered with a JSON-RPC error.
    #[error("Server returned error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i32,
        /// Server-provided message
        message: String,
    },

    /// A frame could not be encoded, or a reply had the wrong shape.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl SessionError {
    /// Whether the error ends the session.
    ///
    /// A frame the transport rejected locally (too large, bad framing) fails
    /// only its own call.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::TransportFailure(e) => e.is_connection_error(),
            other => matches!(
                other,
                Self::HandshakeTimeout { .. }
                    | Self::HandshakeRejected { .. }
                    | Self::SessionClosed
            ),
        }
    }

    /// Whether retrying the same operation on the same session may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CallTimeout { .. })
    }
}

impl From<CodecError> for SessionError {
    fn from(err: CodecError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Failures building a [`ToolRegistry`](crate::ToolRegistry).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two listed tools share a name.
    #[error("Duplicate tool name in listing: {name}")]
    DuplicateToolName {
        /// The repeated name
        name: String,
    },
}

/// Failures of [`ToolInvoker::invoke`](crate::ToolInvoker::invoke).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvokeError {
    /// The registry has no tool by that name.
    #[error("Unknown tool: {tool}")]
    UnknownTool {
        /// Requested tool name
        tool: String,
    },

    /// Parameters are missing names the tool's schema requires.
    #[error("Invalid arguments for {tool}: missing required {missing:?}")]
    InvalidArguments {
        /// Tool name
        tool: String,
        /// Required parameter names that were absent
        missing: Vec<String>,
    },

    /// The tool ran and reported failure.
    #[error("Tool {tool} failed: {message}")]
    ToolExecution {
        /// Tool name
        tool: String,
        /// Concatenated text of the error content, possibly empty
        message: String,
    },

    /// The call never produced a tool result.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Failures of [`connect`](crate::connect) and
/// [`ToolRegistry::load`](crate::ToolRegistry::load).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectError {
    /// Handshake or listing failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The listing could not be turned into a registry.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
