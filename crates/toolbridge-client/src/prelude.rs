//! Common imports
//!
//! ```rust
//! use toolbridge_client::prelude::*;
//!
//! let config = SessionConfig::default();
//! assert_eq!(config.timeouts, TimeoutConfig::default());
//! ```

pub use crate::VERSION;

pub use crate::{
    CallResult, Capabilities, CapabilitySet, ConnectError, ContentItem, InvokeError,
    RegistryError, Root, Session, SessionBuilder, SessionConfig, SessionError, SessionResult,
    SessionState, TimeoutConfig, ToolDescriptor, ToolInvoker, ToolRegistry, ToolSchema, connect,
};

pub use toolbridge_transport::{StdioTransport, Transport, TransportError};
