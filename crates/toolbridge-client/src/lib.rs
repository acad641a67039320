//! # toolbridge-client
//!
//! Client side of a tool-calling session with a JSON-RPC tool server: the
//! initialization handshake, an immutable [`ToolRegistry`] of what the server
//! offers, and correlated tool calls with per-call timeouts.
//!
//! ## Architecture
//!
//! ```text
//! ToolInvoker  (validation, text reduction)
//!        ↓
//! Session<T>   (handshake, pending table, listener task)
//!        ↓
//! Codec        (toolbridge-protocol)
//!        ↓
//! Transport    (toolbridge-transport)
//! ```
//!
//! One listener task per session owns `transport.receive()`. Every request
//! registers a pending entry keyed by a fresh id before it is sent, and the
//! listener hands each reply to the entry with the same id, so replies may
//! arrive in any order and concurrent callers never block each other.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::time::Duration;
//! use serde_json::json;
//! use toolbridge_client::{SessionConfig, ToolInvoker, connect};
//! use toolbridge_transport::StdioTransport;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut child = tokio::process::Command::new("my-tool-server")
//!     .stdin(std::process::Stdio::piped())
//!     .stdout(std::process::Stdio::piped())
//!     .spawn()?;
//! let transport = StdioTransport::from_child(&mut child)?;
//!
//! let (session, registry) = connect(transport, SessionConfig::default()).await?;
//! for tool in &registry {
//!     println!("{}: {}", tool.name, tool.description);
//! }
//!
//! let params = HashMap::from([("text".to_string(), json!("hi"))]);
//! let text = ToolInvoker::new()
//!     .invoke(&session, &registry, "echo", params, Duration::from_secs(10))
//!     .await?;
//! println!("{text}");
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod error;
pub mod invoker;
pub mod prelude;
pub mod registry;
pub mod session;

pub use error::{ConnectError, InvokeError, RegistryError, SessionError, SessionResult};
pub use invoker::ToolInvoker;
pub use registry::{ToolDescriptor, ToolRegistry};
pub use session::{
    CallResult, Capabilities, CapabilitySet, Session, SessionBuilder, SessionConfig, SessionState,
    TimeoutConfig,
};

pub use toolbridge_protocol::{Content as ContentItem, Implementation, Root, ToolSchema};
pub use toolbridge_transport::Transport;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Open a session over `transport`, perform the handshake and load the
/// tool registry.
///
/// Uses `config.capabilities`, `config.timeouts.initialize` for the handshake
/// and `config.timeouts.request` for each listing page. If anything fails
/// after the handshake started, the session is closed before the error is
/// returned.
///
/// # Errors
///
/// Returns [`ConnectError::Session`] if the handshake or listing fails, and
/// [`ConnectError::Registry`] if the server lists duplicate tool names.
pub async fn connect<T: Transport + 'static>(
    transport: T,
    config: SessionConfig,
) -> Result<(Session<T>, ToolRegistry), ConnectError> {
    let capabilities = config.capabilities;
    let timeouts = config.timeouts;
    let session = Session::open_with_config(transport, config);

    session
        .initialize(&capabilities, timeouts.initialize)
        .await?;

    match ToolRegistry::load(&session, timeouts.request).await {
        Ok(registry) => Ok((session, registry)),
        Err(e) => {
            tracing::warn!(error = %e, "Tool listing failed; closing session");
            session.close().await;
            Err(e)
        }
    }
}
