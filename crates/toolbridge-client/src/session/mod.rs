//! Session core
//!
//! - `core`: the `Session<T>` handle, handshake and teardown
//! - `operations`: `list_tools`, `call` and `ping`
//! - `dispatcher`: the background listener that routes inbound frames
//! - `pending`: outstanding requests and their wait handles
//! - `shared`: state shared between handles and the listener
//! - `config` / `builder`: configuration and fluent construction
//! - `types`: values returned to callers

mod builder;
mod config;
mod core;
mod dispatcher;
mod operations;
mod pending;
mod shared;
mod types;

pub use builder::SessionBuilder;
pub use config::{Capabilities, SessionConfig, TimeoutConfig};
pub use self::core::Session;
pub use types::{CallResult, CapabilitySet, SessionState};
