//! # toolbridge-transport
//!
//! The [`Transport`] abstraction a toolbridge session talks through, and
//! [`StdioTransport`], which frames messages as newline-delimited lines over
//! any `AsyncRead`/`AsyncWrite` pair.
//!
//! ## Overview
//!
//! - **Traits**: [`Transport`]
//! - **Types**: [`TransportType`], [`TransportState`], [`TransportMessage`]
//! - **Errors**: [`TransportError`], [`TransportResult`]
//! - **Config**: [`LimitsConfig`]
//! - **Metrics**: [`TransportMetrics`], [`AtomicMetrics`]
//!
//! Custom transports implement the trait with `async_trait`:
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use toolbridge_transport::{Transport, TransportMessage, TransportResult};
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     fn transport_type(&self) -> TransportType { TransportType::Memory }
//!     // ... other trait methods
//! }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

mod config;
mod error;
mod message;
mod metrics;
mod stdio;
mod traits;
mod types;

pub use config::{DEFAULT_MAX_REQUEST_SIZE, DEFAULT_MAX_RESPONSE_SIZE, LimitsConfig};
pub use error::{TransportError, TransportResult, validate_request_size, validate_response_size};
pub use message::{TransportMessage, TransportMessageMetadata};
pub use metrics::{AtomicMetrics, TransportMetrics};
pub use stdio::StdioTransport;
pub use traits::Transport;
pub use types::{TransportState, TransportType};
