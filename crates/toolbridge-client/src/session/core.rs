//! The caller-facing `Session<T>` handle and its lifecycle.
//!
//! `Session<T>` is cheaply cloneable: every clone shares one transport, one
//! pending table and one listener task.
//!
//! ```text
//! open ──► Unopened ──initialize──► Initializing ──ack──► Ready
//!              │                         │                  │
//!              └──────── close / failure ┴──────────────────┴──► Closed
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use toolbridge_protocol::{
    Codec, InitializeRequest, JsonCodec, JsonRpcNotification, JsonRpcRequest, ParsedMessage,
    PROTOCOL_VERSION, ReplyKind, methods,
};
use toolbridge_transport::{Transport, TransportError, TransportMetrics};

use super::builder::SessionBuilder;
use super::config::{Capabilities, SessionConfig};
use super::dispatcher::spawn_listener;
use super::shared::Shared;
use super::types::{CapabilitySet, SessionState};
use crate::error::{SessionError, SessionResult};

pub(super) struct SessionInner<T: Transport + 'static> {
    pub(super) shared: Arc<Shared<T>>,
    pub(super) config: SessionConfig,
    /// Listener handle. Also serializes connect-and-spawn against close.
    listener: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport + 'static> Drop for SessionInner<T> {
    fn drop(&mut self) {
        // Last handle gone: let the listener exit.
        self.shared.shutdown.notify_one();
    }
}

/// A client session with one tool server.
///
/// Created [`Unopened`](SessionState::Unopened); [`initialize`](Self::initialize)
/// performs the handshake, after which tools can be listed and called from
/// any number of tasks concurrently. Replies are matched to requests by id,
/// so they may arrive in any order.
///
/// # Examples
///
/// ```rust,no_run
/// use std::collections::HashMap;
/// use std::time::Duration;
/// use toolbridge_client::{Capabilities, Session};
/// use toolbridge_transport::StdioTransport;
///
/// # async fn example(transport: StdioTransport) -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::open(transport);
/// let caps = session
///     .initialize(&Capabilities::default(), Duration::from_secs(10))
///     .await?;
/// println!("connected to {}", caps.server_info.name);
///
/// let result = session
///     .call("echo", HashMap::new(), Duration::from_secs(10))
///     .await?;
/// println!("{}", result.text());
///
/// session.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Session<T: Transport + 'static> {
    pub(super) inner: Arc<SessionInner<T>>,
}

impl<T: Transport + 'static> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport + 'static> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .field("endpoint", &self.inner.shared.transport.endpoint())
            .field("codec", &self.inner.shared.codec.name())
            .finish()
    }
}

impl<T: Transport + 'static> Session<T> {
    /// Wrap `transport` in a new session with the default configuration.
    /// No I/O happens until [`initialize`](Self::initialize).
    pub fn open(transport: T) -> Self {
        Self::open_with_config(transport, SessionConfig::default())
    }

    /// Wrap `transport` in a new session with `config`.
    pub fn open_with_config(transport: T, config: SessionConfig) -> Self {
        Self::from_parts(Arc::new(transport), Arc::new(JsonCodec::new()), config)
    }

    /// Start a [`SessionBuilder`].
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub(super) fn from_parts(transport: Arc<T>, codec: Arc<dyn Codec>, config: SessionConfig) -> Self {
        let shared = Arc::new(Shared::new(transport, codec, config.roots.clone()));
        Self {
            inner: Arc::new(SessionInner {
                shared,
                config,
                listener: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Perform the handshake.
    ///
    /// Connects the transport if needed, starts the listener, sends
    /// `initialize` with `capabilities` and waits up to `timeout` for the
    /// server's reply, then sends `notifications/initialized`. Any failure
    /// closes the session.
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyInitialized`] if a handshake was already started
    /// - [`SessionError::SessionClosed`] if the session was closed first
    /// - [`SessionError::TransportFailure`] if connecting or sending fails, or
    ///   the stream ends before the reply
    /// - [`SessionError::HandshakeRejected`] on a JSON-RPC error reply
    /// - [`SessionError::HandshakeTimeout`] if no reply arrives in time
    pub async fn initialize(
        &self,
        capabilities: &Capabilities,
        timeout: Duration,
    ) -> SessionResult<CapabilitySet> {
        {
            let mut core = self.inner.shared.core.lock();
            let state = core.state;
            match state {
                SessionState::Unopened => {
                    core.state = SessionState::Initializing;
                    core.declared = Some(*capabilities);
                }
                SessionState::Closed => return Err(SessionError::SessionClosed),
                SessionState::Initializing | SessionState::Ready => {
                    return Err(SessionError::AlreadyInitialized);
                }
            }
        }

        match self.handshake(capabilities, timeout).await {
            Ok(negotiated) => {
                tracing::info!(
                    server = %negotiated.server_info.name,
                    server_version = %negotiated.server_info.version,
                    protocol_version = %negotiated.protocol_version,
                    "Session ready"
                );
                Ok(negotiated)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Handshake failed");
                self.close().await;
                Err(e)
            }
        }
    }

    async fn handshake(
        &self,
        capabilities: &Capabilities,
        timeout: Duration,
    ) -> SessionResult<CapabilitySet> {
        self.start().await?;

        let declared = capabilities.to_client_capabilities();
        let request = InitializeRequest {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: declared.clone(),
            client_info: self.inner.config.client_info.clone(),
        };
        let params = serde_json::to_value(request)?;

        let result = match self
            .request(ReplyKind::Initialize, Some(params), methods::INITIALIZE.to_string(), timeout)
            .await
        {
            Ok(ParsedMessage::InitAck { result, .. }) => *result,
            Ok(ParsedMessage::Error { error, .. }) => {
                return Err(SessionError::HandshakeRejected {
                    code: error.code,
                    message: error.message,
                });
            }
            Ok(other) => return Err(unexpected(methods::INITIALIZE, &other)),
            Err(SessionError::CallTimeout { timeout, .. }) => {
                return Err(SessionError::HandshakeTimeout { timeout });
            }
            Err(e) => return Err(e),
        };

        let initialized = JsonRpcNotification::without_params(methods::INITIALIZED);
        let frame = self.inner.shared.codec.encode_notification(&initialized)?;
        if let Err(e) = self.inner.shared.send_frame(frame, None).await {
            if e.is_connection_error() {
                self.inner.shared.transport_lost(&e).await;
            }
            return Err(e.into());
        }

        let negotiated = CapabilitySet::negotiated(declared, result);
        let mut core = self.inner.shared.core.lock();
        if core.state != SessionState::Initializing {
            return Err(SessionError::SessionClosed);
        }
        core.state = SessionState::Ready;
        core.capabilities = Some(negotiated.clone());
        Ok(negotiated)
    }

    /// Connect the transport and spawn the listener.
    ///
    /// Runs under the listener lock so a concurrent `close` waits for it and
    /// then releases whatever was opened.
    async fn start(&self) -> SessionResult<()> {
        let mut listener = self.inner.listener.lock().await;
        let shared = &self.inner.shared;
        if shared.core.lock().state == SessionState::Closed {
            return Err(SessionError::SessionClosed);
        }

        if !shared.transport.is_connected().await {
            let limit = self.inner.config.timeouts.connect;
            tracing::debug!(endpoint = ?shared.transport.endpoint(), "Connecting transport");
            match tokio::time::timeout(limit, shared.transport.connect()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    return Err(SessionError::TransportFailure(
                        TransportError::ConnectionFailed(format!(
                            "connect timed out after {limit:?}"
                        )),
                    ));
                }
            }
        }

        if shared.core.lock().state == SessionState::Closed {
            return Err(SessionError::SessionClosed);
        }
        *listener = Some(spawn_listener(Arc::clone(shared)));
        Ok(())
    }

    /// Send one request and wait up to `timeout` for its reply.
    pub(super) async fn request(
        &self,
        kind: ReplyKind,
        params: Option<Value>,
        operation: String,
        timeout: Duration,
    ) -> SessionResult<ParsedMessage> {
        let shared = &self.inner.shared;
        let id = shared.next_id();
        let frame = shared
            .codec
            .encode_request(&JsonRpcRequest::new(kind.method(), params, id.clone()))?;

        let call = shared.register(id, kind, operation, timeout)?;
        tracing::trace!(id = %call.id(), method = kind.method(), "Sending request");
        if let Err(e) = shared.send_frame(frame, Some(call.id())).await {
            drop(call);
            if e.is_connection_error() {
                shared.transport_lost(&e).await;
            }
            return Err(e.into());
        }
        call.wait().await
    }

    /// Tear the session down.
    ///
    /// Idempotent and safe to call concurrently: marks the session `Closed`,
    /// fails pending calls with [`SessionError::SessionClosed`], waits for the
    /// listener to stop, then disconnects the transport exactly once. Every
    /// caller returns only after the transport has been released.
    pub async fn close(&self) {
        let closed = self
            .inner
            .shared
            .core
            .lock()
            .close_with(|| SessionError::SessionClosed);
        if closed {
            tracing::debug!("Closing session");
        }

        self.inner.shared.shutdown.notify_one();

        let mut listener = self.inner.listener.lock().await;
        if let Some(handle) = listener.take()
            && let Err(e) = handle.await
        {
            tracing::error!(error = %e, "Session listener panicked");
        }
        self.inner.shared.release_transport().await;
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.inner.shared.core.lock().state
    }

    /// Negotiated capabilities, once the handshake has completed
    pub fn capabilities(&self) -> Option<CapabilitySet> {
        self.inner.shared.core.lock().capabilities.clone()
    }

    /// Number of requests still waiting for a reply
    pub fn pending_count(&self) -> usize {
        self.inner.shared.core.lock().pending.len()
    }

    /// Configuration the session was opened with
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Snapshot of the transport's counters
    pub async fn transport_metrics(&self) -> TransportMetrics {
        self.inner.shared.transport.metrics().await
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.inner.shared.transport
    }
}

pub(super) fn unexpected(method: &str, reply: &ParsedMessage) -> SessionError {
    SessionError::Protocol(format!("unexpected reply to {method}: {reply:?}"))
}
