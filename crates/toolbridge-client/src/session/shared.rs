//! State shared between session handles and the listener task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;
use toolbridge_protocol::{Codec, MessageId, ReplyKind, Root};
use toolbridge_transport::{
    Transport, TransportError, TransportMessage, TransportMessageMetadata, TransportResult,
};

use super::config::Capabilities;
use super::pending::{PendingCall, PendingTable};
use super::types::{CapabilitySet, SessionState};
use crate::error::{SessionError, SessionResult};

/// Everything guarded by the session lock.
///
/// State and the pending table sit under one lock so that registering a call
/// and closing the session can never interleave. Never held across `.await`.
#[derive(Debug)]
pub(crate) struct Core {
    pub(crate) state: SessionState,
    pub(crate) pending: PendingTable,
    pub(crate) capabilities: Option<CapabilitySet>,
    /// Flags sent in the handshake, once it has started
    pub(crate) declared: Option<Capabilities>,
}

impl Default for Core {
    fn default() -> Self {
        Self {
            state: SessionState::Unopened,
            pending: PendingTable::default(),
            capabilities: None,
            declared: None,
        }
    }
}

impl Core {
    /// Move to `Closed` and fail every pending call. Returns `false` if the
    /// session was already closed.
    pub(crate) fn close_with(&mut self, reason: impl Fn() -> SessionError) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        self.state = SessionState::Closed;
        let failed = self.pending.fail_all(reason);
        if failed > 0 {
            tracing::debug!(failed, "Failed pending requests on close");
        }
        true
    }

    pub(crate) fn answers_roots(&self) -> bool {
        self.declared.is_some_and(|caps| caps.roots)
    }
}

/// Session internals reachable from the listener.
#[derive(Debug)]
pub(crate) struct Shared<T: Transport> {
    pub(crate) transport: Arc<T>,
    pub(crate) codec: Arc<dyn Codec>,
    pub(crate) core: Arc<Mutex<Core>>,
    pub(crate) shutdown: Notify,
    pub(crate) roots: Vec<Root>,
    send_lock: tokio::sync::Mutex<()>,
    next_id: AtomicU64,
    released: AtomicBool,
}

impl<T: Transport> Shared<T> {
    pub(crate) fn new(transport: Arc<T>, codec: Arc<dyn Codec>, roots: Vec<Root>) -> Self {
        Self {
            transport,
            codec,
            core: Arc::new(Mutex::new(Core::default())),
            shutdown: Notify::new(),
            roots,
            send_lock: tokio::sync::Mutex::new(()),
            next_id: AtomicU64::new(1),
            released: AtomicBool::new(false),
        }
    }

    /// Fresh correlation id. Ids are never reused within a session.
    pub(crate) fn next_id(&self) -> MessageId {
        MessageId::from(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Check the state and register a pending request in one critical section.
    ///
    /// `initialize` is only accepted while `Initializing`; everything else
    /// needs `Ready`.
    pub(crate) fn register(
        &self,
        id: MessageId,
        kind: ReplyKind,
        operation: String,
        timeout: Duration,
    ) -> SessionResult<PendingCall> {
        let mut core = self.core.lock();
        let required = match kind {
            ReplyKind::Initialize => SessionState::Initializing,
            _ => SessionState::Ready,
        };
        let state = core.state;
        match state {
            SessionState::Closed => Err(SessionError::SessionClosed),
            state if state != required => Err(SessionError::NotReady { state }),
            _ => Ok(PendingCall::register(
                &self.core,
                &mut *core,
                id,
                kind,
                operation,
                timeout,
            )),
        }
    }

    /// Write one frame. Sends are serialized so frames never interleave.
    pub(crate) async fn send_frame(
        &self,
        payload: Bytes,
        correlation: Option<&MessageId>,
    ) -> TransportResult<()> {
        let mut metadata = TransportMessageMetadata::with_content_type(self.codec.content_type());
        if let Some(id) = correlation {
            metadata = metadata.correlated(id.to_string());
        }

        let _guard = self.send_lock.lock().await;
        self.transport
            .send(TransportMessage::with_metadata(payload, metadata))
            .await
    }

    /// The stream is gone: close the session and fail every pending call.
    pub(crate) fn fail_transport(&self, err: &TransportError) {
        let closed = self
            .core
            .lock()
            .close_with(|| SessionError::TransportFailure(err.clone()));
        if closed {
            tracing::warn!(error = %err, "Transport failed; session closed");
        }
    }

    /// A send or receive hit a dead stream: close the session, stop the
    /// listener and release the transport.
    pub(crate) async fn transport_lost(&self, err: &TransportError) {
        self.fail_transport(err);
        self.shutdown.notify_one();
        self.release_transport().await;
    }

    /// Disconnect the transport. Only the first call does anything.
    pub(crate) async fn release_transport(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        match self.transport.disconnect().await {
            Ok(()) => tracing::debug!("Transport released"),
            Err(e) => tracing::warn!(error = %e, "Transport disconnect failed"),
        }
    }
}
