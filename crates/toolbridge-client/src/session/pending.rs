//! Outstanding requests and the caller-side wait handle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use toolbridge_protocol::{MessageId, ParsedMessage, ReplyKind};

use super::shared::Core;
use crate::error::{SessionError, SessionResult};

type Slot = oneshot::Sender<SessionResult<ParsedMessage>>;

/// One request waiting for its reply.
#[derive(Debug)]
pub(crate) struct PendingEntry {
    /// Reply shape the listener decodes into
    pub(crate) kind: ReplyKind,
    /// Method, plus tool name for `tools/call`
    pub(crate) operation: String,
    pub(crate) issued_at: Instant,
    slot: Slot,
}

impl PendingEntry {
    /// Hand the outcome to the waiting caller. A caller that already gave up
    /// is not an error.
    pub(crate) fn resolve(self, outcome: SessionResult<ParsedMessage>) {
        if self.slot.send(outcome).is_err() {
            tracing::trace!(
                operation = %self.operation,
                "Caller stopped waiting before the reply was delivered"
            );
        }
    }
}

/// Correlation id to pending entry. Only ever touched under the core lock.
#[derive(Debug, Default)]
pub(crate) struct PendingTable {
    entries: HashMap<MessageId, PendingEntry>,
}

impl PendingTable {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn take(&mut self, id: &MessageId) -> Option<PendingEntry> {
        self.entries.remove(id)
    }

    /// Resolve every entry with an error built by `reason`. Returns how many
    /// callers were woken.
    pub(crate) fn fail_all(&mut self, reason: impl Fn() -> SessionError) -> usize {
        let drained = self.entries.len();
        for (_, entry) in self.entries.drain() {
            entry.resolve(Err(reason()));
        }
        drained
    }

    /// Register `id` and return the receiving half of its slot.
    fn insert(
        &mut self,
        id: MessageId,
        kind: ReplyKind,
        operation: String,
    ) -> oneshot::Receiver<SessionResult<ParsedMessage>> {
        let (slot, rx) = oneshot::channel();
        self.entries.insert(
            id,
            PendingEntry {
                kind,
                operation,
                issued_at: Instant::now(),
                slot,
            },
        );
        rx
    }
}

/// Caller's handle on a registered request.
///
/// Dropping it, whether after a reply, a timeout or a cancelled future,
/// removes the table entry, so a late reply finds nothing and is discarded.
#[derive(Debug)]
pub(crate) struct PendingCall {
    id: MessageId,
    operation: String,
    timeout: Duration,
    deadline: Instant,
    rx: oneshot::Receiver<SessionResult<ParsedMessage>>,
    core: Arc<Mutex<Core>>,
}

impl PendingCall {
    /// Insert a new entry into `core`'s table. The caller has already
    /// checked the session state under the same guard.
    pub(crate) fn register(
        core: &Arc<Mutex<Core>>,
        guard: &mut Core,
        id: MessageId,
        kind: ReplyKind,
        operation: String,
        timeout: Duration,
    ) -> Self {
        let rx = guard.pending.insert(id.clone(), kind, operation.clone());
        Self {
            id,
            operation,
            timeout,
            deadline: Instant::now() + timeout,
            rx,
            core: Arc::clone(core),
        }
    }

    pub(crate) fn id(&self) -> &MessageId {
        &self.id
    }

    /// Wait for the reply until the deadline.
    pub(crate) async fn wait(mut self) -> SessionResult<ParsedMessage> {
        let received = tokio::time::timeout_at(self.deadline, &mut self.rx).await;
        match received {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(SessionError::SessionClosed),
            Err(_) => {
                tracing::debug!(id = %self.id, operation = %self.operation, "Request timed out");
                Err(SessionError::CallTimeout {
                    operation: std::mem::take(&mut self.operation),
                    timeout: self.timeout,
                })
            }
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.core.lock().pending.take(&self.id);
    }
}
