//! The per-session listener task.
//!
//! It is the only reader of `transport.receive()`:
//!
//! - **Responses** are decoded for the pending request with the same id and
//!   handed to its slot. Replies for unknown or retired ids are dropped.
//! - **Requests** from the server (`ping`, `roots/list`) are answered from a
//!   spawned task so the listener never waits on a send.
//! - **Notifications** are logged.
//!
//! End of stream or a receive error closes the session and fails every
//! pending request with `TransportFailure`.

use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinHandle;
use toolbridge_protocol::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    ListRootsResult, ParsedMessage, methods,
};
use toolbridge_transport::{Transport, TransportError, TransportMessage};

use super::shared::Shared;
use crate::error::SessionError;

/// Start the listener. It runs until shutdown is signalled or the stream ends.
pub(crate) fn spawn_listener<T: Transport + 'static>(shared: Arc<Shared<T>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!(endpoint = ?shared.transport.endpoint(), "Session listener started");

        loop {
            tokio::select! {
                biased;

                () = shared.shutdown.notified() => {
                    tracing::debug!("Session listener shutting down");
                    break;
                }

                result = shared.transport.receive() => match result {
                    Ok(Some(message)) => route_frame(&shared, message),
                    Ok(None) => {
                        shared.fail_transport(&TransportError::ConnectionLost(
                            "peer closed the stream".to_string(),
                        ));
                        shared.release_transport().await;
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Transport receive failed");
                        shared.fail_transport(&e);
                        shared.release_transport().await;
                        break;
                    }
                },
            }
        }

        tracing::debug!("Session listener stopped");
    })
}

fn route_frame<T: Transport + 'static>(shared: &Arc<Shared<T>>, message: TransportMessage) {
    let decoded = match shared.codec.decode_message(&message.payload) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(error = %e, size = message.size(), "Dropping malformed frame");
            return;
        }
    };

    match decoded {
        JsonRpcMessage::Response(response) => {
            let Some(id) = response.id.0.clone() else {
                tracing::warn!(error = ?response.error(), "Received response with null id");
                return;
            };

            let Some(entry) = shared.core.lock().pending.take(&id) else {
                tracing::debug!(%id, "Discarding reply for unknown or retired request");
                return;
            };

            tracing::trace!(
                %id,
                operation = %entry.operation,
                elapsed_ms = entry.issued_at.elapsed().as_millis() as u64,
                "Routing reply"
            );
            let outcome = ParsedMessage::from_response(entry.kind, response).map_err(SessionError::from);
            entry.resolve(outcome);
        }
        JsonRpcMessage::Request(request) => {
            let shared = Arc::clone(shared);
            tokio::spawn(async move { answer_request(&shared, request).await });
        }
        JsonRpcMessage::Notification(notification) => log_notification(&notification),
    }
}

async fn answer_request<T: Transport>(shared: &Shared<T>, request: JsonRpcRequest) {
    tracing::debug!(method = %request.method, id = %request.id, "Server request");

    let answers_roots = shared.core.lock().answers_roots();
    let response = match request.method.as_str() {
        methods::PING => JsonRpcResponse::success(json!({}), request.id),
        methods::ROOTS_LIST if answers_roots => {
            let roots = ListRootsResult {
                roots: shared.roots.clone(),
            };
            match serde_json::to_value(roots) {
                Ok(result) => JsonRpcResponse::success(result, request.id),
                Err(e) => JsonRpcResponse::error_response(
                    JsonRpcError::internal_error(&e.to_string()),
                    request.id,
                ),
            }
        }
        other => {
            JsonRpcResponse::error_response(JsonRpcError::method_not_found(other), request.id)
        }
    };

    let id = response.id.0.clone();
    let frame = match shared.codec.encode_response(&response) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode reply to server request");
            return;
        }
    };
    if let Err(e) = shared.send_frame(frame, id.as_ref()).await {
        tracing::debug!(error = %e, "Could not answer server request");
        if e.is_connection_error() {
            shared.transport_lost(&e).await;
        }
    }
}

fn log_notification(notification: &JsonRpcNotification) {
    match notification.method.as_str() {
        methods::TOOLS_LIST_CHANGED => {
            tracing::info!("Server tool list changed; existing registries are not refreshed");
        }
        method => tracing::debug!(method, "Server notification"),
    }
}
