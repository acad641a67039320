//! Tool operations on a ready session.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde_json::Value;
use toolbridge_protocol::{CallToolRequest, ListToolsRequest, ParsedMessage, ReplyKind, methods};
use toolbridge_transport::Transport;

use super::core::{Session, unexpected};
use super::types::CallResult;
use crate::error::{SessionError, SessionResult};
use crate::registry::ToolDescriptor;

impl<T: Transport + 'static> Session<T> {
    /// List every tool the server offers, following `nextCursor` until the
    /// listing is exhausted.
    ///
    /// Each page is bounded by `timeout`. Entries without a usable name are
    /// skipped, and a schema that is not a JSON object becomes an empty one.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotReady`] / [`SessionError::SessionClosed`] outside `Ready`
    /// - [`SessionError::CallTimeout`] if a page does not arrive in time
    /// - [`SessionError::Rpc`] if the server answers with a JSON-RPC error
    /// - [`SessionError::Protocol`] if the server repeats a cursor
    pub async fn list_tools(&self, timeout: Duration) -> SessionResult<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut seen_cursors = HashSet::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = serde_json::to_value(ListToolsRequest {
                cursor: cursor.clone(),
            })?;
            let page = self
                .request(
                    ReplyKind::ListTools,
                    Some(params),
                    methods::TOOLS_LIST.to_string(),
                    timeout,
                )
                .await?;

            let next_cursor = match page {
                ParsedMessage::ToolList {
                    tools: page_tools,
                    next_cursor,
                    ..
                } => {
                    tools.extend(page_tools.into_iter().map(ToolDescriptor::from));
                    next_cursor
                }
                ParsedMessage::Error { error, .. } => {
                    return Err(SessionError::Rpc {
                        code: error.code,
                        message: error.message,
                    });
                }
                other => return Err(unexpected(methods::TOOLS_LIST, &other)),
            };

            match next_cursor {
                Some(next) if !seen_cursors.insert(next.clone()) => {
                    return Err(SessionError::Protocol(format!(
                        "server repeated pagination cursor {next:?}"
                    )));
                }
                Some(next) => {
                    tracing::debug!(cursor = %next, collected = tools.len(), "Fetching next tool page");
                    cursor = Some(next);
                }
                None => break,
            }
        }

        tracing::debug!(count = tools.len(), "Listed tools");
        Ok(tools)
    }

    /// Invoke `tool` with `parameters` and wait up to `timeout` for the result.
    ///
    /// A tool that runs and reports failure comes back as
    /// [`CallResult::Error`], not as an `Err`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotReady`] / [`SessionError::SessionClosed`] outside `Ready`
    /// - [`SessionError::CallTimeout`] if no reply arrives in time; a late
    ///   reply is discarded
    /// - [`SessionError::TransportFailure`] if the stream fails first
    /// - [`SessionError::Rpc`] if the server answers with a JSON-RPC error
    pub async fn call(
        &self,
        tool: &str,
        parameters: HashMap<String, Value>,
        timeout: Duration,
    ) -> SessionResult<CallResult> {
        let params = serde_json::to_value(CallToolRequest {
            name: tool.to_string(),
            arguments: parameters,
        })?;

        let reply = self
            .request(
                ReplyKind::CallTool,
                Some(params),
                format!("{}({tool})", methods::TOOLS_CALL),
                timeout,
            )
            .await?;

        match reply {
            ParsedMessage::CallResult { result, .. } => Ok(CallResult::from(result)),
            ParsedMessage::Error { error, .. } => Err(SessionError::Rpc {
                code: error.code,
                message: error.message,
            }),
            other => Err(unexpected(methods::TOOLS_CALL, &other)),
        }
    }

    /// Check that the server is responsive.
    ///
    /// # Errors
    ///
    /// Same conditions as [`call`](Self::call).
    pub async fn ping(&self, timeout: Duration) -> SessionResult<()> {
        match self
            .request(ReplyKind::Ping, None, methods::PING.to_string(), timeout)
            .await?
        {
            ParsedMessage::Pong { .. } => Ok(()),
            ParsedMessage::Error { error, .. } => Err(SessionError::Rpc {
                code: error.code,
                message: error.message,
            }),
            other => Err(unexpected(methods::PING, &other)),
        }
    }
}
