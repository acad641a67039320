//! Typed view of responses, keyed by the request they answer.

use crate::codec::{CodecError, CodecResult};
use crate::jsonrpc::{JsonRpcError, JsonRpcResponse, JsonRpcResponsePayload, MessageId};
use crate::types::{CallToolResult, InitializeResult, ListToolsResult, Tool};
use serde::de::DeserializeOwned;

/// Which reply shape a pending request expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    /// `initialize`
    Initialize,
    /// `tools/list`
    ListTools,
    /// `tools/call`
    CallTool,
    /// `ping`
    Ping,
}

impl ReplyKind {
    /// Request method that produces this reply kind
    pub fn method(self) -> &'static str {
        match self {
            Self::Initialize => crate::methods::INITIALIZE,
            Self::ListTools => crate::methods::TOOLS_LIST,
            Self::CallTool => crate::methods::TOOLS_CALL,
            Self::Ping => crate::methods::PING,
        }
    }
}

/// A decoded response.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedMessage {
    /// Reply to `initialize`
    InitAck {
        /// Correlation id
        id: MessageId,
        /// Negotiated handshake result
        result: Box<InitializeResult>,
    },
    /// One page of `tools/list`
    ToolList {
        /// Correlation id
        id: MessageId,
        /// Tools that decoded; unusable entries are dropped
        tools: Vec<Tool>,
        /// Cursor for the next page
        next_cursor: Option<String>,
    },
    /// Reply to `tools/call`
    CallResult {
        /// Correlation id
        id: MessageId,
        /// Tool output
        result: CallToolResult,
    },
    /// Reply to `ping`
    Pong {
        /// Correlation id
        id: MessageId,
    },
    /// JSON-RPC error reply to any request
    Error {
        /// Correlation id
        id: MessageId,
        /// Error object
        error: JsonRpcError,
    },
}

impl ParsedMessage {
    /// Decode `response` as the reply shape `kind` expects.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] when the response carries a null id, and
    /// [`CodecError::UnexpectedReply`] when the result does not match `kind`.
    pub fn from_response(kind: ReplyKind, response: JsonRpcResponse) -> CodecResult<Self> {
        let Some(id) = response.id.0 else {
            return Err(CodecError::decode("response has a null id"));
        };

        let result = match response.payload {
            JsonRpcResponsePayload::Error { error } => return Ok(Self::Error { id, error }),
            JsonRpcResponsePayload::Success { result } => result,
        };

        Ok(match kind {
            ReplyKind::Initialize => Self::InitAck {
                id,
                result: Box::new(typed(kind, result)?),
            },
            ReplyKind::ListTools => {
                let page: ListToolsResult = typed(kind, result)?;
                Self::ToolList {
                    id,
                    tools: page
                        .tools
                        .into_iter()
                        .filter_map(Tool::from_listing_entry)
                        .collect(),
                    next_cursor: page.next_cursor.filter(|c| !c.is_empty()),
                }
            }
            ReplyKind::CallTool => Self::CallResult {
                id,
                result: typed(kind, result)?,
            },
            ReplyKind::Ping => Self::Pong { id },
        })
    }

    /// Correlation id of the request this answers
    pub fn id(&self) -> &MessageId {
        match self {
            Self::InitAck { id, .. }
            | Self::ToolList { id, .. }
            | Self::CallResult { id, .. }
            | Self::Pong { id }
            | Self::Error { id, .. } => id,
        }
    }
}

fn typed<T: DeserializeOwned>(kind: ReplyKind, result: serde_json::Value) -> CodecResult<T> {
    serde_json::from_value(result).map_err(|e| CodecError::UnexpectedReply {
        expected: kind.method(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn response(value: serde_json::Value) -> JsonRpcResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_init_ack() {
        let parsed = ParsedMessage::from_response(
            ReplyKind::Initialize,
            response(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "protocolVersion": "2025-06-18",
                    "capabilities": {"tools": {"listChanged": true}},
                    "serverInfo": {"name": "calc", "version": "2.1"}
                }
            })),
        )
        .unwrap();

        match parsed {
            ParsedMessage::InitAck { id, result } => {
                assert_eq!(id, MessageId::Number(1));
                assert_eq!(result.server_info.version, "2.1");
                assert_eq!(
                    result.capabilities.tools.unwrap().list_changed,
                    Some(true)
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_tool_list_drops_unnamed_and_keeps_cursor() {
        let parsed = ParsedMessage::from_response(
            ReplyKind::ListTools,
            response(json!({
                "jsonrpc": "2.0",
                "id": 2,
                "result": {
                    "tools": [
                        {"name": "add", "inputSchema": {"type": "object"}},
                        {"description": "nameless"},
                        {"name": "sub", "inputSchema": []}
                    ],
                    "nextCursor": "page-2"
                }
            })),
        )
        .unwrap();

        match parsed {
            ParsedMessage::ToolList {
                tools, next_cursor, ..
            } => {
                let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
                assert_eq!(names, vec!["add", "sub"]);
                assert!(tools[1].input_schema.is_empty());
                assert_eq!(next_cursor.as_deref(), Some("page-2"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_error_reply_wins_regardless_of_kind() {
        let parsed = ParsedMessage::from_response(
            ReplyKind::CallTool,
            response(json!({
                "jsonrpc": "2.0",
                "id": "x",
                "error": {"code": -32602, "message": "bad arguments"}
            })),
        )
        .unwrap();

        assert_eq!(parsed.id(), &MessageId::String("x".into()));
        assert!(matches!(parsed, ParsedMessage::Error { ref error, .. } if error.code == -32602));
    }

    #[test]
    fn test_mismatched_result_shape() {
        let err = ParsedMessage::from_response(
            ReplyKind::Initialize,
            response(json!({"jsonrpc": "2.0", "id": 1, "result": {"tools": []}})),
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedReply { expected: "initialize", .. }));
    }

    #[test]
    fn test_null_id_is_rejected() {
        let err = ParsedMessage::from_response(
            ReplyKind::Ping,
            response(json!({
                "jsonrpc": "2.0",
                "id": null,
                "error": {"code": -32700, "message": "Parse error"}
            })),
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }
}
