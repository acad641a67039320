//! Wire types for the tool subset of the Model Context Protocol.
//!
//! Only what a tool-calling client exchanges is modelled here: the
//! initialization handshake, tool listing, tool calls and the roots reply.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

// =============================================================================
// Handshake
// =============================================================================

/// Name and version of a protocol participant (`clientInfo` / `serverInfo`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    /// Machine-readable name
    pub name: String,
    /// Version string
    pub version: String,
    /// Human-readable title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Implementation {
    /// Create a new implementation identity.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            title: None,
        }
    }
}

/// `roots` capability declared by the client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootsCapability {
    /// Whether the client emits `notifications/roots/list_changed`
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Capabilities the client declares during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Filesystem roots support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,
    /// LLM sampling support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<Map<String, Value>>,
    /// Elicitation support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<Map<String, Value>>,
}

/// Capability entry with an optional `listChanged` flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListChangedCapability {
    /// Whether the server emits list-changed notifications
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// `resources` capability advertised by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesCapability {
    /// Whether the server supports subscriptions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    /// Whether the server emits list-changed notifications
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Capabilities advertised by the server in its `initialize` reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ListChangedCapability>,
    /// Prompt support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ListChangedCapability>,
    /// Resource support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    /// Server-side logging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<Map<String, Value>>,
    /// Argument completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<Map<String, Value>>,
    /// Anything this client does not model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Map<String, Value>>,
}

/// Parameters of the `initialize` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    /// Protocol version the client speaks
    pub protocol_version: String,
    /// Declared client capabilities
    pub capabilities: ClientCapabilities,
    /// Client identity
    pub client_info: Implementation,
}

/// Result of the `initialize` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version chosen by the server
    pub protocol_version: String,
    /// Server capabilities
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Server identity
    pub server_info: Implementation,
    /// Usage hints for the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

// =============================================================================
// Tools
// =============================================================================

/// JSON Schema object describing a tool's parameters.
///
/// Kept opaque; equality is structural.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolSchema(pub Map<String, Value>);

impl ToolSchema {
    /// Schema with no keys
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the schema has no keys
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names listed in the schema's `required` array
    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.0
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }

    /// The schema's `properties` object, if any
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.0.get("properties").and_then(Value::as_object)
    }

    /// Indented JSON rendering
    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    /// Borrow the underlying JSON object
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for ToolSchema {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A tool as advertised in a `tools/list` page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name (machine-readable identifier)
    pub name: String,
    /// Human-readable title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Tool description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for input parameters
    #[serde(rename = "inputSchema", default)]
    pub input_schema: ToolSchema,
}

impl Tool {
    /// Decode one entry of a `tools/list` page without failing the page.
    ///
    /// Entries without a string `name` yield `None`. A missing or non-object
    /// `inputSchema` degrades to an empty schema.
    pub fn from_listing_entry(entry: Value) -> Option<Self> {
        let Value::Object(mut object) = entry else {
            tracing::warn!("Skipping tool listing entry that is not an object");
            return None;
        };

        let name = match object.remove("name") {
            Some(Value::String(name)) if !name.is_empty() => name,
            _ => {
                tracing::warn!("Skipping tool listing entry without a name");
                return None;
            }
        };

        let input_schema = match object.remove("inputSchema") {
            Some(Value::Object(map)) => ToolSchema(map),
            Some(other) => {
                tracing::warn!(
                    tool = %name,
                    kind = json_kind(&other),
                    "Tool input schema is not an object, using an empty schema"
                );
                ToolSchema::empty()
            }
            None => {
                tracing::warn!(tool = %name, "Tool has no input schema, using an empty schema");
                ToolSchema::empty()
            }
        };

        let text = |value: Option<Value>| match value {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };

        Some(Self {
            name,
            title: text(object.remove("title")),
            description: text(object.remove("description")),
            input_schema,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parameters of a `tools/list` request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListToolsRequest {
    /// Pagination cursor from the previous page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// One page of a `tools/list` reply.
///
/// Entries stay raw so one bad tool never fails the page; see
/// [`Tool::from_listing_entry`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Raw tool entries
    #[serde(default)]
    pub tools: Vec<Value>,
    /// Cursor for the next page
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Parameters of a `tools/call` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolRequest {
    /// Tool to invoke
    pub name: String,
    /// Tool arguments
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub arguments: HashMap<String, Value>,
}

/// Result of a `tools/call` request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Result content, in order. A malformed item decodes as
    /// [`Content::Unknown`] instead of failing the result.
    #[serde(default, deserialize_with = "content_items")]
    pub content: Vec<Content>,
    /// Whether the tool reported an execution failure
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    /// Optional structured output
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

// =============================================================================
// Content
// =============================================================================

/// Content block in a tool result.
///
/// Kinds this client does not model decode as [`Content::Unknown`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    /// Text content
    #[serde(rename = "text")]
    Text(TextContent),
    /// Image content (base64 encoded)
    #[serde(rename = "image")]
    Image(ImageContent),
    /// Audio content (base64 encoded)
    #[serde(rename = "audio")]
    Audio(AudioContent),
    /// Reference to a resource without embedding it
    #[serde(rename = "resource_link")]
    ResourceLink(ResourceLink),
    /// Embedded resource content
    #[serde(rename = "resource")]
    Resource(EmbeddedResource),
    /// Any other content kind
    #[serde(other)]
    Unknown,
}

impl Content {
    /// Create text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextContent { text: text.into() })
    }

    /// Decode one content item. An item that does not fit its declared kind
    /// becomes `Unknown`.
    pub fn from_item(item: Value) -> Self {
        match serde_json::from_value(item) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed content item, treating it as unknown");
                Self::Unknown
            }
        }
    }

    /// The text of a `Text` block
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(&t.text),
            _ => None,
        }
    }
}

fn content_items<'de, D>(deserializer: D) -> Result<Vec<Content>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Vec::<Value>::deserialize(deserializer)?;
    Ok(items.into_iter().map(Content::from_item).collect())
}

/// Text content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    /// The text
    pub text: String,
}

/// Image content (base64 encoded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageContent {
    /// Base64-encoded image data
    pub data: String,
    /// MIME type of the image
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Audio content (base64 encoded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioContent {
    /// Base64-encoded audio data
    pub data: String,
    /// MIME type of the audio
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Resource link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLink {
    /// Resource URI
    pub uri: String,
    /// Resource name
    pub name: String,
    /// Resource description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type of the resource content
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Embedded resource; contents are kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedResource {
    /// The resource contents (`uri` plus `text` or `blob`)
    pub resource: Value,
}

// =============================================================================
// Roots
// =============================================================================

/// A filesystem root exposed to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    /// Root URI, normally `file://`
    pub uri: String,
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Root {
    /// Create a root with a display name.
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: Some(name.into()),
        }
    }
}

/// Result of a server-initiated `roots/list` request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRootsResult {
    /// Exposed roots
    pub roots: Vec<Root>,
}
