//! Immutable catalogue of the tools a server advertised.

use std::collections::HashMap;
use std::time::Duration;

use toolbridge_protocol::{Tool, ToolSchema};
use toolbridge_transport::Transport;

use crate::error::{ConnectError, RegistryError};
use crate::session::Session;

/// One advertised tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    /// Unique name within the registry
    pub name: String,
    /// Human-readable description; empty when the server gave none
    pub description: String,
    /// Parameter schema; empty when the server's was unusable
    pub schema: ToolSchema,
}

impl ToolDescriptor {
    /// Create a descriptor.
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: ToolSchema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
        }
    }

    /// Schema rendered as pretty-printed JSON
    pub fn schema_json(&self) -> String {
        self.schema.to_pretty_string()
    }

    /// Names the schema marks as required
    pub fn required_parameters(&self) -> impl Iterator<Item = &str> {
        self.schema.required()
    }
}

impl From<Tool> for ToolDescriptor {
    fn from(tool: Tool) -> Self {
        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            schema: tool.input_schema,
        }
    }
}

/// Name to descriptor lookup, built once from a listing.
///
/// Iteration follows listing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build a registry from listed tools.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateToolName`] if two tools share a name.
    pub fn from_listing(tools: Vec<ToolDescriptor>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(tools.len());
        for (position, tool) in tools.iter().enumerate() {
            if index.insert(tool.name.clone(), position).is_some() {
                return Err(RegistryError::DuplicateToolName {
                    name: tool.name.clone(),
                });
            }
        }
        Ok(Self { tools, index })
    }

    /// List the session's tools and build a registry from them.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::Session`] if listing fails and
    /// [`ConnectError::Registry`] if the listing has duplicate names.
    pub async fn load<T: Transport + 'static>(
        session: &Session<T>,
        timeout: Duration,
    ) -> Result<Self, ConnectError> {
        let tools = session.list_tools(timeout).await?;
        let registry = Self::from_listing(tools)?;
        tracing::debug!(tools = registry.len(), "Tool registry loaded");
        Ok(registry)
    }

    /// Descriptor for `name`
    pub fn describe(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&position| &self.tools[position])
    }

    /// Every descriptor, in listing order
    pub fn all(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Whether a tool called `name` exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tool names, in listing order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.name.as_str())
    }

    /// Number of tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the server listed no tools
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl<'a> IntoIterator for &'a ToolRegistry {
    type Item = &'a ToolDescriptor;
    type IntoIter = std::slice::Iter<'a, ToolDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.tools.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema(value: serde_json::Value) -> ToolSchema {
        match value {
            serde_json::Value::Object(map) => ToolSchema::from(map),
            _ => ToolSchema::empty(),
        }
    }

    #[test]
    fn test_lookup_and_order() {
        let registry = ToolRegistry::from_listing(vec![
            ToolDescriptor::new("echo", "Echo text back", schema(json!({"type": "object"}))),
            ToolDescriptor::new("add", "", ToolSchema::empty()),
        ])
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("add"));
        assert!(!registry.contains("sub"));
        assert_eq!(registry.describe("echo").unwrap().description, "Echo text back");
        assert!(registry.describe("missing").is_none());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["echo", "add"]);
        assert_eq!(
            registry.into_iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            vec!["echo", "add"]
        );
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = ToolRegistry::from_listing(vec![
            ToolDescriptor::new("echo", "first", ToolSchema::empty()),
            ToolDescriptor::new("echo", "second", ToolSchema::empty()),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateToolName {
                name: "echo".into()
            }
        );
    }

    #[test]
    fn test_empty_registry() {
        let registry = ToolRegistry::from_listing(Vec::new()).unwrap();
        assert!(registry.is_empty());
        assert!(registry.all().is_empty());
    }

    #[test]
    fn test_descriptor_from_tool() {
        let tool = Tool::from_listing_entry(json!({
            "name": "add",
            "inputSchema": {"type": "object", "required": ["a", "b"]}
        }))
        .unwrap();
        let descriptor = ToolDescriptor::from(tool);

        assert_eq!(descriptor.description, "");
        assert_eq!(descriptor.required_parameters().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(descriptor.schema_json().contains("\"required\""));
    }
}
