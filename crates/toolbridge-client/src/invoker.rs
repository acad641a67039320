//! Calls a tool by name and reduces its result to text.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use toolbridge_transport::Transport;

use crate::error::InvokeError;
use crate::registry::ToolRegistry;
use crate::session::Session;

/// Validates parameters against a [`ToolRegistry`], calls the tool, and
/// returns the concatenated text of its result.
///
/// Never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolInvoker {
    validate: bool,
}

impl Default for ToolInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolInvoker {
    /// Invoker that checks the tool exists and required parameters are present
    pub fn new() -> Self {
        Self { validate: true }
    }

    /// Invoker that sends every call as-is
    pub fn unchecked() -> Self {
        Self { validate: false }
    }

    /// Whether local validation is enabled
    pub fn validates(&self) -> bool {
        self.validate
    }

    /// Invoke `tool` and return the text of its result.
    ///
    /// Text items are concatenated in order with no separator; images,
    /// audio, resources and unknown kinds are ignored.
    ///
    /// # Errors
    ///
    /// - [`InvokeError::UnknownTool`] if validating and the registry has no such tool
    /// - [`InvokeError::InvalidArguments`] if validating and required parameters are missing
    /// - [`InvokeError::ToolExecution`] if the tool reports failure
    /// - [`InvokeError::Session`] for anything the session reports
    pub async fn invoke<T: Transport + 'static>(
        &self,
        session: &Session<T>,
        registry: &ToolRegistry,
        tool: &str,
        parameters: HashMap<String, Value>,
        timeout: Duration,
    ) -> Result<String, InvokeError> {
        if self.validate {
            check_parameters(registry, tool, &parameters)?;
        }

        let result = session.call(tool, parameters, timeout).await?;
        let text = result.text();
        if result.is_error() {
            tracing::debug!(tool, message = %text, "Tool reported failure");
            return Err(InvokeError::ToolExecution {
                tool: tool.to_string(),
                message: text,
            });
        }
        Ok(text)
    }
}

fn check_parameters(
    registry: &ToolRegistry,
    tool: &str,
    parameters: &HashMap<String, Value>,
) -> Result<(), InvokeError> {
    let Some(descriptor) = registry.describe(tool) else {
        return Err(InvokeError::UnknownTool {
            tool: tool.to_string(),
        });
    };

    let missing: Vec<String> = descriptor
        .required_parameters()
        .filter(|name| !parameters.contains_key(*name))
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(InvokeError::InvalidArguments {
            tool: tool.to_string(),
            missing,
        })
    }
}
