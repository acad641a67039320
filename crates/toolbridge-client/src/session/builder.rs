//! Fluent construction of a [`Session`].

use std::sync::Arc;
use std::time::Duration;

use toolbridge_protocol::{Codec, Implementation, JsonCodec, Root};
use toolbridge_transport::Transport;

use super::config::{Capabilities, SessionConfig, TimeoutConfig};
use super::core::Session;

/// Builder for configuring and opening a [`Session`].
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use toolbridge_client::{Root, SessionBuilder};
///
/// let builder = SessionBuilder::new()
///     .with_client_info("my-agent", "1.2.0")
///     .with_root(Root::new("file:///workspace", "workspace"))
///     .with_request_timeout(Duration::from_secs(30));
///
/// assert_eq!(builder.config().client_info.name, "my-agent");
/// assert_eq!(builder.config().timeouts.request, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    config: SessionConfig,
    codec: Arc<dyn Codec>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    /// Builder with the default configuration and the JSON codec
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            codec: Arc::new(JsonCodec::new()),
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: SessionConfig) -> Self {
        Self {
            config,
            ..Self::new()
        }
    }

    /// Set the `clientInfo` identity
    pub fn with_client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.client_info = Implementation::new(name, version);
        self
    }

    /// Replace the declared capabilities
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    /// Enable or disable roots support
    pub fn with_roots_capability(mut self, enabled: bool) -> Self {
        self.config.capabilities.roots = enabled;
        self
    }

    /// Enable or disable sampling support
    pub fn with_sampling(mut self, enabled: bool) -> Self {
        self.config.capabilities.sampling = enabled;
        self
    }

    /// Enable or disable elicitation support
    pub fn with_elicitation(mut self, enabled: bool) -> Self {
        self.config.capabilities.elicitation = enabled;
        self
    }

    /// Add a root returned from `roots/list`
    pub fn with_root(mut self, root: Root) -> Self {
        self.config.roots.push(root);
        self
    }

    /// Replace all timeouts
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    /// Set the default per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.request = timeout;
        self
    }

    /// Use a different wire codec
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Configuration built so far
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open an unopened session over `transport`.
    pub fn build<T: Transport + 'static>(self, transport: T) -> Session<T> {
        Session::from_parts(Arc::new(transport), self.codec, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder_flags() {
        let builder = SessionBuilder::new()
            .with_roots_capability(false)
            .with_sampling(true)
            .with_timeouts(TimeoutConfig::fast());

        let caps = builder.config().capabilities;
        assert!(!caps.roots);
        assert!(caps.sampling);
        assert!(!caps.elicitation);
        assert_eq!(builder.config().timeouts, TimeoutConfig::fast());
    }

    #[test]
    fn test_from_config_keeps_values() {
        let config = SessionConfig {
            roots: vec![Root::new("file:///a", "a")],
            ..SessionConfig::default()
        };
        let builder = SessionBuilder::from_config(config.clone());
        assert_eq!(builder.config(), &config);
    }
}
