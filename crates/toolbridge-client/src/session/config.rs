//! Session configuration types
//!
//! Everything here is plain data with serde defaults, so a configuration can
//! be embedded in a caller's own config file.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Map;
use toolbridge_protocol::{ClientCapabilities, Implementation, Root, RootsCapability};

/// Flags the client declares in the handshake.
///
/// Sent once and never renegotiated. The default declares `roots` with
/// `listChanged`, and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// Answer `roots/list` requests
    pub roots: bool,
    /// Advertise `listChanged` on the roots capability
    pub roots_list_changed: bool,
    /// Advertise sampling support
    pub sampling: bool,
    /// Advertise elicitation support
    pub elicitation: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            roots: true,
            roots_list_changed: true,
            sampling: false,
            elicitation: false,
        }
    }
}

impl Capabilities {
    /// Declare nothing at all
    pub fn none() -> Self {
        Self {
            roots: false,
            roots_list_changed: false,
            sampling: false,
            elicitation: false,
        }
    }

    /// Enable or disable roots support
    pub fn with_roots(mut self, enabled: bool) -> Self {
        self.roots = enabled;
        self
    }

    /// Enable or disable sampling support
    pub fn with_sampling(mut self, enabled: bool) -> Self {
        self.sampling = enabled;
        self
    }

    /// Enable or disable elicitation support
    pub fn with_elicitation(mut self, enabled: bool) -> Self {
        self.elicitation = enabled;
        self
    }

    /// Wire form sent in `initialize`
    pub fn to_client_capabilities(&self) -> ClientCapabilities {
        ClientCapabilities {
            roots: self.roots.then(|| RootsCapability {
                list_changed: self.roots_list_changed.then_some(true),
            }),
            sampling: self.sampling.then(Map::new),
            elicitation: self.elicitation.then(Map::new),
        }
    }
}

/// Timeouts applied by [`connect`](crate::connect) and available to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Bound on `Transport::connect`
    #[serde(with = "millis")]
    pub connect: Duration,
    /// Bound on the `initialize` reply
    #[serde(with = "millis")]
    pub initialize: Duration,
    /// Default bound on every other request
    #[serde(with = "millis")]
    pub request: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            initialize: Duration::from_secs(10),
            request: Duration::from_secs(10),
        }
    }
}

impl TimeoutConfig {
    /// Short timeouts for local servers
    pub fn fast() -> Self {
        Self {
            connect: Duration::from_secs(5),
            initialize: Duration::from_secs(2),
            request: Duration::from_secs(5),
        }
    }

    /// Long timeouts for slow tools
    pub fn patient() -> Self {
        Self {
            connect: Duration::from_secs(60),
            initialize: Duration::from_secs(30),
            request: Duration::from_secs(120),
        }
    }
}

/// Configuration of a [`Session`](super::Session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// `clientInfo` sent in the handshake
    pub client_info: Implementation,
    /// Declared capabilities
    pub capabilities: Capabilities,
    /// Roots returned from `roots/list`
    pub roots: Vec<Root>,
    /// Connect, handshake and request timeouts
    pub timeouts: TimeoutConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            client_info: Implementation::new("toolbridge-client", env!("CARGO_PKG_VERSION")),
            capabilities: Capabilities::default(),
            roots: Vec::new(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_default_capabilities_declare_roots_only() {
        let wire = serde_json::to_value(Capabilities::default().to_client_capabilities()).unwrap();
        assert_eq!(wire, json!({"roots": {"listChanged": true}}));

        let wire = serde_json::to_value(Capabilities::none().to_client_capabilities()).unwrap();
        assert_eq!(wire, json!({}));

        let wire = serde_json::to_value(
            Capabilities::none()
                .with_sampling(true)
                .to_client_capabilities(),
        )
        .unwrap();
        assert_eq!(wire, json!({"sampling": {}}));
    }

    #[test]
    fn test_timeout_defaults() {
        let timeouts = TimeoutConfig::default();
        assert_eq!(timeouts.connect, Duration::from_secs(30));
        assert_eq!(timeouts.initialize, Duration::from_secs(10));
        assert_eq!(timeouts.request, Duration::from_secs(10));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SessionConfig = serde_json::from_value(json!({
            "timeouts": {"request": 2500},
            "roots": [{"uri": "file:///work", "name": "work"}]
        }))
        .unwrap();

        assert_eq!(config.client_info.name, "toolbridge-client");
        assert_eq!(config.timeouts.request, Duration::from_millis(2500));
        assert_eq!(config.timeouts.connect, Duration::from_secs(30));
        assert_eq!(config.roots, vec![Root::new("file:///work", "work")]);
        assert!(config.capabilities.roots);
    }
}
