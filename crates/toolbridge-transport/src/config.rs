//! Transport configuration types.

use serde::{Deserialize, Serialize};

/// Default ceiling for a single inbound frame.
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Default ceiling for a single outbound frame.
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Configuration for frame size limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound frame size in bytes.
    /// `None` = unlimited
    pub max_response_size: Option<usize>,

    /// Maximum outbound frame size in bytes.
    /// `None` = unlimited
    pub max_request_size: Option<usize>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_response_size: Some(DEFAULT_MAX_RESPONSE_SIZE),
            max_request_size: Some(DEFAULT_MAX_REQUEST_SIZE),
        }
    }
}

impl LimitsConfig {
    /// Create a configuration with no limits.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_response_size: None,
            max_request_size: None,
        }
    }

    /// Create a configuration with strict limits for untrusted servers.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            max_response_size: Some(1024 * 1024), // 1MB
            max_request_size: Some(256 * 1024),   // 256KB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_config_default() {
        let config = LimitsConfig::default();
        assert_eq!(config.max_response_size, Some(10 * 1024 * 1024));
        assert_eq!(config.max_request_size, Some(1024 * 1024));
    }

    #[test]
    fn test_limits_config_partial_deserialize() {
        let config: LimitsConfig =
            serde_json::from_str(r#"{"max_request_size": 2048}"#).unwrap();
        assert_eq!(config.max_request_size, Some(2048));
        assert_eq!(config.max_response_size, Some(DEFAULT_MAX_RESPONSE_SIZE));
    }
}
