//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Default bound on nested-record depth.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Engine-wide settings. Per-call behaviour lives in
/// [`Options`](crate::Options).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deepest nested record the traversal enters before failing with
    /// [`VaultError::DepthExceeded`](crate::VaultError::DepthExceeded).
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON object; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn reads_max_depth() {
        let config = EngineConfig::from_json(r#"{"max_depth": 4}"#).unwrap();
        assert_eq!(config.max_depth, 4);
    }

    #[test]
    fn rejects_wrong_type() {
        assert!(EngineConfig::from_json(r#"{"max_depth": "deep"}"#).is_err());
    }
}
