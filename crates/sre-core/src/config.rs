//! SRE Configuration
//!
//! Defines runtime limits for the Shards Runtime Engine.
//! Configuration specifies constraints only; enforcement is handled by the engine
//! (nesting depth) and by the mesh (tick pacing, iteration cap).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SreResult;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SreConfig {
    /// Maximum depth of nested sequence activation (`Sub`, `Repeat`, ...)
    pub max_nesting_depth: usize,

    /// Mesh idle sleep granularity, in milliseconds
    pub tick_interval_ms: u64,

    /// Maximum number of mesh ticks, 0 means unlimited
    pub max_iterations: u64,

    /// Default tracing filter used by hosts that install a subscriber
    pub log_filter: String,

    /// Report re-exposed variables as advisory composition errors
    pub warn_on_variable_shadowing: bool,
}

impl Default for SreConfig {
    fn default() -> Self {
        SreConfig {
            max_nesting_depth: 64,
            tick_interval_ms: 16,
            max_iterations: 0,
            log_filter: "info".to_string(),
            warn_on_variable_shadowing: true,
        }
    }
}

impl SreConfig {
    /// Create a new configuration with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON; missing fields keep their defaults
    pub fn from_json_str(text: &str) -> SreResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a JSON configuration file
    pub fn load(path: &Path) -> SreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = SreConfig::from_json_str(r#"{ "max_nesting_depth": 3 }"#).expect("parse failed");
        assert_eq!(cfg.max_nesting_depth, 3);
        assert_eq!(cfg.tick_interval_ms, 16);
        assert!(cfg.warn_on_variable_shadowing);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(SreConfig::from_json_str("{ nope").is_err());
    }
}
