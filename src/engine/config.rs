//! Engine configuration options.

use crate::config::ConfigError;
use crate::margin::MarginParams;
use serde::{Deserialize, Serialize};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Margin ratios applied when a trade adds exposure.
    pub margin: MarginParams,
    /// Oracle rounds older than this are ignored and the pool price is used instead.
    pub max_price_staleness_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            margin: MarginParams::default(),
            max_price_staleness_secs: 3_600,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_events == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_events must be greater than zero".to_string(),
            ));
        }
        self.margin
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
