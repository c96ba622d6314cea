// 7.0 config.rs: venue settings in one place. engine limits, margin ratios, market list.
// 7.1 loads from TOML. environment presets at the bottom.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::engine::EngineConfig;
use crate::market::MarketConfig;
use crate::types::MarketId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything needed to stand up an engine and its markets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub markets: Vec<MarketConfig>,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            markets: vec![MarketConfig::eth_perp()],
        }
    }
}

impl VenueConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: VenueConfig =
            toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml_str(&raw)?;
        info!(
            path = %path.display(),
            markets = config.markets.len(),
            "loaded venue config"
        );
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    // consistency checks across engine and markets
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;

        let mut seen: HashSet<MarketId> = HashSet::new();
        for market in &self.markets {
            if !seen.insert(market.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate market id {}",
                    market.id.0
                )));
            }
            market
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("market {}: {}", market.name, e)))?;
        }
        Ok(())
    }

    /** 7.2: testnet. cheap pool fee, looser margin so people can poke at it */
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.engine.margin.initial_margin_ratio = rust_decimal_macros::dec!(0.05); // 20x
        config.engine.margin.maintenance_margin_ratio = rust_decimal_macros::dec!(0.03);
        for market in &mut config.markets {
            market.name = format!("{} Testnet", market.name);
            market.fee_ppm = 500;
        }
        config
    }

    /** 7.3: mainnet. 1% pool fee, impact cap on, fresher oracle */
    pub fn mainnet_conservative() -> Self {
        let mut config = Self::default();
        config.engine.max_price_staleness_secs = 60;
        for market in &mut config.markets {
            market.fee_ppm = 10_000;
            market.tick_spacing = 200;
            market.max_tick_crossed = 1_000; // ~10% move per swap
        }
        config
    }
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> VenueConfig {
        match self {
            Environment::Development => VenueConfig::default(),
            Environment::Testnet => VenueConfig::testnet(),
            Environment::Mainnet => VenueConfig::mainnet_conservative(),
        }
    }
}
