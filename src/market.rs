//! Market configuration and state.
//!
//! A market is a single base/quote pair backed by its own concentrated
//! liquidity pool. Identity is fixed at registration; the price impact cap
//! can be changed afterwards.

use crate::liquidity::{ConcentratedPool, LiquidityPool, PoolError};
use crate::math::price_from_sqrt_x96;
use crate::math::swap_math::FEE_DENOMINATOR;
use crate::math::tick_math::MAX_TICK;
use crate::types::{MarketId, Price, SignedSize, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Market status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarketStatus {
    /// Market is open for trading
    #[default]
    Active,
    /// Trading paused (e.g. during an incident)
    Paused,
    /// Market is closed permanently
    Closed,
}

/// Market configuration. Everything except `max_tick_crossed` is fixed once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub id: MarketId,
    /// Human-readable name (e.g., "ETH-PERP")
    pub name: String,
    /// Base asset symbol (e.g., "ETH")
    pub base_asset: String,
    /// Quote asset symbol (e.g., "USD")
    pub quote_asset: String,
    /// Pool fee on the input token, parts per million
    pub fee_ppm: u32,
    pub tick_spacing: i32,
    /// Most ticks a single swap may move the price. 0 = no cap
    #[serde(default)]
    pub max_tick_crossed: u32,
}

impl MarketConfig {
    /// Default ETH-PERP market: 0.1% fee, spacing 60, no impact cap
    pub fn eth_perp() -> Self {
        Self {
            id: MarketId(1),
            name: "ETH-PERP".to_string(),
            base_asset: "ETH".to_string(),
            quote_asset: "USD".to_string(),
            fee_ppm: 1_000,
            tick_spacing: 60,
            max_tick_crossed: 0,
        }
    }

    pub fn validate(&self) -> Result<(), MarketError> {
        if self.name.trim().is_empty() {
            return Err(MarketError::InvalidConfig("name must not be empty".to_string()));
        }
        if self.fee_ppm >= FEE_DENOMINATOR {
            return Err(MarketError::InvalidConfig(format!(
                "fee_ppm {} must be below {}",
                self.fee_ppm, FEE_DENOMINATOR
            )));
        }
        if self.tick_spacing <= 0 || self.tick_spacing > MAX_TICK {
            return Err(MarketError::InvalidConfig(format!(
                "tick_spacing {} out of range",
                self.tick_spacing
            )));
        }
        if self.max_tick_crossed > (2 * MAX_TICK) as u32 {
            return Err(MarketError::InvalidConfig(format!(
                "max_tick_crossed {} exceeds the tick range",
                self.max_tick_crossed
            )));
        }
        Ok(())
    }
}

/// Dynamic market state. One owned object per market, only touched through the engine.
#[derive(Debug, Clone)]
pub struct MarketState {
    pub config: MarketConfig,
    pub status: MarketStatus,
    pub pool: ConcentratedPool,
    /// Sum of long sizes
    pub open_interest_long: Decimal,
    /// Sum of short sizes (positive)
    pub open_interest_short: Decimal,
    /// Last average fill price
    pub last_trade_price: Option<Price>,
    /// Cumulative quote volume
    pub volume: Decimal,
    pub trade_count: u64,
    pub last_updated: Timestamp,
}

impl MarketState {
    pub fn new(config: MarketConfig, timestamp: Timestamp) -> Result<Self, MarketError> {
        config.validate()?;
        let pool = ConcentratedPool::new(config.fee_ppm, config.tick_spacing)?;
        Ok(Self {
            config,
            status: MarketStatus::Active,
            pool,
            open_interest_long: Decimal::ZERO,
            open_interest_short: Decimal::ZERO,
            last_trade_price: None,
            volume: Decimal::ZERO,
            trade_count: 0,
            last_updated: timestamp,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == MarketStatus::Active
    }

    /// Spot price of the pool, None before initialization
    pub fn pool_price(&self) -> Option<Price> {
        self.pool
            .slot()
            .and_then(|slot| price_from_sqrt_x96(slot.sqrt_price_x96).ok())
    }

    /// Update open interest from one trader's size change
    pub fn update_open_interest(&mut self, old_size: SignedSize, new_size: SignedSize) {
        let long = |s: Decimal| s.max(Decimal::ZERO);
        let short = |s: Decimal| (-s).max(Decimal::ZERO);
        self.open_interest_long += long(new_size.value()) - long(old_size.value());
        self.open_interest_short += short(new_size.value()) - short(old_size.value());
    }

    /// Record a trade
    pub fn record_trade(&mut self, price: Option<Price>, quote_volume: Decimal, timestamp: Timestamp) {
        if price.is_some() {
            self.last_trade_price = price;
        }
        self.volume += quote_volume;
        self.trade_count += 1;
        self.last_updated = timestamp;
    }

    /// Long minus short open interest. Traders trade against the pool so this is the pool's exposure.
    pub fn net_open_interest(&self) -> Decimal {
        self.open_interest_long - self.open_interest_short
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketError {
    #[error("Invalid market config: {0}")]
    InvalidConfig(String),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
}
