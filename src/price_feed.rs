// Price Feed Integration
//
// The engine reads one opaque round (price, timestamp, round id) per market when it
// values positions for the margin check. Where that round comes from (Chainlink,
// Pyth, an aggregator) is outside this crate; anything implementing PriceFeed works.

use crate::types::{MarketId, Price, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One oracle answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundData {
    pub price: Price,
    pub updated_at: Timestamp,
    pub round_id: u64,
}

impl RoundData {
    pub fn new(price: Price, updated_at: Timestamp, round_id: u64) -> Self {
        Self {
            price,
            updated_at,
            round_id,
        }
    }

    /// Older than `max_age_secs` at `now`. A round from the future is treated as fresh.
    pub fn is_stale(&self, now: Timestamp, max_age_secs: u64) -> bool {
        now.elapsed_since(&self.updated_at) > max_age_secs
    }
}

/// Read only oracle seam. Never mutated by the engine.
pub trait PriceFeed {
    fn latest_round(&self, market: MarketId) -> Option<RoundData>;
}

/// In memory feed with one round per market. Each update bumps the round id.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceFeed {
    rounds: HashMap<MarketId, RoundData>,
}

impl StaticPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&mut self, market: MarketId, price: Price, at: Timestamp) -> RoundData {
        let round_id = self
            .rounds
            .get(&market)
            .map(|r| r.round_id + 1)
            .unwrap_or(1);
        let round = RoundData::new(price, at, round_id);
        self.rounds.insert(market, round);
        round
    }

    pub fn clear(&mut self, market: MarketId) {
        self.rounds.remove(&market);
    }
}

impl PriceFeed for StaticPriceFeed {
    fn latest_round(&self, market: MarketId) -> Option<RoundData> {
        self.rounds.get(&market).copied()
    }
}

/// Feed that never has a price. Valuation then falls back to the pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPriceFeed;

impl PriceFeed for NoPriceFeed {
    fn latest_round(&self, _market: MarketId) -> Option<RoundData> {
        None
    }
}
