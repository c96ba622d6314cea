// 8.0 engine/core.rs: main engine. holds all markets, the position ledger and the collaborators.

use super::config::EngineConfig;
use super::results::{EngineError, LiquidityResult};
use crate::collateral::{CollateralLedger, Vault};
use crate::events::{
    Event, EventId, EventPayload, LiquidityChangedEvent, MarketAddedEvent, MarketStatusChangedEvent,
    PoolInitializedEvent,
};
use crate::market::{MarketConfig, MarketState, MarketStatus};
use crate::math::{from_wei, price_from_sqrt_x96, sqrt_price_x96_from_price, to_wei, MathError};
use crate::position::{Position, PositionLedger};
use crate::price_feed::{PriceFeed, StaticPriceFeed};
use crate::types::{AccountId, MarketId, Price, Timestamp};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};

/** 8.1: main engine struct. all state lives here. one request at a time via &mut self */
#[derive(Debug)]
pub struct Engine<C = Vault, F = StaticPriceFeed> {
    pub(super) config: EngineConfig,
    pub(super) markets: HashMap<MarketId, MarketState>,
    pub(super) positions: PositionLedger,
    pub(super) collateral: C,
    pub(super) price_feed: F,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
}

impl Engine<Vault, StaticPriceFeed> {
    /// Engine with an in-memory vault and price feed.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(config, Vault::new(), StaticPriceFeed::new())
    }
}

impl<C: CollateralLedger, F: PriceFeed> Engine<C, F> {
    pub fn new(config: EngineConfig, collateral: C, price_feed: F) -> Self {
        Self {
            config,
            markets: HashMap::new(),
            positions: PositionLedger::new(),
            collateral,
            price_feed,
            events: Vec::new(),
            next_event_id: 1,
            current_time: Timestamp::from_secs(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.current_time = self.current_time.saturating_add(secs);
    }

    pub fn add_market(&mut self, config: MarketConfig) -> Result<MarketId, EngineError> {
        let market_id = config.id;
        if self.markets.contains_key(&market_id) {
            return Err(EngineError::MarketAlreadyExists(market_id));
        }
        let state = MarketState::new(config, self.current_time)?;
        let payload = MarketAddedEvent {
            market_id,
            name: state.config.name.clone(),
            fee_ppm: state.config.fee_ppm,
            tick_spacing: state.config.tick_spacing,
            max_tick_crossed: state.config.max_tick_crossed,
        };
        self.markets.insert(market_id, state);
        info!(market = market_id.0, name = %payload.name, "market added");
        self.emit_event(EventPayload::MarketAdded(payload));
        Ok(market_id)
    }

    pub fn get_market(&self, market_id: MarketId) -> Option<&MarketState> {
        self.markets.get(&market_id)
    }

    pub(super) fn market_mut(&mut self, market_id: MarketId) -> Result<&mut MarketState, EngineError> {
        self.markets
            .get_mut(&market_id)
            .ok_or(EngineError::MarketNotFound(market_id))
    }

    /// Change the price impact cap. 0 disables it.
    pub fn set_max_tick_crossed(&mut self, market_id: MarketId, max_tick_crossed: u32) -> Result<(), EngineError> {
        let market = self.market_mut(market_id)?;
        let mut updated = market.config.clone();
        updated.max_tick_crossed = max_tick_crossed;
        updated.validate()?;
        market.config = updated;
        Ok(())
    }

    fn set_status(&mut self, market_id: MarketId, status: MarketStatus) -> Result<(), EngineError> {
        let market = self.market_mut(market_id)?;
        let old_status = market.status;
        market.status = status;
        self.emit_event(EventPayload::MarketStatusChanged(MarketStatusChangedEvent {
            market_id,
            old_status,
            new_status: status,
        }));
        Ok(())
    }

    pub fn pause_market(&mut self, market_id: MarketId) -> Result<(), EngineError> {
        self.set_status(market_id, MarketStatus::Paused)
    }

    pub fn resume_market(&mut self, market_id: MarketId) -> Result<(), EngineError> {
        self.set_status(market_id, MarketStatus::Active)
    }

    pub fn close_market(&mut self, market_id: MarketId) -> Result<(), EngineError> {
        self.set_status(market_id, MarketStatus::Closed)
    }

    /// Set the pool's starting price. Returns the starting tick.
    pub fn initialize_pool(&mut self, market_id: MarketId, price: Price) -> Result<i32, EngineError> {
        let sqrt_price = sqrt_price_x96_from_price(price)?;
        let market = self.market_mut(market_id)?;
        let slot = market.pool.initialize(sqrt_price)?;
        // report the price the pool actually holds after sqrt rounding
        let pool_price = price_from_sqrt_x96(slot.sqrt_price_x96)?;
        info!(market = market_id.0, price = %pool_price, tick = slot.tick, "pool initialized");
        self.emit_event(EventPayload::PoolInitialized(PoolInitializedEvent {
            market_id,
            price: pool_price,
            tick: slot.tick,
        }));
        Ok(slot.tick)
    }

    /// Mint the most liquidity `base` and `quote` can back over [lower, upper).
    pub fn add_liquidity(
        &mut self,
        market_id: MarketId,
        lower_tick: i32,
        upper_tick: i32,
        base: Decimal,
        quote: Decimal,
    ) -> Result<LiquidityResult, EngineError> {
        let base_wei = to_wei(base)?;
        let quote_wei = to_wei(quote)?;
        let market = self.market_mut(market_id)?;
        let (liquidity, base_used, quote_used) =
            market
                .pool
                .mint_for_amounts(lower_tick, upper_tick, base_wei, quote_wei)?;
        let liquidity_delta = i128::try_from(liquidity).map_err(|_| MathError::Overflow)?;
        let result = LiquidityResult {
            liquidity,
            base: from_wei(base_used)?,
            quote: from_wei(quote_used)?,
        };
        info!(
            market = market_id.0,
            lower_tick,
            upper_tick,
            liquidity,
            base = %result.base,
            quote = %result.quote,
            "liquidity added"
        );
        self.emit_event(EventPayload::LiquidityChanged(LiquidityChangedEvent {
            market_id,
            lower_tick,
            upper_tick,
            liquidity_delta,
            base: result.base,
            quote: result.quote,
        }));
        Ok(result)
    }

    pub fn remove_liquidity(
        &mut self,
        market_id: MarketId,
        lower_tick: i32,
        upper_tick: i32,
        liquidity: u128,
    ) -> Result<LiquidityResult, EngineError> {
        let liquidity_delta = i128::try_from(liquidity).map_err(|_| MathError::Overflow)?;
        let market = self.market_mut(market_id)?;
        let (base_out, quote_out) = market.pool.burn(lower_tick, upper_tick, liquidity)?;
        let result = LiquidityResult {
            liquidity,
            base: from_wei(base_out)?,
            quote: from_wei(quote_out)?,
        };
        info!(market = market_id.0, lower_tick, upper_tick, liquidity, "liquidity removed");
        self.emit_event(EventPayload::LiquidityChanged(LiquidityChangedEvent {
            market_id,
            lower_tick,
            upper_tick,
            liquidity_delta: -liquidity_delta,
            base: result.base,
            quote: result.quote,
        }));
        Ok(result)
    }

    pub fn position(&self, trader: AccountId, market_id: MarketId) -> Option<&Position> {
        self.positions.get(trader, market_id)
    }

    pub fn positions(&self) -> &PositionLedger {
        &self.positions
    }

    pub fn collateral(&self) -> &C {
        &self.collateral
    }

    pub fn collateral_mut(&mut self) -> &mut C {
        &mut self.collateral
    }

    pub fn price_feed(&self) -> &F {
        &self.price_feed
    }

    pub fn price_feed_mut(&mut self) -> &mut F {
        &mut self.price_feed
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        debug!(id = event.id.0, event = event.payload.name(), "event");

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
