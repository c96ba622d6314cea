//! Position valuation and the margin check run after the ledger is updated.

use super::core::Engine;
use super::results::EngineError;
use crate::collateral::CollateralLedger;
use crate::margin::{check_initial_margin, evaluate_account, AccountValuation, Exposure};
use crate::price_feed::PriceFeed;
use crate::types::{AccountId, MarketId, Price, Quote};
use tracing::debug;

impl<C: CollateralLedger, F: PriceFeed> Engine<C, F> {
    /// Price used to value positions in `market_id`: a fresh oracle round, else the pool price.
    pub fn valuation_price(&self, market_id: MarketId) -> Result<Price, EngineError> {
        let market = self
            .markets
            .get(&market_id)
            .ok_or(EngineError::MarketNotFound(market_id))?;

        if let Some(round) = self.price_feed.latest_round(market_id) {
            if !round.is_stale(self.current_time, self.config.max_price_staleness_secs) {
                return Ok(round.price);
            }
            debug!(
                market = market_id.0,
                round = round.round_id,
                updated_at = round.updated_at.as_secs(),
                "stale oracle round, using pool price"
            );
        }

        market
            .pool_price()
            .ok_or(EngineError::NoValuationPrice(market_id))
    }

    /// Margin view of a trader across every open position.
    pub fn account_valuation(&self, trader: AccountId) -> Result<AccountValuation, EngineError> {
        self.valuation_with_pending(trader, Quote::zero())
    }

    // collateral includes pnl realized by the request in flight, not yet settled
    fn valuation_with_pending(
        &self,
        trader: AccountId,
        pending_pnl: Quote,
    ) -> Result<AccountValuation, EngineError> {
        let exposures = self
            .positions
            .open_positions(trader)
            .map(|position| {
                Ok(Exposure {
                    size: position.size,
                    open_notional: position.open_notional,
                    price: self.valuation_price(position.market_id)?,
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        let collateral = self.collateral.free_collateral(trader).add(pending_pnl);
        Ok(evaluate_account(collateral, exposures, &self.config.margin))
    }

    pub(super) fn check_margin(&self, trader: AccountId, pending_pnl: Quote) -> Result<(), EngineError> {
        let valuation = self.valuation_with_pending(trader, pending_pnl)?;
        debug!(
            trader = trader.0,
            collateral = %valuation.collateral,
            unrealized = %valuation.unrealized_pnl,
            required = %valuation.initial_required,
            free = %valuation.free_collateral,
            "margin check"
        );
        check_initial_margin(&valuation)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{Engine, EngineConfig, EngineError, OpenPositionParams};
    use crate::market::MarketConfig;
    use crate::math::tick_math::full_range_ticks;
    use crate::types::{AccountId, MarketId, Price, Quote, Timestamp};
    use rust_decimal_macros::dec;

    fn seeded() -> (Engine, MarketId) {
        let mut engine = Engine::in_memory(EngineConfig::default());
        let id = engine.add_market(MarketConfig::eth_perp()).unwrap();
        engine.initialize_pool(id, Price::new_unchecked(dec!(10))).unwrap();
        let (lower, upper) = full_range_ticks(60);
        engine.add_liquidity(id, lower, upper, dec!(100), dec!(1000)).unwrap();
        (engine, id)
    }

    #[test]
    fn fresh_oracle_round_wins() {
        let (mut engine, id) = seeded();
        engine.set_time(Timestamp::from_secs(10_000));
        engine
            .price_feed_mut()
            .set_price(id, Price::new_unchecked(dec!(11)), Timestamp::from_secs(9_990));
        assert_eq!(engine.valuation_price(id).unwrap().value(), dec!(11));
    }

    #[test]
    fn stale_round_falls_back_to_pool() {
        let (mut engine, id) = seeded();
        engine
            .price_feed_mut()
            .set_price(id, Price::new_unchecked(dec!(11)), Timestamp::from_secs(0));
        engine.set_time(Timestamp::from_secs(3_601));
        let price = engine.valuation_price(id).unwrap().value();
        assert!(price > dec!(9.99) && price < dec!(10.01));
    }

    #[test]
    fn uninitialized_market_has_no_price() {
        let mut engine = Engine::in_memory(EngineConfig::default());
        let id = engine.add_market(MarketConfig::eth_perp()).unwrap();
        assert_eq!(engine.valuation_price(id), Err(EngineError::NoValuationPrice(id)));
    }

    #[test]
    fn valuation_covers_open_positions() {
        let (mut engine, id) = seeded();
        let trader = AccountId(3);
        let now = engine.time();
        engine
            .collateral_mut()
            .deposit(trader, Quote::new(dec!(50)), now)
            .unwrap();
        engine
            .open_position(trader, OpenPositionParams::new(id, false, false, dec!(2)))
            .unwrap();
        let valuation = engine.account_valuation(trader).unwrap();
        assert_eq!(valuation.collateral.value(), dec!(50));
        // marked at the post trade pool price, which the buy pushed up
        assert!(valuation.unrealized_pnl.value() > dec!(0));
        assert!(valuation.initial_required.value() > dec!(2));
        assert!(!valuation.free_collateral.is_negative());
    }
}
