//! Request execution: open, close and reduce.
//!
//! All three run the same pipeline and differ only in how the swap direction
//! and exact amount are derived from the caller's intent and the trader's
//! current size:
//!
//! `Received -> DeadlineChecked -> Quoted -> BoundChecked -> Settled`
//!
//! Any failure moves the request to `Rejected`. The pool and the trader's
//! position are checkpointed before quoting and restored on every error, and
//! the collateral ledger is only written once every check has passed.

use super::core::Engine;
use super::results::{EngineError, TradeResult};
use crate::collateral::CollateralLedger;
use crate::events::{
    EventPayload, PnlSettledEvent, PositionChangedEvent, ReferredTradeEvent, TradeRejectedEvent,
};
use crate::position::SwapDelta;
use crate::price_feed::PriceFeed;
use crate::quote::{self, QuoteError, QuoteRequest, SwapQuote};
use crate::slippage;
use crate::types::{AccountId, Direction, MarketId, Quote, ReferralCode, SignedSize, Timestamp};
use ethnum::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Pipeline stage a request has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStage {
    Received,
    DeadlineChecked,
    Quoted,
    BoundChecked,
    Settled,
    Rejected,
}

/// Open or add to a position with an explicit swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenPositionParams {
    pub market: MarketId,
    /// true = sell base (short), false = buy base (long)
    pub is_base_to_quote: bool,
    /// true = `amount` is what the trader supplies, false = what they receive
    pub is_exact_input: bool,
    pub amount: Decimal,
    /// limit on the non-exact side. 0 = no limit
    pub opposite_amount_bound: Decimal,
    /// Q64.96. 0 = unbounded
    pub sqrt_price_limit_x96: U256,
    pub deadline: Timestamp,
    pub referral_code: ReferralCode,
}

impl OpenPositionParams {
    /// Unbounded request with no deadline pressure or referrer.
    pub fn new(market: MarketId, is_base_to_quote: bool, is_exact_input: bool, amount: Decimal) -> Self {
        Self {
            market,
            is_base_to_quote,
            is_exact_input,
            amount,
            opposite_amount_bound: Decimal::ZERO,
            sqrt_price_limit_x96: U256::ZERO,
            deadline: Timestamp::MAX,
            referral_code: ReferralCode::NONE,
        }
    }

    pub fn with_bound(mut self, bound: Decimal) -> Self {
        self.opposite_amount_bound = bound;
        self
    }

    pub fn with_deadline(mut self, deadline: Timestamp) -> Self {
        self.deadline = deadline;
        self
    }

    fn to_request(&self) -> QuoteRequest {
        QuoteRequest {
            direction: Direction::from_base_to_quote(self.is_base_to_quote),
            exact_input: self.is_exact_input,
            amount: self.amount,
            sqrt_price_limit_x96: self.sqrt_price_limit_x96,
        }
    }
}

/// Close the whole position. Amount and direction come from the stored size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosePositionParams {
    pub market: MarketId,
    pub sqrt_price_limit_x96: U256,
    pub opposite_amount_bound: Decimal,
    pub deadline: Timestamp,
    pub referral_code: ReferralCode,
}

impl ClosePositionParams {
    pub fn new(market: MarketId) -> Self {
        Self {
            market,
            sqrt_price_limit_x96: U256::ZERO,
            opposite_amount_bound: Decimal::ZERO,
            deadline: Timestamp::MAX,
            referral_code: ReferralCode::NONE,
        }
    }

    pub fn with_bound(mut self, bound: Decimal) -> Self {
        self.opposite_amount_bound = bound;
        self
    }
}

/// Close part of the position. `base_amount` must be in (0, |size|].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducePositionParams {
    pub market: MarketId,
    pub base_amount: Decimal,
    pub sqrt_price_limit_x96: U256,
    pub opposite_amount_bound: Decimal,
    pub deadline: Timestamp,
    pub referral_code: ReferralCode,
}

impl ReducePositionParams {
    pub fn new(market: MarketId, base_amount: Decimal) -> Self {
        Self {
            market,
            base_amount,
            sqrt_price_limit_x96: U256::ZERO,
            opposite_amount_bound: Decimal::ZERO,
            deadline: Timestamp::MAX,
            referral_code: ReferralCode::NONE,
        }
    }

    pub fn with_bound(mut self, bound: Decimal) -> Self {
        self.opposite_amount_bound = bound;
        self
    }
}

// fields every request shape shares
#[derive(Debug, Clone, Copy)]
struct Envelope {
    market: MarketId,
    opposite_amount_bound: Decimal,
    deadline: Timestamp,
    referral_code: ReferralCode,
}

// how far a request got, for the rejection event
#[derive(Debug, Clone, Copy)]
struct Progress {
    stage: OrderStage,
    direction: Option<Direction>,
}

/// Swap that unwinds `base_amount` of `size`. The base amount is always the exact side:
/// a long sells exact base in, a short buys exact base out.
fn unwind_request(
    market: MarketId,
    size: SignedSize,
    base_amount: Decimal,
    sqrt_price_limit_x96: U256,
) -> Result<QuoteRequest, EngineError> {
    let side = size.side().ok_or(EngineError::NoOpenPosition(market))?;
    if base_amount.is_zero() {
        return Err(QuoteError::ZeroAmount.into());
    }
    if base_amount.is_sign_negative() {
        return Err(QuoteError::InvalidAmount.into());
    }
    if base_amount > size.abs() {
        return Err(EngineError::ReduceExceedsPosition {
            requested: base_amount,
            size,
        });
    }
    let direction = Direction::closing(side);
    Ok(QuoteRequest {
        direction,
        exact_input: direction.is_base_to_quote(),
        amount: base_amount,
        sqrt_price_limit_x96,
    })
}

impl<C: CollateralLedger, F: PriceFeed> Engine<C, F> {
    pub fn open_position(
        &mut self,
        trader: AccountId,
        params: OpenPositionParams,
    ) -> Result<TradeResult, EngineError> {
        let envelope = Envelope {
            market: params.market,
            opposite_amount_bound: params.opposite_amount_bound,
            deadline: params.deadline,
            referral_code: params.referral_code,
        };
        self.execute(trader, envelope, |_| Ok(params.to_request()))
    }

    pub fn close_position(
        &mut self,
        trader: AccountId,
        params: ClosePositionParams,
    ) -> Result<TradeResult, EngineError> {
        let envelope = Envelope {
            market: params.market,
            opposite_amount_bound: params.opposite_amount_bound,
            deadline: params.deadline,
            referral_code: params.referral_code,
        };
        self.execute(trader, envelope, |size| {
            unwind_request(params.market, size, size.abs(), params.sqrt_price_limit_x96)
        })
    }

    pub fn reduce_position(
        &mut self,
        trader: AccountId,
        params: ReducePositionParams,
    ) -> Result<TradeResult, EngineError> {
        let envelope = Envelope {
            market: params.market,
            opposite_amount_bound: params.opposite_amount_bound,
            deadline: params.deadline,
            referral_code: params.referral_code,
        };
        self.execute(trader, envelope, |size| {
            unwind_request(params.market, size, params.base_amount, params.sqrt_price_limit_x96)
        })
    }

    /// Quote an open request against the current pool without touching any state.
    pub fn preview_open(&self, params: &OpenPositionParams) -> Result<SwapQuote, EngineError> {
        let market = self
            .markets
            .get(&params.market)
            .ok_or(EngineError::MarketNotFound(params.market))?;
        Ok(quote::preview(
            &market.pool,
            &params.to_request(),
            market.config.max_tick_crossed,
        )?)
    }

    fn execute<D>(
        &mut self,
        trader: AccountId,
        envelope: Envelope,
        derive: D,
    ) -> Result<TradeResult, EngineError>
    where
        D: FnOnce(SignedSize) -> Result<QuoteRequest, EngineError>,
    {
        let mut progress = Progress {
            stage: OrderStage::Received,
            direction: None,
        };
        let outcome = self.run_pipeline(trader, &envelope, derive, &mut progress);
        if let Err(err) = &outcome {
            self.reject(trader, &envelope, progress, err);
        }
        outcome
    }

    fn run_pipeline<D>(
        &mut self,
        trader: AccountId,
        envelope: &Envelope,
        derive: D,
        progress: &mut Progress,
    ) -> Result<TradeResult, EngineError>
    where
        D: FnOnce(SignedSize) -> Result<QuoteRequest, EngineError>,
    {
        let now = self.current_time;
        if now > envelope.deadline {
            return Err(EngineError::Expired {
                deadline: envelope.deadline,
                now,
            });
        }
        progress.stage = OrderStage::DeadlineChecked;

        let market = self
            .markets
            .get(&envelope.market)
            .ok_or(EngineError::MarketNotFound(envelope.market))?;
        if !market.is_active() {
            return Err(EngineError::MarketNotActive(envelope.market));
        }
        let max_tick_crossed = market.config.max_tick_crossed;
        let pool_checkpoint = market.pool.clone();

        let request = derive(self.positions.size(trader, envelope.market))?;
        progress.direction = Some(request.direction);
        let position_checkpoint = self.positions.snapshot(trader, envelope.market);

        let outcome = self.swap_and_settle(trader, envelope, &request, max_tick_crossed, progress);
        if outcome.is_err() {
            if let Some(market) = self.markets.get_mut(&envelope.market) {
                market.pool = pool_checkpoint;
            }
            self.positions
                .restore(trader, envelope.market, position_checkpoint);
            debug!(
                market = envelope.market.0,
                trader = trader.0,
                stage = ?progress.stage,
                "request rolled back"
            );
        }
        outcome
    }

    fn swap_and_settle(
        &mut self,
        trader: AccountId,
        envelope: &Envelope,
        request: &QuoteRequest,
        max_tick_crossed: u32,
        progress: &mut Progress,
    ) -> Result<TradeResult, EngineError> {
        let market_id = envelope.market;
        let now = self.current_time;

        let swap = {
            let market = self.market_mut(market_id)?;
            quote::quote(&mut market.pool, request, max_tick_crossed)?
        };
        progress.stage = OrderStage::Quoted;
        debug!(
            market = market_id.0,
            kind = ?swap.kind,
            base = %swap.amount_base,
            quote = %swap.amount_quote,
            tick = swap.tick_after,
            truncated = swap.truncated,
            "quoted"
        );

        slippage::check_quote(&swap, envelope.opposite_amount_bound)?;
        progress.stage = OrderStage::BoundChecked;

        let change = self
            .positions
            .apply_swap(trader, market_id, SwapDelta::from_swap(&swap), now);

        // de-risking never needs margin
        if change.kind.adds_exposure() {
            self.check_margin(trader, change.realized_pnl)?;
        }
        let price_after = swap.price_after()?;
        let fee = Quote::new(swap.fee_in_quote());

        // the collateral write is the last step allowed to fail
        let market = self
            .markets
            .get_mut(&market_id)
            .ok_or(EngineError::MarketNotFound(market_id))?;
        if !change.realized_pnl.is_zero() {
            self.collateral.settle_pnl(trader, change.realized_pnl, now)?;
        }
        market.update_open_interest(change.old_size, change.new_size);
        market.record_trade(swap.average_price(), swap.amount_quote, now);
        progress.stage = OrderStage::Settled;

        let result = TradeResult {
            market_id,
            kind: swap.kind,
            change: change.kind,
            base: swap.exchanged_base(),
            quote: swap.exchanged_quote(),
            fee,
            realized_pnl: change.realized_pnl,
            new_size: change.new_size,
            price_after,
            tick_after: swap.tick_after,
            truncated: swap.truncated,
        };

        self.emit_event(EventPayload::PositionChanged(PositionChangedEvent {
            market_id,
            account_id: trader,
            kind: swap.kind,
            change: change.kind,
            exchanged_base: result.base,
            exchanged_quote: result.quote,
            fee,
            new_size: change.new_size,
            open_notional: change.open_notional,
            realized_pnl: change.realized_pnl,
            tick_after: swap.tick_after,
            price_after,
        }));
        if !change.realized_pnl.is_zero() {
            self.emit_event(EventPayload::PnlSettled(PnlSettledEvent {
                market_id,
                account_id: trader,
                amount: change.realized_pnl,
            }));
        }
        if !envelope.referral_code.is_none() {
            self.emit_event(EventPayload::ReferredTrade(ReferredTradeEvent {
                market_id,
                account_id: trader,
                referral_code: envelope.referral_code,
            }));
        }

        info!(
            market = market_id.0,
            trader = trader.0,
            kind = ?swap.kind,
            change = ?change.kind,
            base = %result.base,
            quote = %result.quote,
            new_size = %change.new_size,
            realized = %change.realized_pnl,
            "trade settled"
        );
        Ok(result)
    }

    fn reject(&mut self, trader: AccountId, envelope: &Envelope, progress: Progress, err: &EngineError) {
        warn!(
            market = envelope.market.0,
            trader = trader.0,
            stage = ?progress.stage,
            class = ?err.class(),
            error = %err,
            "trade rejected"
        );
        self.emit_event(EventPayload::TradeRejected(TradeRejectedEvent {
            market_id: envelope.market,
            account_id: trader,
            direction: progress.direction,
            stage: progress.stage,
            reason: err.to_string(),
        }));
    }
}
