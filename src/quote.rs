// 4.0 quote.rs: turns a trade request into a swap against the market's pool.
// resolves the price limit (caller limit vs impact cap), runs the swap, converts amounts back to Decimal.
// nothing else in the crate is allowed to move pool state.

use ethnum::U256;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::liquidity::{default_price_limit, validate_price_limit, LiquidityPool, PoolError, SwapOutcome, SwapParams};
use crate::math::tick_math::{sqrt_ratio_at_tick, MAX_TICK, MIN_TICK};
use crate::math::{from_wei, price_from_sqrt_x96, to_wei, MathError};
use crate::types::{Direction, Price, SwapKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    #[error("amount must be greater than zero")]
    ZeroAmount,
    #[error("amount must not be negative")]
    InvalidAmount,
    #[error("market has no initialized pool")]
    PoolNotInitialized,
    #[error("sqrt price limit is outside the allowed range for this direction")]
    InvalidPriceLimit,
    #[error("pool could not fill any of the requested amount")]
    NoLiquidity,
    #[error("fill is larger than any amount the pool can settle")]
    AmountTooLarge,
    #[error(transparent)]
    Pool(PoolError),
    #[error(transparent)]
    Math(#[from] MathError),
}

impl From<PoolError> for QuoteError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::NotInitialized => QuoteError::PoolNotInitialized,
            PoolError::InvalidPriceLimit => QuoteError::InvalidPriceLimit,
            PoolError::Math(m) => QuoteError::Math(m),
            other => QuoteError::Pool(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteRequest {
    pub direction: Direction,
    pub exact_input: bool,
    /// amount of the exact side, base or quote units
    pub amount: Decimal,
    /// Q64.96, zero = unbounded
    pub sqrt_price_limit_x96: U256,
}

impl QuoteRequest {
    pub fn kind(&self) -> SwapKind {
        SwapKind::new(self.direction, self.exact_input)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapQuote {
    pub kind: SwapKind,
    /// base paid (short) or received (long), always >= 0
    pub amount_base: Decimal,
    /// quote received (short) or paid (long), always >= 0. paid amounts include the fee.
    pub amount_quote: Decimal,
    /// fee in units of the input token
    pub fee: Decimal,
    pub sqrt_price_before: U256,
    pub sqrt_price_after: U256,
    pub tick_before: i32,
    pub tick_after: i32,
    /// swap stopped at a price limit before the exact amount was used up
    pub truncated: bool,
    pub ticks_crossed: u32,
}

impl SwapQuote {
    pub fn direction(&self) -> Direction {
        self.kind.direction()
    }

    // signed base delta for the trader. positive = got base (long)
    pub fn exchanged_base(&self) -> Decimal {
        match self.direction() {
            Direction::BaseToQuote => -self.amount_base,
            Direction::QuoteToBase => self.amount_base,
        }
    }

    // signed quote delta for the trader. positive = got quote
    pub fn exchanged_quote(&self) -> Decimal {
        match self.direction() {
            Direction::BaseToQuote => self.amount_quote,
            Direction::QuoteToBase => -self.amount_quote,
        }
    }

    pub fn price_after(&self) -> Result<Price, MathError> {
        price_from_sqrt_x96(self.sqrt_price_after)
    }

    /// Average fill price, quote per base.
    pub fn average_price(&self) -> Option<Price> {
        if self.amount_base.is_zero() {
            return None;
        }
        self.amount_quote
            .checked_div(self.amount_base)
            .and_then(Price::new)
    }

    pub fn fee_in_quote(&self) -> Decimal {
        match self.direction() {
            Direction::QuoteToBase => self.fee,
            Direction::BaseToQuote => self
                .average_price()
                .and_then(|p| self.fee.checked_mul(p.value()))
                .unwrap_or(Decimal::ZERO),
        }
    }
}

// Sqrt price limit `max_tick_crossed` ticks away from the current tick. None when the cap is off.
pub fn impact_cap_limit(
    tick: i32,
    zero_for_one: bool,
    max_tick_crossed: u32,
) -> Result<Option<U256>, MathError> {
    if max_tick_crossed == 0 {
        return Ok(None);
    }
    let cap = i64::from(max_tick_crossed);
    let capped_tick = if zero_for_one {
        i64::from(tick) - cap
    } else {
        i64::from(tick) + cap
    };
    if capped_tick <= i64::from(MIN_TICK) || capped_tick >= i64::from(MAX_TICK) {
        return Ok(Some(default_price_limit(zero_for_one)));
    }
    Ok(Some(sqrt_ratio_at_tick(capped_tick as i32)?))
}

fn build_params<P: LiquidityPool>(
    pool: &P,
    request: &QuoteRequest,
    max_tick_crossed: u32,
) -> Result<SwapParams, QuoteError> {
    if request.amount.is_sign_negative() && !request.amount.is_zero() {
        return Err(QuoteError::InvalidAmount);
    }
    let amount = to_wei(request.amount)?;
    if amount == U256::ZERO {
        return Err(QuoteError::ZeroAmount);
    }
    let slot = pool.slot().ok_or(QuoteError::PoolNotInitialized)?;
    let zero_for_one = request.direction.is_base_to_quote();

    let caller_limit = if request.sqrt_price_limit_x96 == U256::ZERO {
        default_price_limit(zero_for_one)
    } else {
        validate_price_limit(slot.sqrt_price_x96, request.sqrt_price_limit_x96, zero_for_one)?;
        request.sqrt_price_limit_x96
    };

    // the tighter of the two limits wins
    let limit = match impact_cap_limit(slot.tick, zero_for_one, max_tick_crossed)? {
        Some(cap) if zero_for_one => caller_limit.max(cap),
        Some(cap) => caller_limit.min(cap),
        None => caller_limit,
    };

    Ok(SwapParams {
        zero_for_one,
        exact_input: request.exact_input,
        amount,
        sqrt_price_limit_x96: limit,
    })
}

fn to_quote(
    request: &QuoteRequest,
    sqrt_price_before: U256,
    tick_before: i32,
    outcome: &SwapOutcome,
) -> Result<SwapQuote, QuoteError> {
    if outcome.amount_in == U256::ZERO || outcome.amount_out == U256::ZERO {
        return Err(QuoteError::NoLiquidity);
    }
    let amount_in = settle_amount(outcome.amount_in)?;
    let amount_out = settle_amount(outcome.amount_out)?;
    let (amount_base, amount_quote) = match request.direction {
        Direction::BaseToQuote => (amount_in, amount_out),
        Direction::QuoteToBase => (amount_out, amount_in),
    };

    Ok(SwapQuote {
        kind: request.kind(),
        amount_base,
        amount_quote,
        fee: settle_amount(outcome.fee)?,
        sqrt_price_before,
        sqrt_price_after: outcome.sqrt_price_after,
        tick_before,
        tick_after: outcome.tick_after,
        truncated: outcome.amount_remaining != U256::ZERO,
        ticks_crossed: outcome.ticks_crossed,
    })
}

// a drained pool can demand more than Decimal holds. that is the request's fault, not the engine's
fn settle_amount(wei: U256) -> Result<Decimal, QuoteError> {
    from_wei(wei).map_err(|err| match err {
        MathError::Overflow => QuoteError::AmountTooLarge,
        other => QuoteError::Math(other),
    })
}

/// Quote without moving the pool.
pub fn preview<P: LiquidityPool>(
    pool: &P,
    request: &QuoteRequest,
    max_tick_crossed: u32,
) -> Result<SwapQuote, QuoteError> {
    let params = build_params(pool, request, max_tick_crossed)?;
    let slot = pool.slot().ok_or(QuoteError::PoolNotInitialized)?;
    let outcome = pool.simulate_swap(&params)?;
    to_quote(request, slot.sqrt_price_x96, slot.tick, &outcome)
}

/// Quote and execute the swap. On error the pool is untouched.
pub fn quote<P: LiquidityPool>(
    pool: &mut P,
    request: &QuoteRequest,
    max_tick_crossed: u32,
) -> Result<SwapQuote, QuoteError> {
    let params = build_params(pool, request, max_tick_crossed)?;
    let slot = pool.slot().ok_or(QuoteError::PoolNotInitialized)?;

    // a zero fill must not leave a moved price behind
    let simulated = pool.simulate_swap(&params)?;
    let swap_quote = to_quote(request, slot.sqrt_price_x96, slot.tick, &simulated)?;

    let outcome = pool.apply_swap(&params)?;
    debug_assert_eq!(outcome, simulated);
    Ok(swap_quote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liquidity::ConcentratedPool;
    use crate::math::tick_math::full_range_ticks;
    use crate::math::{sqrt_price_x96_from_price, Q96};
    use rust_decimal_macros::dec;

    fn pool_at_ten() -> ConcentratedPool {
        let mut pool = ConcentratedPool::new(10_000, 200).unwrap();
        let sqrt = sqrt_price_x96_from_price(Price::new_unchecked(dec!(10))).unwrap();
        pool.initialize(sqrt).unwrap();
        let (lower, upper) = full_range_ticks(200);
        pool.mint_for_amounts(
            lower,
            upper,
            to_wei(dec!(100)).unwrap(),
            to_wei(dec!(1000)).unwrap(),
        )
        .unwrap();
        pool
    }

    fn request(direction: Direction, exact_input: bool, amount: Decimal) -> QuoteRequest {
        QuoteRequest {
            direction,
            exact_input,
            amount,
            sqrt_price_limit_x96: U256::ZERO,
        }
    }

    #[test]
    fn zero_and_negative_amounts_rejected() {
        let mut pool = pool_at_ten();
        assert_eq!(
            quote(&mut pool, &request(Direction::BaseToQuote, true, dec!(0)), 0),
            Err(QuoteError::ZeroAmount)
        );
        assert_eq!(
            quote(&mut pool, &request(Direction::BaseToQuote, true, dec!(-1)), 0),
            Err(QuoteError::InvalidAmount)
        );
    }

    #[test]
    fn uninitialized_pool_rejected() {
        let mut pool = ConcentratedPool::new(10_000, 200).unwrap();
        assert_eq!(
            quote(&mut pool, &request(Direction::QuoteToBase, true, dec!(1)), 0),
            Err(QuoteError::PoolNotInitialized)
        );
    }

    #[test]
    fn short_exact_input_below_spot() {
        let mut pool = pool_at_ten();
        let q = quote(&mut pool, &request(Direction::BaseToQuote, true, dec!(25)), 0).unwrap();
        assert_eq!(q.amount_base, dec!(25));
        // 198.39... quote, fee and impact keep it under 25 * 10
        assert!(q.amount_quote > dec!(198) && q.amount_quote < dec!(199));
        assert_eq!(q.exchanged_base(), dec!(-25));
        assert!(q.tick_after < q.tick_before);
        assert_eq!(pool.slot().unwrap().tick, q.tick_after);
        assert!(!q.truncated);
    }

    #[test]
    fn long_exact_output_pays_more_than_spot() {
        let mut pool = pool_at_ten();
        let q = quote(&mut pool, &request(Direction::QuoteToBase, false, dec!(20)), 0).unwrap();
        assert_eq!(q.amount_base, dec!(20));
        assert!(q.amount_quote > dec!(252) && q.amount_quote < dec!(253));
        assert_eq!(q.exchanged_quote(), -q.amount_quote);
        assert!(q.fee > Decimal::ZERO);
    }

    #[test]
    fn preview_leaves_pool_alone() {
        let pool = pool_at_ten();
        let before = pool.slot();
        let q = preview(&pool, &request(Direction::QuoteToBase, true, dec!(250)), 0).unwrap();
        assert!(q.amount_base > dec!(19.8) && q.amount_base < dec!(19.9));
        assert_eq!(pool.slot(), before);
    }

    #[test]
    fn impact_cap_truncates() {
        let mut pool = pool_at_ten();
        let start_tick = pool.slot().unwrap().tick;
        let q = quote(&mut pool, &request(Direction::BaseToQuote, true, dec!(50)), 100).unwrap();
        assert!(q.truncated);
        assert!(q.amount_base < dec!(50));
        assert!(start_tick - q.tick_after <= 101);
    }

    #[test]
    fn draining_the_pool_is_too_large() {
        let mut pool = pool_at_ten();
        let before = pool.slot();
        // 1500 quote out of a pool holding 1000
        assert_eq!(
            quote(&mut pool, &request(Direction::BaseToQuote, false, dec!(1500)), 0),
            Err(QuoteError::AmountTooLarge)
        );
        assert_eq!(pool.slot(), before);
    }

    #[test]
    fn wrong_side_limit_rejected() {
        let mut pool = pool_at_ten();
        let mut req = request(Direction::BaseToQuote, true, dec!(1));
        req.sqrt_price_limit_x96 = Q96 * U256::new(4);
        assert_eq!(quote(&mut pool, &req, 0), Err(QuoteError::InvalidPriceLimit));
    }

    #[test]
    fn cap_limit_disabled_at_zero() {
        assert_eq!(impact_cap_limit(0, true, 0).unwrap(), None);
        assert_eq!(
            impact_cap_limit(MIN_TICK + 5, true, 10).unwrap(),
            Some(default_price_limit(true))
        );
        assert_eq!(impact_cap_limit(0, false, 10).unwrap(), Some(sqrt_ratio_at_tick(10).unwrap()));
    }
}
