// 3.0 liquidity.rs: the AMM curve traders swap against. one concentrated liquidity pool per market.
// the engine only talks to the LiquidityPool trait so the curve can be swapped out.

use std::collections::BTreeMap;

use ethnum::U256;
use thiserror::Error;

use crate::math::liquidity_amounts::{amounts_for_liquidity, liquidity_for_amounts};
use crate::math::swap_math::{compute_swap_step, FEE_DENOMINATOR};
use crate::math::tick_math::{
    sqrt_ratio_at_tick, tick_at_sqrt_ratio, MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK,
};
use crate::math::MathError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("pool has no price yet")]
    NotInitialized,
    #[error("pool is already initialized")]
    AlreadyInitialized,
    #[error("invalid tick range [{lower}, {upper})")]
    InvalidTickRange { lower: i32, upper: i32 },
    #[error("tick {tick} is not a multiple of spacing {spacing}")]
    TickNotAligned { tick: i32, spacing: i32 },
    #[error("amounts too small to mint any liquidity")]
    ZeroLiquidity,
    #[error("range holds {available} liquidity, {requested} requested")]
    InsufficientPosition { requested: u128, available: u128 },
    #[error("sqrt price limit is on the wrong side of the current price")]
    InvalidPriceLimit,
    #[error("invalid pool parameters: {0}")]
    InvalidParameters(String),
    #[error(transparent)]
    Math(#[from] MathError),
}

// Current price and tick. tick is the greatest tick at or below the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub sqrt_price_x96: U256,
    pub tick: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapParams {
    /// base in, quote out
    pub zero_for_one: bool,
    pub exact_input: bool,
    /// exact side amount in wei
    pub amount: U256,
    /// must already be a valid limit, see validate_price_limit
    pub sqrt_price_limit_x96: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutcome {
    /// paid into the pool, fee included
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee: U256,
    /// exact side amount the pool could not fill before hitting the limit
    pub amount_remaining: U256,
    pub sqrt_price_after: U256,
    pub tick_after: i32,
    pub liquidity_after: u128,
    pub ticks_crossed: u32,
}

// Per initialized tick bookkeeping. net is added when the price crosses upward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickInfo {
    pub liquidity_gross: u128,
    pub liquidity_net: i128,
}

// Curve interface. Clone lets the engine checkpoint a pool before a request touches it.
pub trait LiquidityPool: Clone {
    fn slot(&self) -> Option<Slot>;

    fn liquidity(&self) -> u128;

    fn fee_ppm(&self) -> u32;

    // Quote a swap without touching state.
    fn simulate_swap(&self, params: &SwapParams) -> Result<SwapOutcome, PoolError>;

    // Execute a swap, moving the price and active liquidity.
    fn apply_swap(&mut self, params: &SwapParams) -> Result<SwapOutcome, PoolError>;

    fn is_initialized(&self) -> bool {
        self.slot().is_some()
    }
}

/// A nonzero limit must sit strictly between the current price and the curve bound.
pub fn validate_price_limit(
    current: U256,
    limit: U256,
    zero_for_one: bool,
) -> Result<(), PoolError> {
    let ok = if zero_for_one {
        limit < current && limit > MIN_SQRT_RATIO
    } else {
        limit > current && limit < MAX_SQRT_RATIO
    };
    if ok {
        Ok(())
    } else {
        Err(PoolError::InvalidPriceLimit)
    }
}

/// Furthest limit a swap may run to in each direction.
pub fn default_price_limit(zero_for_one: bool) -> U256 {
    if zero_for_one {
        MIN_SQRT_RATIO + U256::ONE
    } else {
        MAX_SQRT_RATIO - U256::ONE
    }
}

fn add_liquidity_delta(liquidity: u128, delta: i128) -> Result<u128, MathError> {
    if delta < 0 {
        liquidity
            .checked_sub(delta.unsigned_abs())
            .ok_or(MathError::Overflow)
    } else {
        liquidity
            .checked_add(delta as u128)
            .ok_or(MathError::Overflow)
    }
}

// Uniswap v3 style pool without fee growth tracking. fees stay in the pool.
#[derive(Debug, Clone)]
pub struct ConcentratedPool {
    fee_ppm: u32,
    tick_spacing: i32,
    slot: Option<Slot>,
    // liquidity active at the current tick
    liquidity: u128,
    ticks: BTreeMap<i32, TickInfo>,
    // liquidity minted per (lower, upper) range
    ranges: BTreeMap<(i32, i32), u128>,
    // cumulative fees taken, in units of the input token
    fees_base: U256,
    fees_quote: U256,
}

impl ConcentratedPool {
    pub fn new(fee_ppm: u32, tick_spacing: i32) -> Result<Self, PoolError> {
        if fee_ppm >= FEE_DENOMINATOR {
            return Err(PoolError::InvalidParameters(format!(
                "fee {} ppm must be below {}",
                fee_ppm, FEE_DENOMINATOR
            )));
        }
        if tick_spacing <= 0 || tick_spacing > MAX_TICK {
            return Err(PoolError::InvalidParameters(format!(
                "tick spacing {} out of range",
                tick_spacing
            )));
        }
        Ok(Self {
            fee_ppm,
            tick_spacing,
            slot: None,
            liquidity: 0,
            ticks: BTreeMap::new(),
            ranges: BTreeMap::new(),
            fees_base: U256::ZERO,
            fees_quote: U256::ZERO,
        })
    }

    pub fn initialize(&mut self, sqrt_price_x96: U256) -> Result<Slot, PoolError> {
        if self.slot.is_some() {
            return Err(PoolError::AlreadyInitialized);
        }
        let tick = tick_at_sqrt_ratio(sqrt_price_x96)?;
        let slot = Slot {
            sqrt_price_x96,
            tick,
        };
        self.slot = Some(slot);
        Ok(slot)
    }

    pub fn tick_spacing(&self) -> i32 {
        self.tick_spacing
    }

    pub fn tick_info(&self, tick: i32) -> Option<&TickInfo> {
        self.ticks.get(&tick)
    }

    pub fn range_liquidity(&self, lower: i32, upper: i32) -> u128 {
        self.ranges.get(&(lower, upper)).copied().unwrap_or(0)
    }

    // (base, quote) fees collected so far
    pub fn fees_collected(&self) -> (U256, U256) {
        (self.fees_base, self.fees_quote)
    }

    fn check_range(&self, lower: i32, upper: i32) -> Result<(), PoolError> {
        if lower >= upper || lower < MIN_TICK || upper > MAX_TICK {
            return Err(PoolError::InvalidTickRange { lower, upper });
        }
        for tick in [lower, upper] {
            if tick % self.tick_spacing != 0 {
                return Err(PoolError::TickNotAligned {
                    tick,
                    spacing: self.tick_spacing,
                });
            }
        }
        Ok(())
    }

    fn update_tick(&mut self, tick: i32, delta: i128, is_upper: bool) -> Result<(), PoolError> {
        let info = self.ticks.entry(tick).or_default();
        info.liquidity_gross = add_liquidity_delta(info.liquidity_gross, delta)?;
        let net_delta = if is_upper { -delta } else { delta };
        info.liquidity_net = info
            .liquidity_net
            .checked_add(net_delta)
            .ok_or(MathError::Overflow)?;
        if info.liquidity_gross == 0 {
            self.ticks.remove(&tick);
        }
        Ok(())
    }

    // applies a signed liquidity change to a range and returns the token amounts it represents
    fn modify_position(
        &mut self,
        lower: i32,
        upper: i32,
        delta: i128,
    ) -> Result<(U256, U256), PoolError> {
        let slot = self.slot.ok_or(PoolError::NotInitialized)?;
        self.check_range(lower, upper)?;

        let key = (lower, upper);
        let current = self.range_liquidity(lower, upper);
        let updated = add_liquidity_delta(current, delta).map_err(|_| {
            PoolError::InsufficientPosition {
                requested: delta.unsigned_abs(),
                available: current,
            }
        })?;

        self.update_tick(lower, delta, false)?;
        self.update_tick(upper, delta, true)?;
        if slot.tick >= lower && slot.tick < upper {
            self.liquidity = add_liquidity_delta(self.liquidity, delta)?;
        }
        if updated == 0 {
            self.ranges.remove(&key);
        } else {
            self.ranges.insert(key, updated);
        }

        let amounts = amounts_for_liquidity(
            slot.sqrt_price_x96,
            sqrt_ratio_at_tick(lower)?,
            sqrt_ratio_at_tick(upper)?,
            delta.unsigned_abs(),
            delta > 0,
        )?;
        Ok(amounts)
    }

    /// Add `liquidity` to a range. Returns the (base, quote) owed, rounded up.
    pub fn mint(&mut self, lower: i32, upper: i32, liquidity: u128) -> Result<(U256, U256), PoolError> {
        if liquidity == 0 {
            return Err(PoolError::ZeroLiquidity);
        }
        let delta = i128::try_from(liquidity).map_err(|_| MathError::Overflow)?;
        self.modify_position(lower, upper, delta)
    }

    /// Mint the most liquidity the two amounts can back. Returns (liquidity, base used, quote used).
    pub fn mint_for_amounts(
        &mut self,
        lower: i32,
        upper: i32,
        amount_base: U256,
        amount_quote: U256,
    ) -> Result<(u128, U256, U256), PoolError> {
        let slot = self.slot.ok_or(PoolError::NotInitialized)?;
        self.check_range(lower, upper)?;
        let liquidity = liquidity_for_amounts(
            slot.sqrt_price_x96,
            sqrt_ratio_at_tick(lower)?,
            sqrt_ratio_at_tick(upper)?,
            amount_base,
            amount_quote,
        )?;
        let (base, quote) = self.mint(lower, upper, liquidity)?;
        Ok((liquidity, base, quote))
    }

    /// Remove `liquidity` from a range. Returns the (base, quote) released, rounded down.
    pub fn burn(&mut self, lower: i32, upper: i32, liquidity: u128) -> Result<(U256, U256), PoolError> {
        if liquidity == 0 {
            return Err(PoolError::ZeroLiquidity);
        }
        let available = self.range_liquidity(lower, upper);
        if liquidity > available {
            return Err(PoolError::InsufficientPosition {
                requested: liquidity,
                available,
            });
        }
        let delta = i128::try_from(liquidity).map_err(|_| MathError::Overflow)?;
        self.modify_position(lower, upper, -delta)
    }

    // next initialized tick in the swap direction, or the curve bound
    fn next_initialized_tick(&self, tick: i32, zero_for_one: bool) -> (i32, bool) {
        if zero_for_one {
            match self.ticks.range(..=tick).next_back() {
                Some((t, _)) => (*t, true),
                None => (MIN_TICK, false),
            }
        } else {
            match self.ticks.range(tick.saturating_add(1)..).next() {
                Some((t, _)) => (*t, true),
                None => (MAX_TICK, false),
            }
        }
    }

    fn run_swap(&self, params: &SwapParams) -> Result<SwapOutcome, PoolError> {
        let slot = self.slot.ok_or(PoolError::NotInitialized)?;
        let zero_for_one = params.zero_for_one;
        let limit = params.sqrt_price_limit_x96;
        validate_price_limit(slot.sqrt_price_x96, limit, zero_for_one)?;

        let mut remaining = params.amount;
        let mut amount_in = U256::ZERO;
        let mut amount_out = U256::ZERO;
        let mut fee = U256::ZERO;
        let mut sqrt_price = slot.sqrt_price_x96;
        let mut tick = slot.tick;
        let mut liquidity = self.liquidity;
        let mut ticks_crossed = 0u32;

        while remaining != U256::ZERO && sqrt_price != limit {
            let step_start = sqrt_price;
            let (tick_next, initialized) = self.next_initialized_tick(tick, zero_for_one);
            let tick_next = tick_next.clamp(MIN_TICK, MAX_TICK);
            let sqrt_next = sqrt_ratio_at_tick(tick_next)?;

            let target = if zero_for_one {
                sqrt_next.max(limit)
            } else {
                sqrt_next.min(limit)
            };

            let step = compute_swap_step(
                sqrt_price,
                target,
                liquidity,
                remaining,
                params.exact_input,
                self.fee_ppm,
            )?;
            sqrt_price = step.sqrt_price_next;

            let paid = step.amount_in + step.fee_amount;
            let consumed = if params.exact_input {
                paid
            } else {
                step.amount_out
            };
            remaining = remaining.checked_sub(consumed).ok_or(MathError::Overflow)?;
            amount_in += paid;
            amount_out += step.amount_out;
            fee += step.fee_amount;

            if sqrt_price == sqrt_next {
                if initialized {
                    let net = self.ticks.get(&tick_next).map(|t| t.liquidity_net).unwrap_or(0);
                    let net = if zero_for_one { -net } else { net };
                    liquidity = add_liquidity_delta(liquidity, net)?;
                    ticks_crossed += 1;
                }
                tick = if zero_for_one { tick_next - 1 } else { tick_next };
            } else if sqrt_price != step_start {
                tick = tick_at_sqrt_ratio(sqrt_price)?;
            }
        }

        Ok(SwapOutcome {
            amount_in,
            amount_out,
            fee,
            amount_remaining: remaining,
            sqrt_price_after: sqrt_price,
            tick_after: tick,
            liquidity_after: liquidity,
            ticks_crossed,
        })
    }
}

impl LiquidityPool for ConcentratedPool {
    fn slot(&self) -> Option<Slot> {
        self.slot
    }

    fn liquidity(&self) -> u128 {
        self.liquidity
    }

    fn fee_ppm(&self) -> u32 {
        self.fee_ppm
    }

    fn simulate_swap(&self, params: &SwapParams) -> Result<SwapOutcome, PoolError> {
        self.run_swap(params)
    }

    fn apply_swap(&mut self, params: &SwapParams) -> Result<SwapOutcome, PoolError> {
        let outcome = self.run_swap(params)?;
        self.slot = Some(Slot {
            sqrt_price_x96: outcome.sqrt_price_after,
            tick: outcome.tick_after,
        });
        self.liquidity = outcome.liquidity_after;
        if params.zero_for_one {
            self.fees_base += outcome.fee;
        } else {
            self.fees_quote += outcome.fee;
        }
        Ok(outcome)
    }
}
