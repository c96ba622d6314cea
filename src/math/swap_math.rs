// 2.4: one swap step inside a range of constant liquidity. fee is charged on the input side.

use super::full_math::{mul_div, mul_div_rounding_up};
use super::sqrt_price_math::{
    amount0_delta, amount1_delta, next_sqrt_price_from_input, next_sqrt_price_from_output,
};
use super::MathError;
use ethnum::U256;

pub const FEE_DENOMINATOR: u32 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStep {
    pub sqrt_price_next: U256,
    /// gross of fee
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee_amount: U256,
}

/// Swap from `sqrt_current` toward `sqrt_target`, stopping early once `amount_remaining` is used up.
/// `amount_remaining` is the input budget when `exact_in`, otherwise the output still wanted.
pub fn compute_swap_step(
    sqrt_current: U256,
    sqrt_target: U256,
    liquidity: u128,
    amount_remaining: U256,
    exact_in: bool,
    fee_ppm: u32,
) -> Result<SwapStep, MathError> {
    if fee_ppm >= FEE_DENOMINATOR {
        return Err(MathError::InvalidFee(fee_ppm));
    }
    let zero_for_one = sqrt_current >= sqrt_target;
    let fee = U256::new(fee_ppm as u128);
    let denom = U256::new(FEE_DENOMINATOR as u128);

    let mut amount_in = U256::ZERO;
    let mut amount_out = U256::ZERO;
    let sqrt_price_next;

    if exact_in {
        let remaining_less_fee = mul_div(amount_remaining, denom - fee, denom)?;
        amount_in = if zero_for_one {
            amount0_delta(sqrt_target, sqrt_current, liquidity, true)?
        } else {
            amount1_delta(sqrt_current, sqrt_target, liquidity, true)?
        };
        sqrt_price_next = if remaining_less_fee >= amount_in {
            sqrt_target
        } else {
            next_sqrt_price_from_input(sqrt_current, liquidity, remaining_less_fee, zero_for_one)?
        };
    } else {
        amount_out = if zero_for_one {
            amount1_delta(sqrt_target, sqrt_current, liquidity, false)?
        } else {
            amount0_delta(sqrt_current, sqrt_target, liquidity, false)?
        };
        sqrt_price_next = if amount_remaining >= amount_out {
            sqrt_target
        } else {
            next_sqrt_price_from_output(sqrt_current, liquidity, amount_remaining, zero_for_one)?
        };
    }

    let reached_target = sqrt_target == sqrt_price_next;

    if zero_for_one {
        if !(reached_target && exact_in) {
            amount_in = amount0_delta(sqrt_price_next, sqrt_current, liquidity, true)?;
        }
        if !(reached_target && !exact_in) {
            amount_out = amount1_delta(sqrt_price_next, sqrt_current, liquidity, false)?;
        }
    } else {
        if !(reached_target && exact_in) {
            amount_in = amount1_delta(sqrt_current, sqrt_price_next, liquidity, true)?;
        }
        if !(reached_target && !exact_in) {
            amount_out = amount0_delta(sqrt_current, sqrt_price_next, liquidity, false)?;
        }
    }

    // rounding up the price can overshoot the requested output by a wei
    if !exact_in && amount_out > amount_remaining {
        amount_out = amount_remaining;
    }

    let fee_amount = if exact_in && !reached_target {
        // whatever is left of the budget goes to the pool
        amount_remaining - amount_in
    } else {
        mul_div_rounding_up(amount_in, fee, denom - fee)?
    };

    Ok(SwapStep {
        sqrt_price_next,
        amount_in,
        amount_out,
        fee_amount,
    })
}
