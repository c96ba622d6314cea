// 2.5: liquidity <-> token amounts over a price range. used when seeding the pool.

use super::full_math::mul_div;
use super::sqrt_price_math::{amount0_delta, amount1_delta};
use super::{MathError, Q96};
use ethnum::U256;

fn to_u128(value: U256) -> Result<u128, MathError> {
    let (hi, lo) = value.into_words();
    if hi != 0 {
        return Err(MathError::Overflow);
    }
    Ok(lo)
}

fn sorted(a: U256, b: U256) -> (U256, U256) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}

pub fn liquidity_for_amount0(sqrt_a: U256, sqrt_b: U256, amount0: U256) -> Result<u128, MathError> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_a, sqrt_b);
    if sqrt_a == sqrt_b {
        return Err(MathError::DivisionByZero);
    }
    let intermediate = mul_div(sqrt_a, sqrt_b, Q96)?;
    to_u128(mul_div(amount0, intermediate, sqrt_b - sqrt_a)?)
}

pub fn liquidity_for_amount1(sqrt_a: U256, sqrt_b: U256, amount1: U256) -> Result<u128, MathError> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_a, sqrt_b);
    if sqrt_a == sqrt_b {
        return Err(MathError::DivisionByZero);
    }
    to_u128(mul_div(amount1, Q96, sqrt_b - sqrt_a)?)
}

/// Max liquidity that both amounts can back at the current price.
pub fn liquidity_for_amounts(
    sqrt_price: U256,
    sqrt_a: U256,
    sqrt_b: U256,
    amount0: U256,
    amount1: U256,
) -> Result<u128, MathError> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_a, sqrt_b);

    if sqrt_price <= sqrt_a {
        liquidity_for_amount0(sqrt_a, sqrt_b, amount0)
    } else if sqrt_price < sqrt_b {
        let l0 = liquidity_for_amount0(sqrt_price, sqrt_b, amount0)?;
        let l1 = liquidity_for_amount1(sqrt_a, sqrt_price, amount1)?;
        Ok(l0.min(l1))
    } else {
        liquidity_for_amount1(sqrt_a, sqrt_b, amount1)
    }
}

/// Token amounts represented by `liquidity` at the current price.
/// round_up when the caller is paying in (mint), down when withdrawing (burn).
pub fn amounts_for_liquidity(
    sqrt_price: U256,
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<(U256, U256), MathError> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_a, sqrt_b);

    if sqrt_price <= sqrt_a {
        Ok((amount0_delta(sqrt_a, sqrt_b, liquidity, round_up)?, U256::ZERO))
    } else if sqrt_price < sqrt_b {
        Ok((
            amount0_delta(sqrt_price, sqrt_b, liquidity, round_up)?,
            amount1_delta(sqrt_a, sqrt_price, liquidity, round_up)?,
        ))
    } else {
        Ok((U256::ZERO, amount1_delta(sqrt_a, sqrt_b, liquidity, round_up)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tick_math::sqrt_ratio_at_tick;

    const E18: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn in_range_uses_limiting_side() {
        let a = sqrt_ratio_at_tick(-1000).unwrap();
        let b = sqrt_ratio_at_tick(1000).unwrap();
        let p = Q96;
        let amount0 = U256::new(E18);
        let amount1 = U256::new(E18);
        let liquidity = liquidity_for_amounts(p, a, b, amount0, amount1).unwrap();
        assert!(liquidity > 0);

        let (used0, used1) = amounts_for_liquidity(p, a, b, liquidity, true).unwrap();
        // minting never asks for more than was offered, modulo the 1 wei round up
        assert!(used0 <= amount0 + U256::ONE);
        assert!(used1 <= amount1 + U256::ONE);
    }

    #[test]
    fn below_range_is_all_base() {
        let a = sqrt_ratio_at_tick(100).unwrap();
        let b = sqrt_ratio_at_tick(200).unwrap();
        let liquidity = liquidity_for_amounts(Q96, a, b, U256::new(E18), U256::ZERO).unwrap();
        let (used0, used1) = amounts_for_liquidity(Q96, a, b, liquidity, false).unwrap();
        assert!(used0 <= U256::new(E18));
        assert_eq!(used1, U256::ZERO);
    }

    #[test]
    fn above_range_is_all_quote() {
        let a = sqrt_ratio_at_tick(-200).unwrap();
        let b = sqrt_ratio_at_tick(-100).unwrap();
        let liquidity = liquidity_for_amounts(Q96, a, b, U256::ZERO, U256::new(E18)).unwrap();
        let (used0, used1) = amounts_for_liquidity(Q96, a, b, liquidity, false).unwrap();
        assert_eq!(used0, U256::ZERO);
        assert!(used1 <= U256::new(E18));
    }

    #[test]
    fn empty_range_rejected() {
        assert_eq!(
            liquidity_for_amount1(Q96, Q96, U256::new(E18)),
            Err(MathError::DivisionByZero)
        );
    }
}
