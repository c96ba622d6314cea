// 2.3: token amounts between two sqrt prices, and the price reached after adding/removing an amount.
// base is token0, quote is token1. sqrt price = sqrt(quote / base) in Q64.96.

use super::full_math::{div_rounding_up, mul_div, mul_div_rounding_up};
use super::{MathError, Q96, RESOLUTION};
use ethnum::U256;

const MAX_U160: U256 = U256::from_words(0xffffffff, u128::MAX);

fn sorted(a: U256, b: U256) -> (U256, U256) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}

/// Base amount spanned by `liquidity` between two prices.
/// L * (sqrt_b - sqrt_a) / (sqrt_a * sqrt_b)
pub fn amount0_delta(
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, MathError> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_a, sqrt_b);
    if sqrt_a == U256::ZERO {
        return Err(MathError::SqrtPriceOutOfRange);
    }
    let numerator1 = U256::new(liquidity) << RESOLUTION;
    let numerator2 = sqrt_b - sqrt_a;

    if round_up {
        div_rounding_up(mul_div_rounding_up(numerator1, numerator2, sqrt_b)?, sqrt_a)
    } else {
        Ok(mul_div(numerator1, numerator2, sqrt_b)? / sqrt_a)
    }
}

/// Quote amount spanned by `liquidity` between two prices. L * (sqrt_b - sqrt_a)
pub fn amount1_delta(
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, MathError> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_a, sqrt_b);
    let diff = sqrt_b - sqrt_a;
    if round_up {
        mul_div_rounding_up(U256::new(liquidity), diff, Q96)
    } else {
        mul_div(U256::new(liquidity), diff, Q96)
    }
}

// base moves the price down when added. always rounds up so the price never overshoots
// in the trader's favour.
fn next_from_amount0_rounding_up(
    sqrt_price: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, MathError> {
    if amount == U256::ZERO {
        return Ok(sqrt_price);
    }
    let numerator1 = U256::new(liquidity) << RESOLUTION;

    if add {
        if let Some(product) = amount.checked_mul(sqrt_price) {
            if let Some(denominator) = numerator1.checked_add(product) {
                return mul_div_rounding_up(numerator1, sqrt_price, denominator);
            }
        }
        let denominator = (numerator1 / sqrt_price)
            .checked_add(amount)
            .ok_or(MathError::Overflow)?;
        div_rounding_up(numerator1, denominator)
    } else {
        let product = amount.checked_mul(sqrt_price).ok_or(MathError::Overflow)?;
        if numerator1 <= product {
            return Err(MathError::InsufficientLiquidity);
        }
        mul_div_rounding_up(numerator1, sqrt_price, numerator1 - product)
    }
}

// quote moves the price up when added. always rounds down.
fn next_from_amount1_rounding_down(
    sqrt_price: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, MathError> {
    let liquidity = U256::new(liquidity);

    if add {
        let quotient = if amount <= MAX_U160 {
            (amount << RESOLUTION) / liquidity
        } else {
            mul_div(amount, Q96, liquidity)?
        };
        sqrt_price.checked_add(quotient).ok_or(MathError::Overflow)
    } else {
        let quotient = if amount <= MAX_U160 {
            div_rounding_up(amount << RESOLUTION, liquidity)?
        } else {
            mul_div_rounding_up(amount, Q96, liquidity)?
        };
        if sqrt_price <= quotient {
            return Err(MathError::InsufficientLiquidity);
        }
        Ok(sqrt_price - quotient)
    }
}

/// Price after `amount_in` enters the pool. zero_for_one = base in.
pub fn next_sqrt_price_from_input(
    sqrt_price: U256,
    liquidity: u128,
    amount_in: U256,
    zero_for_one: bool,
) -> Result<U256, MathError> {
    if sqrt_price == U256::ZERO || liquidity == 0 {
        return Err(MathError::InsufficientLiquidity);
    }
    if zero_for_one {
        next_from_amount0_rounding_up(sqrt_price, liquidity, amount_in, true)
    } else {
        next_from_amount1_rounding_down(sqrt_price, liquidity, amount_in, true)
    }
}

/// Price after `amount_out` leaves the pool. zero_for_one = quote out.
pub fn next_sqrt_price_from_output(
    sqrt_price: U256,
    liquidity: u128,
    amount_out: U256,
    zero_for_one: bool,
) -> Result<U256, MathError> {
    if sqrt_price == U256::ZERO || liquidity == 0 {
        return Err(MathError::InsufficientLiquidity);
    }
    if zero_for_one {
        next_from_amount1_rounding_down(sqrt_price, liquidity, amount_out, false)
    } else {
        next_from_amount0_rounding_up(sqrt_price, liquidity, amount_out, false)
    }
}
