// 2.0: fixed point pool math. trader facing numbers are Decimal, the pool runs on U256 integers.
// amounts are 18 decimal integers (wei), sqrt prices are Q64.96.

pub mod full_math;
pub mod liquidity_amounts;
pub mod sqrt_price_math;
pub mod swap_math;
pub mod tick_math;

use crate::types::Price;
use ethnum::U256;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

pub const RESOLUTION: u32 = 96;
pub const Q96: U256 = U256::from_words(0, 1u128 << 96);
pub const WAD_DECIMALS: u32 = 18;
const WAD: u128 = 1_000_000_000_000_000_000;
const DECIMAL_MAX_MANTISSA: u128 = (1u128 << 96) - 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
    #[error("tick {0} outside the supported range")]
    InvalidTick(i32),
    #[error("sqrt price outside the supported range")]
    SqrtPriceOutOfRange,
    #[error("not enough liquidity to move the price that far")]
    InsufficientLiquidity,
    #[error("negative amount cannot be converted")]
    NegativeAmount,
    #[error("price outside representable range")]
    PriceOutOfRange,
    #[error("fee {0} ppm must be below 1000000")]
    InvalidFee(u32),
}

/// Decimal -> wei. Digits past 18 decimals are truncated toward zero.
pub fn to_wei(amount: Decimal) -> Result<U256, MathError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MathError::NegativeAmount);
    }
    let truncated = amount.round_dp_with_strategy(WAD_DECIMALS, RoundingStrategy::ToZero);
    let mantissa = truncated.mantissa().unsigned_abs();
    let scale = truncated.scale().min(WAD_DECIMALS);
    let factor = 10u128.pow(WAD_DECIMALS - scale);
    Ok(U256::new(mantissa) * U256::new(factor))
}

/// wei -> Decimal, exact. Fails when the value exceeds Decimal's 96 bit mantissa.
pub fn from_wei(wei: U256) -> Result<Decimal, MathError> {
    let (hi, lo) = wei.into_words();
    if hi != 0 || lo > i128::MAX as u128 {
        return Err(MathError::Overflow);
    }
    Decimal::try_from_i128_with_scale(lo as i128, WAD_DECIMALS)
        .map(|d| d.normalize())
        .map_err(|_| MathError::Overflow)
}

/// quote per base implied by a Q64.96 sqrt price, truncated to 18 decimals.
/// anything under one wei floors to one wei, anything past Decimal's range saturates.
pub fn price_from_sqrt_x96(sqrt_price_x96: U256) -> Result<Price, MathError> {
    let price_x96 = full_math::mul_div(sqrt_price_x96, sqrt_price_x96, Q96)?;
    let price_wei = full_math::mul_div(price_x96, U256::new(WAD), Q96)?.max(U256::ONE);
    Ok(Price::new_unchecked(decimal_floor(price_wei, WAD_DECIMALS)))
}

// value / 10^scale, shedding low digits until the mantissa fits in 96 bits
fn decimal_floor(mut value: U256, mut scale: u32) -> Decimal {
    let max_mantissa = U256::new(DECIMAL_MAX_MANTISSA);
    while value > max_mantissa {
        if scale == 0 {
            return Decimal::MAX;
        }
        value /= U256::new(10);
        scale -= 1;
    }
    let (_, lo) = value.into_words();
    Decimal::from_i128_with_scale(lo as i128, scale).normalize()
}

/// floor(sqrt(price) * 2^96)
pub fn sqrt_price_x96_from_price(price: Price) -> Result<U256, MathError> {
    let price_wei = to_wei(price.value())?;
    let ratio_x192 = full_math::mul_div(price_wei, U256::ONE << 192u32, U256::new(WAD))?;
    let sqrt = isqrt(ratio_x192);
    if sqrt < tick_math::MIN_SQRT_RATIO || sqrt >= tick_math::MAX_SQRT_RATIO {
        return Err(MathError::PriceOutOfRange);
    }
    Ok(sqrt)
}

// newton iteration from a power of two above the root
fn isqrt(n: U256) -> U256 {
    if n < U256::new(2) {
        return n;
    }
    let bits = 256 - n.leading_zeros();
    let mut x = U256::ONE << ((bits + 1) / 2);
    loop {
        let y = (x + n / x) >> 1u32;
        if y >= x {
            return x;
        }
        x = y;
    }
}
