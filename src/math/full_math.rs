// 2.1: mul_div with a 512 bit intermediate. a * b never truncates before the divide.

use super::MathError;
use ethnum::U256;

// (hi, lo) words of the full 512 bit product
fn full_mul(a: U256, b: U256) -> (U256, U256) {
    let (a1, a0) = a.into_words();
    let (b1, b0) = b.into_words();

    // each partial product of two u128 words fits in 256 bits
    let p00 = U256::new(a0) * U256::new(b0);
    let p01 = U256::new(a0) * U256::new(b1);
    let p10 = U256::new(a1) * U256::new(b0);
    let p11 = U256::new(a1) * U256::new(b1);

    let (mid, mid_carry) = p01.overflowing_add(p10);
    let (lo, lo_carry) = p00.overflowing_add(mid << 128u32);

    let mut hi = p11 + (mid >> 128u32);
    if mid_carry {
        hi += U256::ONE << 128u32;
    }
    if lo_carry {
        hi += U256::ONE;
    }
    (hi, lo)
}

// restoring long division of (hi, lo) by d. caller guarantees hi < d so the quotient fits.
fn div_rem_512(hi: U256, lo: U256, d: U256) -> (U256, U256) {
    let mut rem = hi;
    let mut quot = U256::ZERO;
    for i in (0..256u32).rev() {
        let top = rem >> 255u32 == U256::ONE;
        rem = (rem << 1u32) | ((lo >> i) & U256::ONE);
        quot <<= 1u32;
        if top || rem >= d {
            rem = rem.wrapping_sub(d);
            quot |= U256::ONE;
        }
    }
    (quot, rem)
}

fn mul_div_rem(a: U256, b: U256, denominator: U256) -> Result<(U256, U256), MathError> {
    if denominator == U256::ZERO {
        return Err(MathError::DivisionByZero);
    }
    let (hi, lo) = full_mul(a, b);
    if hi == U256::ZERO {
        return Ok((lo / denominator, lo % denominator));
    }
    if hi >= denominator {
        return Err(MathError::Overflow);
    }
    Ok(div_rem_512(hi, lo, denominator))
}

/// floor(a * b / denominator)
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    mul_div_rem(a, b, denominator).map(|(q, _)| q)
}

/// ceil(a * b / denominator)
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    let (q, r) = mul_div_rem(a, b, denominator)?;
    if r == U256::ZERO {
        Ok(q)
    } else {
        q.checked_add(U256::ONE).ok_or(MathError::Overflow)
    }
}

pub fn div_rounding_up(a: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator == U256::ZERO {
        return Err(MathError::DivisionByZero);
    }
    let q = a / denominator;
    if a % denominator == U256::ZERO {
        Ok(q)
    } else {
        Ok(q + U256::ONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_match_native() {
        let a = U256::new(1_000_000_007);
        let b = U256::new(998_244_353);
        let d = U256::new(12345);
        let expected = (1_000_000_007u128 * 998_244_353u128) / 12345;
        assert_eq!(mul_div(a, b, d).unwrap(), U256::new(expected));
        assert_eq!(mul_div_rounding_up(a, b, d).unwrap(), U256::new(expected + 1));
    }

    #[test]
    fn product_wider_than_256_bits() {
        // (2^255 * 6) / 3 = 2^256 overflows, (2^255 * 6) / 12 = 2^254
        let a = U256::ONE << 255u32;
        let b = U256::new(6);
        assert_eq!(mul_div(a, b, U256::new(3)), Err(MathError::Overflow));
        assert_eq!(mul_div(a, b, U256::new(12)).unwrap(), U256::ONE << 254u32);

        // MAX * MAX / MAX = MAX
        assert_eq!(mul_div(U256::MAX, U256::MAX, U256::MAX).unwrap(), U256::MAX);
    }

    #[test]
    fn rounding_up_only_on_remainder() {
        let q96 = U256::ONE << 96u32;
        assert_eq!(mul_div_rounding_up(q96, U256::new(4), U256::new(2)).unwrap(), q96 << 1u32);
        assert_eq!(
            mul_div_rounding_up(U256::MAX, U256::new(3), U256::new(4)).unwrap(),
            mul_div(U256::MAX, U256::new(3), U256::new(4)).unwrap() + U256::ONE
        );
    }

    #[test]
    fn zero_denominator() {
        assert_eq!(mul_div(U256::ONE, U256::ONE, U256::ZERO), Err(MathError::DivisionByZero));
        assert_eq!(div_rounding_up(U256::ONE, U256::ZERO), Err(MathError::DivisionByZero));
    }

    #[test]
    fn div_rounding_up_basic() {
        assert_eq!(div_rounding_up(U256::new(10), U256::new(5)).unwrap(), U256::new(2));
        assert_eq!(div_rounding_up(U256::new(11), U256::new(5)).unwrap(), U256::new(3));
    }
}
