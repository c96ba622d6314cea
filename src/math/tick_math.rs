// 2.2: tick <-> sqrt price. price(tick) = 1.0001^tick, sqrt price stored as Q64.96.

use super::MathError;
use ethnum::U256;

pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = -MIN_TICK;

/// sqrt_ratio_at_tick(MIN_TICK)
pub const MIN_SQRT_RATIO: U256 = U256::from_words(0, 4295128739);
/// sqrt_ratio_at_tick(MAX_TICK)
pub const MAX_SQRT_RATIO: U256 =
    U256::from_words(0xfffd8963, 0xefd1fc6a506488495d951d5263988d26);

// sqrt(1.0001^-(2^i)) as Q128.128, one per bit of |tick| from bit 1 upward
const TICK_FACTORS: [(u32, u128); 19] = [
    (0x2, 0xfff97272373d413259a46990580e213a),
    (0x4, 0xfff2e50f5f656932ef12357cf3c7fdcc),
    (0x8, 0xffe5caca7e10e4e61c3624eaa0941cd0),
    (0x10, 0xffcb9843d60f6159c9db58835c926644),
    (0x20, 0xff973b41fa98c081472e6896dfb254c0),
    (0x40, 0xff2ea16466c96a3843ec78b326b52861),
    (0x80, 0xfe5dee046a99a2a811c461f1969c3053),
    (0x100, 0xfcbe86c7900a88aedcffc83b479aa3a4),
    (0x200, 0xf987a7253ac413176f2b074cf7815e54),
    (0x400, 0xf3392b0822b70005940c7a398e4b70f3),
    (0x800, 0xe7159475a2c29b7443b29c7fa6e889d9),
    (0x1000, 0xd097f3bdfd2022b8845ad8f792aa5825),
    (0x2000, 0xa9f746462d870fdf8a65dc1f90e061e5),
    (0x4000, 0x70d869a156d2a1b890bb3df62baf32f7),
    (0x8000, 0x31be135f97d08fd981231505542fcfa6),
    (0x10000, 0x9aa508b5b7a84e1c677de54f3e99bc9),
    (0x20000, 0x5d6af8dedb81196699c329225ee604),
    (0x40000, 0x2216e584f5fa1ea926041bedfe98),
    (0x80000, 0x48a170391f7dc42444e8fa2),
];

/// Q64.96 sqrt price at `tick`. Rounds up so that tick_at_sqrt_ratio inverts it exactly.
pub fn sqrt_ratio_at_tick(tick: i32) -> Result<U256, MathError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(MathError::InvalidTick(tick));
    }
    let abs_tick = tick.unsigned_abs();

    let mut ratio = if abs_tick & 0x1 != 0 {
        U256::new(0xfffcb933bd6fad37aa2d162d1a594001)
    } else {
        U256::ONE << 128u32
    };
    for (mask, factor) in TICK_FACTORS {
        if abs_tick & mask != 0 {
            ratio = (ratio * U256::new(factor)) >> 128u32;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 -> Q64.96, rounding up
    let low_bits = ratio & U256::new(u32::MAX as u128);
    let shifted = ratio >> 32u32;
    Ok(if low_bits == U256::ZERO {
        shifted
    } else {
        shifted + U256::ONE
    })
}

/// Greatest tick whose sqrt ratio is <= `sqrt_price_x96`.
pub fn tick_at_sqrt_ratio(sqrt_price_x96: U256) -> Result<i32, MathError> {
    if sqrt_price_x96 < MIN_SQRT_RATIO || sqrt_price_x96 >= MAX_SQRT_RATIO {
        return Err(MathError::SqrtPriceOutOfRange);
    }

    let (mut lo, mut hi) = (MIN_TICK, MAX_TICK);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if sqrt_ratio_at_tick(mid)? <= sqrt_price_x96 {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    Ok(lo)
}

/// Outermost ticks usable with a given spacing.
pub fn full_range_ticks(tick_spacing: i32) -> (i32, i32) {
    let spacing = tick_spacing.max(1);
    let lower = (MIN_TICK / spacing) * spacing;
    let upper = (MAX_TICK / spacing) * spacing;
    (lower, upper)
}
