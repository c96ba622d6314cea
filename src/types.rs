// 1.0: all the primitives live here. nothing in the engine works without these types.
// IDs, swap direction, sizes, prices, timestamps. each is a newtype so the compiler catches type mixups.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub u64);

// Long = profit when price goes up. Short = profit when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

// 1.1: which asset the trader hands to the pool. base in = short, quote in = long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    BaseToQuote,
    QuoteToBase,
}

impl Direction {
    pub fn from_base_to_quote(is_base_to_quote: bool) -> Self {
        if is_base_to_quote {
            Direction::BaseToQuote
        } else {
            Direction::QuoteToBase
        }
    }

    pub fn is_base_to_quote(&self) -> bool {
        matches!(self, Direction::BaseToQuote)
    }

    pub fn side(&self) -> Side {
        match self {
            Direction::BaseToQuote => Side::Short,
            Direction::QuoteToBase => Side::Long,
        }
    }

    // direction that unwinds exposure on `side`
    pub fn closing(side: Side) -> Self {
        match side {
            Side::Long => Direction::BaseToQuote,
            Side::Short => Direction::QuoteToBase,
        }
    }
}

// 1.2: the four (direction x exact side) swap shapes. each protects exactly one realized amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapKind {
    /// base -> quote, base fixed. caller floors the quote received.
    ExactBaseIn,
    /// base -> quote, quote fixed. caller caps the base paid.
    ExactQuoteOut,
    /// quote -> base, quote fixed. caller floors the base received.
    ExactQuoteIn,
    /// quote -> base, base fixed. caller caps the quote paid.
    ExactBaseOut,
}

impl SwapKind {
    pub fn new(direction: Direction, is_exact_input: bool) -> Self {
        match (direction, is_exact_input) {
            (Direction::BaseToQuote, true) => SwapKind::ExactBaseIn,
            (Direction::BaseToQuote, false) => SwapKind::ExactQuoteOut,
            (Direction::QuoteToBase, true) => SwapKind::ExactQuoteIn,
            (Direction::QuoteToBase, false) => SwapKind::ExactBaseOut,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            SwapKind::ExactBaseIn | SwapKind::ExactQuoteOut => Direction::BaseToQuote,
            SwapKind::ExactQuoteIn | SwapKind::ExactBaseOut => Direction::QuoteToBase,
        }
    }

    pub fn is_exact_input(&self) -> bool {
        matches!(self, SwapKind::ExactBaseIn | SwapKind::ExactQuoteIn)
    }
}

// 1.3: signed size: positive = long, negative = short. core to all position math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedSize(Decimal);

impl SignedSize {
    pub fn new(size: Decimal) -> Self {
        Self(size)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn abs(&self) -> Decimal {
        self.0.abs()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_long(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_short(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn side(&self) -> Option<Side> {
        if self.is_long() {
            Some(Side::Long)
        } else if self.is_short() {
            Some(Side::Short)
        } else {
            None
        }
    }
}

impl fmt::Display for SignedSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.4: price in quote currency per unit of base. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.5: quote currency amount. collateral, cost basis, pnl, fees all use this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote(Decimal);

impl Quote {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn add(&self, other: Quote) -> Self {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: Quote) -> Self {
        Self(self.0 - other.0)
    }

    pub fn mul(&self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Quote {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quote {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Quote {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(q))
    }
}

impl<'a> Sum<&'a Quote> for Quote {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(*q))
    }
}

// 1.6: unix timestamp in seconds. deadlines compare against this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Deadline that never expires.
    pub const MAX: Timestamp = Timestamp(u64::MAX);

    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp().max(0) as u64)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn saturating_add(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    pub fn elapsed_since(&self, earlier: &Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

// 1.7: opaque 32 byte tag carried through to events. all zero = no referrer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ReferralCode(pub [u8; 32]);

impl ReferralCode {
    pub const NONE: ReferralCode = ReferralCode([0u8; 32]);

    pub fn is_none(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}
