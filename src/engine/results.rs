// 8.0.2: result types and errors for engine operations.

use crate::collateral::CollateralError;
use crate::margin::MarginError;
use crate::market::MarketError;
use crate::math::MathError;
use crate::position::ChangeKind;
use crate::quote::QuoteError;
use crate::slippage::SlippageError;
use crate::liquidity::PoolError;
use crate::types::{MarketId, Price, Quote, SignedSize, SwapKind, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Realized amounts of a settled request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeResult {
    pub market_id: MarketId,
    pub kind: SwapKind,
    pub change: ChangeKind,
    /// signed base delta applied to the trader (+ bought)
    pub base: Decimal,
    /// signed quote delta applied to the trader (+ received)
    pub quote: Decimal,
    /// fee paid, in quote terms
    pub fee: Quote,
    pub realized_pnl: Quote,
    pub new_size: SignedSize,
    pub price_after: Price,
    pub tick_after: i32,
    /// stopped at a price limit before the exact amount was filled
    pub truncated: bool,
}

impl TradeResult {
    pub fn amount_base(&self) -> Decimal {
        self.base.abs()
    }

    pub fn amount_quote(&self) -> Decimal {
        self.quote.abs()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityResult {
    pub liquidity: u128,
    pub base: Decimal,
    pub quote: Decimal,
}

/// Which part of the request pipeline a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// bad input or state, caught before anything moves
    Validation,
    /// quote breached the caller's bound
    Slippage,
    /// post trade margin not met
    Solvency,
    /// arithmetic or collaborator failure
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Request expired: deadline {deadline:?}, now {now:?}")]
    Expired { deadline: Timestamp, now: Timestamp },

    #[error("Market {0:?} not found")]
    MarketNotFound(MarketId),

    #[error("Market {0:?} already exists")]
    MarketAlreadyExists(MarketId),

    #[error("Market {0:?} is not active")]
    MarketNotActive(MarketId),

    #[error("No open position in market {0:?}")]
    NoOpenPosition(MarketId),

    #[error("Reduce of {requested} exceeds position size {size}")]
    ReduceExceedsPosition { requested: Decimal, size: SignedSize },

    #[error("Insufficient margin: required {required}, available {available}")]
    InsufficientMargin { required: Quote, available: Quote },

    #[error("No price to value market {0:?}")]
    NoValuationPrice(MarketId),

    #[error("Slippage: {0}")]
    Slippage(#[from] SlippageError),

    #[error("Quote error: {0}")]
    Quote(#[from] QuoteError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    #[error("Collateral error: {0}")]
    Collateral(#[from] CollateralError),

    #[error("Math error: {0}")]
    Math(#[from] MathError),

    #[error("Margin error: {0}")]
    Margin(MarginError),
}

impl From<MarginError> for EngineError {
    fn from(err: MarginError) -> Self {
        match err {
            MarginError::InsufficientMargin {
                required,
                available,
            } => EngineError::InsufficientMargin {
                required,
                available,
            },
            other => EngineError::Margin(other),
        }
    }
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Expired { .. }
            | EngineError::MarketNotFound(_)
            | EngineError::MarketAlreadyExists(_)
            | EngineError::MarketNotActive(_)
            | EngineError::NoOpenPosition(_)
            | EngineError::ReduceExceedsPosition { .. }
            | EngineError::Market(_)
            | EngineError::Margin(_) => ErrorClass::Validation,
            EngineError::Slippage(_) => ErrorClass::Slippage,
            EngineError::InsufficientMargin { .. } | EngineError::NoValuationPrice(_) => {
                ErrorClass::Solvency
            }
            EngineError::Quote(QuoteError::Math(_)) | EngineError::Pool(PoolError::Math(_)) => {
                ErrorClass::Internal
            }
            EngineError::Quote(_) | EngineError::Pool(_) => ErrorClass::Validation,
            EngineError::Collateral(_) | EngineError::Math(_) => ErrorClass::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn classes_follow_pipeline_stage() {
        let expired = EngineError::Expired {
            deadline: Timestamp::from_secs(1),
            now: Timestamp::from_secs(2),
        };
        assert_eq!(expired.class(), ErrorClass::Validation);
        assert_eq!(EngineError::from(QuoteError::ZeroAmount).class(), ErrorClass::Validation);
        assert_eq!(
            EngineError::from(QuoteError::PoolNotInitialized).class(),
            ErrorClass::Validation
        );
        assert_eq!(
            EngineError::from(QuoteError::AmountTooLarge).class(),
            ErrorClass::Validation
        );

        let slipped = EngineError::from(SlippageError::TooLittleReceivedShort {
            received: dec!(198),
            bound: dec!(200),
        });
        assert_eq!(slipped.class(), ErrorClass::Slippage);

        let margin = EngineError::from(MarginError::InsufficientMargin {
            required: Quote::new(dec!(25)),
            available: Quote::new(dec!(3)),
        });
        assert!(matches!(margin, EngineError::InsufficientMargin { .. }));
        assert_eq!(margin.class(), ErrorClass::Solvency);

        assert_eq!(EngineError::from(MathError::Overflow).class(), ErrorClass::Internal);
        assert_eq!(
            EngineError::from(QuoteError::Math(MathError::Overflow)).class(),
            ErrorClass::Internal
        );
    }

    #[test]
    fn result_magnitudes() {
        let result = TradeResult {
            market_id: MarketId(1),
            kind: SwapKind::ExactBaseIn,
            change: ChangeKind::Open,
            base: dec!(-25),
            quote: dec!(198.4),
            fee: Quote::new(dec!(2)),
            realized_pnl: Quote::zero(),
            new_size: SignedSize::new(dec!(-25)),
            price_after: Price::new_unchecked(dec!(7.9)),
            tick_after: 20_000,
            truncated: false,
        };
        assert_eq!(result.amount_base(), dec!(25));
        assert_eq!(result.amount_quote(), dec!(198.4));
    }
}
