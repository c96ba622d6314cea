// 5.0 slippage.rs: checks a quote against the caller's opposite amount bound.
// runs after quoting and before any ledger write. one error per swap shape so callers know which leg slipped.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::quote::SwapQuote;
use crate::types::{Direction, SwapKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlippageError {
    /// short, exact base in: quote received under the floor
    #[error("too little received (short): got {received} quote, wanted at least {bound}")]
    TooLittleReceivedShort { received: Decimal, bound: Decimal },
    /// short, exact quote out: base paid over the cap
    #[error("too much requested (short): paid {paid} base, allowed at most {bound}")]
    TooMuchRequestedShort { paid: Decimal, bound: Decimal },
    /// long, exact quote in: base received under the floor
    #[error("too little received (long): got {received} base, wanted at least {bound}")]
    TooLittleReceivedLong { received: Decimal, bound: Decimal },
    /// long, exact base out: quote paid over the cap
    #[error("too much requested (long): paid {paid} quote, allowed at most {bound}")]
    TooMuchRequestedLong { paid: Decimal, bound: Decimal },
}

impl SlippageError {
    pub fn kind(&self) -> SwapKind {
        match self {
            SlippageError::TooLittleReceivedShort { .. } => SwapKind::ExactBaseIn,
            SlippageError::TooMuchRequestedShort { .. } => SwapKind::ExactQuoteOut,
            SlippageError::TooLittleReceivedLong { .. } => SwapKind::ExactQuoteIn,
            SlippageError::TooMuchRequestedLong { .. } => SwapKind::ExactBaseOut,
        }
    }
}

/// Compare the protected amount of a fill against `bound`. A zero bound disables the check.
pub fn check_bound(
    kind: SwapKind,
    amount_base: Decimal,
    amount_quote: Decimal,
    bound: Decimal,
) -> Result<(), SlippageError> {
    if bound.is_zero() {
        return Ok(());
    }
    match kind {
        SwapKind::ExactBaseIn if amount_quote < bound => Err(SlippageError::TooLittleReceivedShort {
            received: amount_quote,
            bound,
        }),
        SwapKind::ExactQuoteOut if amount_base > bound => Err(SlippageError::TooMuchRequestedShort {
            paid: amount_base,
            bound,
        }),
        SwapKind::ExactQuoteIn if amount_base < bound => Err(SlippageError::TooLittleReceivedLong {
            received: amount_base,
            bound,
        }),
        SwapKind::ExactBaseOut if amount_quote > bound => Err(SlippageError::TooMuchRequestedLong {
            paid: amount_quote,
            bound,
        }),
        _ => Ok(()),
    }
}

// flag based entry point matching the request shape callers send
pub fn check_bound_flags(
    is_exact_input: bool,
    is_base_to_quote: bool,
    amount_base: Decimal,
    amount_quote: Decimal,
    bound: Decimal,
) -> Result<(), SlippageError> {
    let kind = SwapKind::new(Direction::from_base_to_quote(is_base_to_quote), is_exact_input);
    check_bound(kind, amount_base, amount_quote, bound)
}

pub fn check_quote(quote: &SwapQuote, bound: Decimal) -> Result<(), SlippageError> {
    check_bound(quote.kind, quote.amount_base, quote.amount_quote, bound)
}
