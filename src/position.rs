// 6.0: position ledger. size in base, open notional (cost basis) in quote, both signed.
// long = +size / -notional, short = -size / +notional. pnl = size * mark + notional.
// 6.1 has increase/reduce/close/flip handling in apply_swap at the bottom.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::quote::SwapQuote;
use crate::types::{AccountId, MarketId, Price, Quote, Side, SignedSize, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub market_id: MarketId,
    pub size: SignedSize,
    pub open_notional: Quote,
    // lifetime realized pnl for this market
    pub realized_pnl: Quote,
    pub opened_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Position {
    pub fn flat(market_id: MarketId, timestamp: Timestamp) -> Self {
        Self {
            market_id,
            size: SignedSize::zero(),
            open_notional: Quote::zero(),
            realized_pnl: Quote::zero(),
            opened_at: timestamp,
            updated_at: timestamp,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_zero()
    }

    pub fn side(&self) -> Option<Side> {
        self.size.side()
    }

    // 6.2: paper gains/losses at a valuation price
    pub fn unrealized_pnl(&self, price: Price) -> Quote {
        Quote::new(self.size.value() * price.value() + self.open_notional.value())
    }

    pub fn notional_value(&self, price: Price) -> Quote {
        Quote::new(self.size.abs() * price.value())
    }

    /// average price paid per unit of base, None when flat
    pub fn entry_price(&self) -> Option<Price> {
        if self.size.is_zero() {
            return None;
        }
        Price::new(-self.open_notional.value() / self.size.value())
    }
}

/// Signed deltas a swap applies to a trader. positive base = bought base, positive quote = received quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapDelta {
    pub base: Decimal,
    pub quote: Decimal,
}

impl SwapDelta {
    pub fn new(base: Decimal, quote: Decimal) -> Self {
        Self { base, quote }
    }

    // magnitude + sign form, as the pool reports amounts
    pub fn from_parts(
        amount_base: Decimal,
        base_positive: bool,
        amount_quote: Decimal,
        quote_positive: bool,
    ) -> Self {
        let base = if base_positive { amount_base.abs() } else { -amount_base.abs() };
        let quote = if quote_positive { amount_quote.abs() } else { -amount_quote.abs() };
        Self { base, quote }
    }

    pub fn from_swap(quote: &SwapQuote) -> Self {
        Self {
            base: quote.exchanged_base(),
            quote: quote.exchanged_quote(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Open,
    Increase,
    Reduce,
    Close,
    Flip,
}

impl ChangeKind {
    // true when the trade added exposure on some side
    pub fn adds_exposure(&self) -> bool {
        matches!(self, ChangeKind::Open | ChangeKind::Increase | ChangeKind::Flip)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionChange {
    pub kind: ChangeKind,
    pub old_size: SignedSize,
    pub new_size: SignedSize,
    pub open_notional: Quote,
    /// pnl realized by this swap only
    pub realized_pnl: Quote,
}

// 6.3: cost basis split. returns (new size, new notional, realized pnl, kind)
fn apply_delta(
    size: Decimal,
    notional: Decimal,
    delta: &SwapDelta,
) -> (Decimal, Decimal, Decimal, ChangeKind) {
    let new_size = size + delta.base;

    if size.is_zero() {
        return (new_size, notional + delta.quote, Decimal::ZERO, ChangeKind::Open);
    }
    let same_direction = (size > Decimal::ZERO) == (delta.base > Decimal::ZERO);
    if same_direction || delta.base.is_zero() {
        return (new_size, notional + delta.quote, Decimal::ZERO, ChangeKind::Increase);
    }

    let old_abs = size.abs();
    let delta_abs = delta.base.abs();

    if delta_abs <= old_abs {
        // reducing: the closed fraction takes its share of the basis
        let closed_basis = notional * delta_abs / old_abs;
        let realized = delta.quote + closed_basis;
        let remaining = notional + delta.quote - realized;
        if new_size.is_zero() {
            // flat carries no basis. fold any rounding dust into realized
            return (Decimal::ZERO, Decimal::ZERO, realized + remaining, ChangeKind::Close);
        }
        return (new_size, remaining, realized, ChangeKind::Reduce);
    }

    // flipping: part of the quote closes the old side, the rest opens the new one
    let closing_quote = delta.quote * old_abs / delta_abs;
    let realized = closing_quote + notional;
    let opening_quote = delta.quote - closing_quote;
    (new_size, opening_quote, realized, ChangeKind::Flip)
}

// 6.4: per (trader, market) positions. lazily created, never removed, decays to flat.
#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    positions: HashMap<(AccountId, MarketId), Position>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, trader: AccountId, market: MarketId) -> Option<&Position> {
        self.positions.get(&(trader, market))
    }

    pub fn size(&self, trader: AccountId, market: MarketId) -> SignedSize {
        self.get(trader, market)
            .map(|p| p.size)
            .unwrap_or_else(SignedSize::zero)
    }

    // open (non flat) positions for a trader
    pub fn open_positions(&self, trader: AccountId) -> impl Iterator<Item = &Position> {
        self.positions
            .iter()
            .filter(move |((owner, _), p)| *owner == trader && !p.is_empty())
            .map(|(_, p)| p)
    }

    // everything a rollback needs to put this entry back
    pub fn snapshot(&self, trader: AccountId, market: MarketId) -> Option<Position> {
        self.get(trader, market).cloned()
    }

    pub fn restore(&mut self, trader: AccountId, market: MarketId, snapshot: Option<Position>) {
        match snapshot {
            Some(position) => {
                self.positions.insert((trader, market), position);
            }
            None => {
                self.positions.remove(&(trader, market));
            }
        }
    }

    /// Add a swap's signed deltas to the stored position. No margin validation here.
    pub fn apply_swap(
        &mut self,
        trader: AccountId,
        market: MarketId,
        delta: SwapDelta,
        timestamp: Timestamp,
    ) -> PositionChange {
        let position = self
            .positions
            .entry((trader, market))
            .or_insert_with(|| Position::flat(market, timestamp));

        let old_size = position.size;
        let (new_size, new_notional, realized, kind) =
            apply_delta(old_size.value(), position.open_notional.value(), &delta);

        if old_size.is_zero() || kind == ChangeKind::Flip {
            position.opened_at = timestamp;
        }
        position.size = SignedSize::new(new_size);
        position.open_notional = Quote::new(new_notional);
        position.realized_pnl = position.realized_pnl.add(Quote::new(realized));
        position.updated_at = timestamp;

        PositionChange {
            kind,
            old_size,
            new_size: position.size,
            open_notional: position.open_notional,
            realized_pnl: Quote::new(realized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const TRADER: AccountId = AccountId(1);
    const MARKET: MarketId = MarketId(0);

    fn ts() -> Timestamp {
        Timestamp::from_secs(1_000)
    }

    #[test]
    fn open_long_records_cost_basis() {
        let mut ledger = PositionLedger::new();
        let change = ledger.apply_swap(TRADER, MARKET, SwapDelta::new(dec!(2), dec!(-20)), ts());
        assert_eq!(change.kind, ChangeKind::Open);
        let pos = ledger.get(TRADER, MARKET).unwrap();
        assert_eq!(pos.size.value(), dec!(2));
        assert_eq!(pos.open_notional.value(), dec!(-20));
        assert_eq!(pos.entry_price().unwrap().value(), dec!(10));
    }

    #[test]
    fn unrealized_pnl_by_side() {
        let mut ledger = PositionLedger::new();
        ledger.apply_swap(TRADER, MARKET, SwapDelta::new(dec!(2), dec!(-20)), ts());
        let pos = ledger.get(TRADER, MARKET).unwrap();
        assert_eq!(pos.unrealized_pnl(Price::new_unchecked(dec!(12))).value(), dec!(4));

        let short = AccountId(2);
        ledger.apply_swap(short, MARKET, SwapDelta::new(dec!(-2), dec!(20)), ts());
        let pos = ledger.get(short, MARKET).unwrap();
        assert_eq!(pos.unrealized_pnl(Price::new_unchecked(dec!(12))).value(), dec!(-4));
    }

    #[test]
    fn partial_reduce_realizes_proportionally() {
        let mut ledger = PositionLedger::new();
        ledger.apply_swap(TRADER, MARKET, SwapDelta::new(dec!(4), dec!(-40)), ts());
        // sell 1 at 12
        let change = ledger.apply_swap(TRADER, MARKET, SwapDelta::new(dec!(-1), dec!(12)), ts());
        assert_eq!(change.kind, ChangeKind::Reduce);
        assert_eq!(change.realized_pnl.value(), dec!(2));
        let pos = ledger.get(TRADER, MARKET).unwrap();
        assert_eq!(pos.size.value(), dec!(3));
        assert_eq!(pos.open_notional.value(), dec!(-30));
        assert_eq!(pos.entry_price().unwrap().value(), dec!(10));
    }

    #[test]
    fn close_leaves_exactly_flat() {
        let mut ledger = PositionLedger::new();
        ledger.apply_swap(TRADER, MARKET, SwapDelta::new(dec!(-3), dec!(29.7)), ts());
        let change = ledger.apply_swap(TRADER, MARKET, SwapDelta::new(dec!(3), dec!(-31.1)), ts());
        assert_eq!(change.kind, ChangeKind::Close);
        assert_eq!(change.realized_pnl.value(), dec!(-1.4));
        let pos = ledger.get(TRADER, MARKET).unwrap();
        assert!(pos.is_empty());
        assert!(pos.open_notional.is_zero());
        assert_eq!(pos.realized_pnl.value(), dec!(-1.4));
        assert_eq!(ledger.open_positions(TRADER).count(), 0);
    }

    #[test]
    fn flip_splits_quote_between_legs() {
        let mut ledger = PositionLedger::new();
        ledger.apply_swap(TRADER, MARKET, SwapDelta::new(dec!(1), dec!(-10)), ts());
        // sell 3 at 11: 1 closes the long, 2 open a short
        let change = ledger.apply_swap(TRADER, MARKET, SwapDelta::new(dec!(-3), dec!(33)), ts());
        assert_eq!(change.kind, ChangeKind::Flip);
        assert_eq!(change.realized_pnl.value(), dec!(1));
        let pos = ledger.get(TRADER, MARKET).unwrap();
        assert_eq!(pos.size.value(), dec!(-2));
        assert_eq!(pos.open_notional.value(), dec!(22));
    }

    #[test]
    fn signed_parts_constructor() {
        let delta = SwapDelta::from_parts(dec!(5), false, dec!(50), true);
        assert_eq!(delta, SwapDelta::new(dec!(-5), dec!(50)));
    }

    #[test]
    fn restore_puts_back_snapshot() {
        let mut ledger = PositionLedger::new();
        let before = ledger.snapshot(TRADER, MARKET);
        ledger.apply_swap(TRADER, MARKET, SwapDelta::new(dec!(1), dec!(-10)), ts());
        ledger.restore(TRADER, MARKET, before);
        assert!(ledger.get(TRADER, MARKET).is_none());

        ledger.apply_swap(TRADER, MARKET, SwapDelta::new(dec!(1), dec!(-10)), ts());
        let snap = ledger.snapshot(TRADER, MARKET);
        ledger.apply_swap(TRADER, MARKET, SwapDelta::new(dec!(1), dec!(-11)), ts());
        ledger.restore(TRADER, MARKET, snap.clone());
        assert_eq!(ledger.snapshot(TRADER, MARKET), snap);
    }

    #[test]
    fn size_is_sum_of_deltas() {
        let mut ledger = PositionLedger::new();
        let deltas = [dec!(1.5), dec!(-0.5), dec!(-3), dec!(2.25), dec!(0.75)];
        for (i, base) in deltas.iter().enumerate() {
            let quote = -*base * dec!(10) + Decimal::from(i as u32);
            ledger.apply_swap(TRADER, MARKET, SwapDelta::new(*base, quote), ts());
        }
        let total: Decimal = deltas.iter().sum();
        assert_eq!(ledger.size(TRADER, MARKET).value(), total);
    }
}
