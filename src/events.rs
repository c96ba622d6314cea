// 11.0: every settled or rejected request produces an event. used for audit trails
// and notifying external systems. the EventPayload enum lists all event types.

use crate::engine::OrderStage;
use crate::market::MarketStatus;
use crate::position::ChangeKind;
use crate::types::{AccountId, Direction, MarketId, Price, Quote, ReferralCode, SignedSize, SwapKind, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Market events
    MarketAdded(MarketAddedEvent),
    MarketStatusChanged(MarketStatusChangedEvent),
    PoolInitialized(PoolInitializedEvent),
    LiquidityChanged(LiquidityChangedEvent),

    // Trade events
    PositionChanged(PositionChangedEvent),
    PnlSettled(PnlSettledEvent),
    ReferredTrade(ReferredTradeEvent),
    TradeRejected(TradeRejectedEvent),
}

impl EventPayload {
    pub fn name(&self) -> &'static str {
        match self {
            EventPayload::MarketAdded(_) => "market_added",
            EventPayload::MarketStatusChanged(_) => "market_status_changed",
            EventPayload::PoolInitialized(_) => "pool_initialized",
            EventPayload::LiquidityChanged(_) => "liquidity_changed",
            EventPayload::PositionChanged(_) => "position_changed",
            EventPayload::PnlSettled(_) => "pnl_settled",
            EventPayload::ReferredTrade(_) => "referred_trade",
            EventPayload::TradeRejected(_) => "trade_rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketAddedEvent {
    pub market_id: MarketId,
    pub name: String,
    pub fee_ppm: u32,
    pub tick_spacing: i32,
    pub max_tick_crossed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStatusChangedEvent {
    pub market_id: MarketId,
    pub old_status: MarketStatus,
    pub new_status: MarketStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolInitializedEvent {
    pub market_id: MarketId,
    pub price: Price,
    pub tick: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityChangedEvent {
    pub market_id: MarketId,
    pub lower_tick: i32,
    pub upper_tick: i32,
    /// positive on add, negative on remove
    pub liquidity_delta: i128,
    pub base: Decimal,
    pub quote: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionChangedEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub kind: SwapKind,
    pub change: ChangeKind,
    /// signed deltas applied to the trader
    pub exchanged_base: Decimal,
    pub exchanged_quote: Decimal,
    /// fee in quote terms
    pub fee: Quote,
    pub new_size: SignedSize,
    pub open_notional: Quote,
    pub realized_pnl: Quote,
    pub tick_after: i32,
    pub price_after: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlSettledEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub amount: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferredTradeEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub referral_code: ReferralCode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRejectedEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub direction: Option<Direction>,
    /// last stage the request passed before failing
    pub stage: OrderStage,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn event_serializes_to_json() {
        let event = Event::new(
            EventId(7),
            Timestamp::from_secs(1_700_000_000),
            EventPayload::PnlSettled(PnlSettledEvent {
                market_id: MarketId(1),
                account_id: AccountId(2),
                amount: Quote::new(dec!(-4.54)),
            }),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("PnlSettled"));
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, EventId(7));
        assert_eq!(back.payload.name(), "pnl_settled");
    }

    #[test]
    fn rejected_event_keeps_stage() {
        let payload = EventPayload::TradeRejected(TradeRejectedEvent {
            market_id: MarketId(1),
            account_id: AccountId(2),
            direction: Some(Direction::BaseToQuote),
            stage: OrderStage::Quoted,
            reason: "too little received".to_string(),
        });
        match payload {
            EventPayload::TradeRejected(ev) => assert_eq!(ev.stage, OrderStage::Quoted),
            _ => unreachable!(),
        }
    }
}
