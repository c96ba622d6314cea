// vamm-clearing: perpetual futures clearing core on a virtual AMM.
// traders swap against a concentrated liquidity pool. the swap sets their position,
// a caller bound protects them from slippage, and margin is checked before anything commits.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: MarketId, Direction, SwapKind, SignedSize, Price, Quote
//   2.x  math/: Q64.96 fixed point, tick math, swap steps, wei conversion
//   3.x  liquidity.rs: LiquidityPool trait + concentrated liquidity pool
//   4.x  quote.rs: request -> swap, price limits, impact cap
//   5.x  slippage.rs: opposite amount bound per swap shape
//   6.x  position.rs: position ledger, cost basis, realized pnl
//   7.x  config.rs: venue config, TOML loading, env presets
//   8.x  engine/: open/close/reduce pipeline, rollback, valuation
//   9.x  price_feed.rs: oracle seam for valuation
//   10.x collateral.rs: collateral ledger seam + in-memory vault
//   11.x events.rs: state transition events for audit
//   12.x market.rs: market config + runtime state
//   13.x margin.rs: initial margin and free collateral

// core clearing modules
pub mod engine;
pub mod events;
pub mod liquidity;
pub mod margin;
pub mod market;
pub mod math;
pub mod position;
pub mod quote;
pub mod slippage;
pub mod types;

// collaborator seams and config
pub mod collateral;
pub mod config;
pub mod price_feed;

// re exports for convenience
pub use engine::*;
pub use events::*;
pub use margin::*;
pub use market::*;
pub use position::*;
pub use slippage::*;
pub use types::*;
pub use collateral::{CollateralError, CollateralLedger, Vault};
pub use config::{ConfigError, Environment, VenueConfig};
pub use liquidity::{ConcentratedPool, LiquidityPool, PoolError};
pub use math::MathError;
pub use price_feed::{NoPriceFeed, PriceFeed, RoundData, StaticPriceFeed};
pub use quote::{QuoteError, QuoteRequest, SwapQuote};
