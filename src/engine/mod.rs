// 8.0: core clearing engine. sequences every position change through
// deadline check -> quote -> slippage bound -> ledger + margin -> settle.
// deterministic, single owner of all market state, no external I/O.

mod config;
mod core;
mod orders;
mod positions;
mod results;

pub use config::EngineConfig;
pub use core::Engine;
pub use orders::{ClosePositionParams, OpenPositionParams, OrderStage, ReducePositionParams};
pub use results::{EngineError, ErrorClass, LiquidityResult, TradeResult};
