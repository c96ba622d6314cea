//! vAMM clearing simulation.
//!
//! Seeds a pool at 10 quote per base with 100 base / 1000 quote of full range
//! liquidity, then replays open, close and slippage scenarios against it.
//! Pass a venue TOML path as the first argument to override the development preset.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vamm_clearing::math::tick_math::full_range_ticks;
use vamm_clearing::*;

const TRADER: AccountId = AccountId(1);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let venue = match std::env::args().nth(1) {
        Some(path) => VenueConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => Environment::Development.config(),
    };
    let market = venue
        .markets
        .first()
        .cloned()
        .context("venue config has no markets")?;

    info!(market = %market.name, fee_ppm = market.fee_ppm, "vAMM clearing simulation");

    scenario_1_short_below_floor(&venue, &market)?;
    scenario_2_long_below_floor(&venue, &market)?;
    scenario_3_open_and_close(&venue, &market)?;
    scenario_4_reduce_and_flip(&venue, &market)?;
    scenario_5_impact_cap(&venue, &market)?;
    scenario_6_margin_rejection(&venue, &market)?;

    info!("all simulations completed");
    Ok(())
}

/// Fresh engine with one seeded market and a funded trader.
fn seeded_engine(venue: &VenueConfig, market: &MarketConfig) -> Result<Engine> {
    let mut engine = Engine::in_memory(venue.engine.clone());
    engine.set_time(Timestamp::now());
    let id = engine.add_market(market.clone())?;
    engine.initialize_pool(id, Price::new_unchecked(dec!(10)))?;
    let (lower, upper) = full_range_ticks(market.tick_spacing);
    let added = engine.add_liquidity(id, lower, upper, dec!(100), dec!(1000))?;
    info!(
        liquidity = added.liquidity,
        base = %added.base,
        quote = %added.quote,
        "pool seeded at 10"
    );
    let now = engine.time();
    engine.collateral_mut().deposit(TRADER, Quote::new(dec!(1000)), now)?;
    Ok(engine)
}

fn report(label: &str, outcome: &std::result::Result<TradeResult, EngineError>) {
    match outcome {
        Ok(trade) => info!(
            scenario = label,
            base = %trade.base,
            quote = %trade.quote,
            fee = %trade.fee,
            size = %trade.new_size,
            realized = %trade.realized_pnl,
            price = %trade.price_after,
            truncated = trade.truncated,
            "settled"
        ),
        Err(err) => warn!(scenario = label, class = ?err.class(), error = %err, "rejected"),
    }
}

fn scenario_1_short_below_floor(venue: &VenueConfig, market: &MarketConfig) -> Result<()> {
    let mut engine = seeded_engine(venue, market)?;
    // 25 base in cannot clear 200 quote once fee and impact are paid
    let params = OpenPositionParams::new(market.id, true, true, dec!(25)).with_bound(dec!(200));
    report("short 25 base, floor 200 quote", &engine.open_position(TRADER, params));
    Ok(())
}

fn scenario_2_long_below_floor(venue: &VenueConfig, market: &MarketConfig) -> Result<()> {
    let mut engine = seeded_engine(venue, market)?;
    let params = OpenPositionParams::new(market.id, false, true, dec!(250)).with_bound(dec!(20));
    report("long 250 quote, floor 20 base", &engine.open_position(TRADER, params));
    Ok(())
}

fn scenario_3_open_and_close(venue: &VenueConfig, market: &MarketConfig) -> Result<()> {
    let mut engine = seeded_engine(venue, market)?;
    let open = engine.open_position(TRADER, OpenPositionParams::new(market.id, true, true, dec!(25)));
    report("open short 25", &open);

    let capped = engine.close_position(TRADER, ClosePositionParams::new(market.id).with_bound(dec!(200)));
    report("close short, cap 200 quote", &capped);

    let close = engine.close_position(TRADER, ClosePositionParams::new(market.id));
    report("close short, unbounded", &close);

    info!(collateral = %engine.collateral().balance(TRADER), "after round trip");
    Ok(())
}

fn scenario_4_reduce_and_flip(venue: &VenueConfig, market: &MarketConfig) -> Result<()> {
    let mut engine = seeded_engine(venue, market)?;
    report(
        "long 4 base",
        &engine.open_position(TRADER, OpenPositionParams::new(market.id, false, false, dec!(4))),
    );
    report(
        "reduce 1.5",
        &engine.reduce_position(TRADER, ReducePositionParams::new(market.id, dec!(1.5))),
    );
    report(
        "sell 5 base",
        &engine.open_position(TRADER, OpenPositionParams::new(market.id, true, true, dec!(5))),
    );
    Ok(())
}

fn scenario_5_impact_cap(venue: &VenueConfig, market: &MarketConfig) -> Result<()> {
    let mut capped = market.clone();
    capped.max_tick_crossed = 100;
    let mut engine = seeded_engine(venue, &capped)?;
    report(
        "short 50 base, 100 tick cap",
        &engine.open_position(TRADER, OpenPositionParams::new(market.id, true, true, dec!(50))),
    );
    Ok(())
}

fn scenario_6_margin_rejection(venue: &VenueConfig, market: &MarketConfig) -> Result<()> {
    let mut engine = seeded_engine(venue, market)?;
    let poor = AccountId(2);
    let now = engine.time();
    engine.collateral_mut().deposit(poor, Quote::new(dec!(1)), now)?;
    report(
        "long 5 base on 1 collateral",
        &engine.open_position(poor, OpenPositionParams::new(market.id, false, false, dec!(5))),
    );
    let untouched = engine
        .position(poor, market.id)
        .map(|p| p.size.value())
        .unwrap_or(Decimal::ZERO);
    info!(size = %untouched, "position after rejection");
    Ok(())
}
