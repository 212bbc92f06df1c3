//! Shared fixtures for scenario tests: daily bar builders and a scripted
//! strategy that replays a fixed signal plan.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use ldk_md::{Bar, BarFeed, BarStore, MarketFeed};
use ldk_strategy::{Signal, Strategy, StrategyContext, StrategySpec};

/// Close time of the n-th fixture day (day 0 = 2024-01-02 21:00 UTC).
pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap() + Duration::days(n)
}

/// One flat bar per close, on consecutive fixture days starting at day 0.
pub fn flat_bars(symbol: &str, closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::new(symbol, day(i as i64), c, c, c, c, 1_000.0))
        .collect()
}

/// Bars with a precomputed `atr` column.
pub fn bars_with_atr(symbol: &str, closes: &[f64], atr: f64) -> Vec<Bar> {
    flat_bars(symbol, closes)
        .into_iter()
        .map(|b| b.with_extra("atr", atr))
        .collect()
}

/// Replay feed over the given bars (any symbols, any order).
pub fn feed(bars: Vec<Bar>) -> BarFeed {
    BarFeed::new(BarStore::from_bars(bars).unwrap())
}

/// Feed already advanced `ticks` times.
pub fn feed_at(bars: Vec<Bar>, ticks: usize) -> BarFeed {
    let mut f = feed(bars);
    for _ in 0..ticks {
        f.advance();
    }
    f
}

/// What the scripted strategy observed on each tick.
#[derive(Clone, Debug, PartialEq)]
pub struct TickRecord {
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub cash: f64,
    pub open_symbols: Vec<String>,
}

/// Emits a fixed set of signals on given (1-based) ticks and records every
/// tick it sees.
#[derive(Clone, Debug, Default)]
pub struct ScriptedStrategy {
    plan: BTreeMap<u64, Vec<Signal>>,
    seen: Arc<Mutex<Vec<TickRecord>>>,
}

impl ScriptedStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, tick: u64, signals: Vec<Signal>) -> Self {
        self.plan.entry(tick).or_default().extend(signals);
        self
    }

    /// Shared handle to the tick log; stays valid after the strategy is boxed.
    pub fn log(&self) -> Arc<Mutex<Vec<TickRecord>>> {
        Arc::clone(&self.seen)
    }
}

impl Strategy for ScriptedStrategy {
    fn spec(&self) -> StrategySpec {
        StrategySpec::new("scripted", 0)
    }

    fn on_tick(&mut self, ctx: &StrategyContext<'_>) -> Vec<Signal> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(TickRecord {
                tick: ctx.tick,
                timestamp: ctx.timestamp,
                cash: ctx.ledger.cash(),
                open_symbols: ctx.ledger.positions().keys().cloned().collect(),
            });
        }
        self.plan.get(&ctx.tick).cloned().unwrap_or_default()
    }
}
