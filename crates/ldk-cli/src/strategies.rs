//! Demo strategies wired into `ldk backtest`.

use std::collections::BTreeSet;

use ldk_md::{BarField, MarketFeed};
use ldk_portfolio::Position;
use ldk_strategy::{Signal, Strategy, StrategyContext, StrategySpec};

/// Signal attribute recording the tick a position was opened on.
pub const ENTRY_TICK_ATTR: &str = "entry_tick";

// ---------------------------------------------------------------------------
// Turtle breakout
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct TurtleParams {
    /// Donchian window for breakout entries.
    pub entry_window: usize,
    /// Donchian window for channel exits.
    pub exit_window: usize,
    /// Bars averaged for the true-range volatility measure.
    pub atr_window: usize,
    /// Maximum fills (entry + adds) per position.
    pub max_units: usize,
    /// Add one unit each time price moves this many entry ATRs in favour.
    pub add_step_atr: f64,
    /// Trailing stop distance from the best price since entry, in entry ATRs.
    pub stop_atr: f64,
    /// Attribute name the sizing gate reads volatility from.
    pub volatility_attr: String,
}

impl Default for TurtleParams {
    fn default() -> Self {
        Self {
            entry_window: 20,
            exit_window: 10,
            atr_window: 20,
            max_units: 4,
            add_step_atr: 0.5,
            stop_atr: 2.0,
            volatility_attr: "atr".to_string(),
        }
    }
}

/// Donchian breakout with ATR pyramiding and a trailing stop.
///
/// Long when price closes above the `entry_window` high, short below the
/// low. Adds one unit per `add_step_atr` favourable move up to `max_units`,
/// exits on the trailing stop or an `exit_window` opposite breakout.
#[derive(Clone, Debug)]
pub struct TurtleBreakout {
    params: TurtleParams,
}

impl TurtleBreakout {
    pub fn new(params: TurtleParams) -> Self {
        Self { params }
    }

    /// Volatility for `symbol`: the bar's own volatility column if it has
    /// one, else the mean true range over the last `atr_window` bars.
    fn atr(&self, feed: &dyn MarketFeed, symbol: &str) -> Option<f64> {
        let column = BarField::parse(&self.params.volatility_attr);
        if let Some(v) = feed.current_price(symbol, &column).filter(|v| *v > 0.0) {
            return Some(v);
        }
        let atr = average_true_range(feed, symbol, self.params.atr_window)?;
        (atr > 0.0).then_some(atr)
    }

    fn on_symbol(&self, ctx: &StrategyContext<'_>, symbol: &str) -> Option<Signal> {
        let price = ctx.price(symbol, &BarField::Close)?;
        let atr = self.atr(ctx.feed, symbol)?;

        let signal = match ctx.position(symbol) {
            Some(pos) => self.manage(ctx, pos, price)?,
            None => {
                let (high, low) = channel(ctx.feed, symbol, self.params.entry_window)?;
                if price > high {
                    Signal::open_long(symbol)
                } else if price < low {
                    Signal::open_short(symbol)
                } else {
                    return None;
                }
            }
        };

        Some(
            signal
                .with_confidence(1.0)
                .with_attr(self.params.volatility_attr.as_str(), atr)
                .with_attr(ENTRY_TICK_ATTR, ctx.tick),
        )
    }

    fn manage(&self, ctx: &StrategyContext<'_>, pos: &Position, price: f64) -> Option<Signal> {
        let first = pos.first_fill()?;
        let last = pos.last_fill()?;
        let symbol = pos.symbol.as_str();
        let unit_atr = first
            .attrs
            .get(&self.params.volatility_attr)
            .and_then(|v| v.as_f64())?;
        let since = first
            .attrs
            .get(ENTRY_TICK_ATTR)
            .and_then(|v| v.as_u64())
            .map(|t| ctx.tick.saturating_sub(t) as usize)
            .unwrap_or(0);
        let can_add = pos.fills.len() < self.params.max_units;
        let step = self.params.add_step_atr * unit_atr;
        let stop = self.params.stop_atr * unit_atr;
        let (exit_high, exit_low) = channel(ctx.feed, symbol, self.params.exit_window)?;

        if pos.is_long() {
            if can_add && last.price + step <= price {
                return Some(Signal::extend(symbol));
            }
            let best = ctx
                .feed
                .historical(symbol, &BarField::High, since)
                .into_iter()
                .fold(f64::NEG_INFINITY, f64::max);
            if best - stop > price || exit_low > price {
                return Some(Signal::close(symbol));
            }
        } else {
            if can_add && last.price - step >= price {
                return Some(Signal::extend(symbol));
            }
            let best = ctx
                .feed
                .historical(symbol, &BarField::Low, since)
                .into_iter()
                .fold(f64::INFINITY, f64::min);
            if best + stop < price || exit_high < price {
                return Some(Signal::close(symbol));
            }
        }
        None
    }
}

impl Strategy for TurtleBreakout {
    fn spec(&self) -> StrategySpec {
        let warmup = self
            .params
            .entry_window
            .max(self.params.exit_window)
            .max(self.params.atr_window + 1);
        StrategySpec::new("turtle-breakout", warmup)
    }

    fn on_tick(&mut self, ctx: &StrategyContext<'_>) -> Vec<Signal> {
        ctx.symbols()
            .iter()
            .filter_map(|s| self.on_symbol(ctx, s))
            .collect()
    }
}

/// (highest high, lowest low) over the last `n` completed bars.
fn channel(feed: &dyn MarketFeed, symbol: &str, n: usize) -> Option<(f64, f64)> {
    let highs = feed.historical(symbol, &BarField::High, n);
    let lows = feed.historical(symbol, &BarField::Low, n);
    if n == 0 || highs.len() < n || lows.len() < n {
        return None;
    }
    let high = highs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let low = lows.iter().copied().fold(f64::INFINITY, f64::min);
    Some((high, low))
}

/// Mean true range of the last `n` completed bars (needs `n + 1` closes).
pub fn average_true_range(feed: &dyn MarketFeed, symbol: &str, n: usize) -> Option<f64> {
    let highs = feed.historical(symbol, &BarField::High, n);
    let lows = feed.historical(symbol, &BarField::Low, n);
    let closes = feed.historical(symbol, &BarField::Close, n + 1);
    if n == 0 || highs.len() < n || lows.len() < n || closes.len() < n + 1 {
        return None;
    }
    let sum: f64 = (0..n)
        .map(|i| {
            let prev_close = closes[i];
            (highs[i] - lows[i])
                .max((highs[i] - prev_close).abs())
                .max((lows[i] - prev_close).abs())
        })
        .sum();
    Some(sum / n as f64)
}

// ---------------------------------------------------------------------------
// Buy and hold
// ---------------------------------------------------------------------------

/// Opens one long per symbol on its first priced tick and never exits.
///
/// The volatility attribute is set so the sizing gate spends `allocation`
/// of equity, split evenly across the feed's symbols.
#[derive(Clone, Debug)]
pub struct BuyAndHold {
    volatility_attr: String,
    risk_fraction: f64,
    allocation: f64,
    opened: BTreeSet<String>,
}

impl BuyAndHold {
    pub fn new(volatility_attr: impl Into<String>, risk_fraction: f64, allocation: f64) -> Self {
        Self {
            volatility_attr: volatility_attr.into(),
            risk_fraction,
            allocation,
            opened: BTreeSet::new(),
        }
    }
}

impl Strategy for BuyAndHold {
    fn spec(&self) -> StrategySpec {
        StrategySpec::new("buy-and-hold", 0)
    }

    fn on_tick(&mut self, ctx: &StrategyContext<'_>) -> Vec<Signal> {
        let symbols = ctx.symbols();
        let share = self.allocation / symbols.len().max(1) as f64;
        // budget = equity * risk_fraction / vol = equity * share
        let vol = self.risk_fraction / share;

        let mut out = Vec::new();
        for symbol in symbols {
            if self.opened.contains(&symbol) || ctx.price(&symbol, &BarField::Close).is_none() {
                continue;
            }
            self.opened.insert(symbol.clone());
            out.push(Signal::open_long(symbol).with_attr(self.volatility_attr.as_str(), vol));
        }
        out
    }
}
