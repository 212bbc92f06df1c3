use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::types::{BarField, FeedStep};

/// Source of simulated market time and prices.
///
/// Missing data is an `Option`, end of data is [`FeedStep::EndOfFeed`];
/// neither is an error.
pub trait MarketFeed {
    /// Timestamp of the current tick (None before the first advance).
    fn current_timestamp(&self) -> Option<DateTime<Utc>>;

    /// Price of `field` for `symbol` at the current tick, if it has a bar.
    fn current_price(&self, symbol: &str, field: &BarField) -> Option<f64>;

    /// Up to `n` most recent values strictly before the current tick, oldest first.
    fn historical(&self, symbol: &str, field: &BarField, n: usize) -> Vec<f64>;

    /// Move to the next tick.
    fn advance(&mut self) -> FeedStep;

    /// True once no further tick can be produced.
    fn exhausted(&self) -> bool;

    /// Every symbol the feed can price.
    fn symbols(&self) -> Vec<String>;

    /// Current `field` value of every symbol that has a bar this tick.
    fn current_prices(&self, field: &BarField) -> BTreeMap<String, f64> {
        self.symbols()
            .into_iter()
            .filter_map(|s| self.current_price(&s, field).map(|p| (s, p)))
            .collect()
    }
}
