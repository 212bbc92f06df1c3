use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    feed::MarketFeed,
    store::BarStore,
    types::{Bar, BarField, FeedStep},
};

/// Historical replay over a [`BarStore`], one tick per distinct timestamp.
///
/// A symbol without a bar at the current tick has no current price; its
/// history still includes every earlier bar.
#[derive(Clone, Debug)]
pub struct BarFeed {
    store: BarStore,
    timeline: Vec<DateTime<Utc>>,
    /// Index of the next tick to produce.
    next: usize,
    /// Per symbol: number of bars with timestamp <= current tick.
    seen: BTreeMap<String, usize>,
}

impl BarFeed {
    pub fn new(store: BarStore) -> Self {
        let timeline = store.timeline();
        let seen = store.symbols().into_iter().map(|s| (s, 0)).collect();
        Self {
            store,
            timeline,
            next: 0,
            seen,
        }
    }

    pub fn store(&self) -> &BarStore {
        &self.store
    }

    /// Number of ticks the feed will produce in total.
    pub fn tick_count(&self) -> usize {
        self.timeline.len()
    }

    /// The bar for `symbol` at the current tick, if there is one.
    pub fn current_bar(&self, symbol: &str) -> Option<&Bar> {
        let now = self.current_timestamp()?;
        let seen = *self.seen.get(symbol)?;
        let bar = self.store.series(symbol).get(seen.checked_sub(1)?)?;
        (bar.timestamp == now).then_some(bar)
    }

    /// Bars strictly before the current tick.
    fn past_bars(&self, symbol: &str) -> &[Bar] {
        let series = self.store.series(symbol);
        let seen = self.seen.get(symbol).copied().unwrap_or(0);
        let end = if self.current_bar(symbol).is_some() {
            seen - 1
        } else {
            seen
        };
        &series[..end]
    }
}

impl MarketFeed for BarFeed {
    fn current_timestamp(&self) -> Option<DateTime<Utc>> {
        self.next.checked_sub(1).and_then(|i| self.timeline.get(i)).copied()
    }

    fn current_price(&self, symbol: &str, field: &BarField) -> Option<f64> {
        self.current_bar(symbol).and_then(|b| b.field(field))
    }

    fn historical(&self, symbol: &str, field: &BarField, n: usize) -> Vec<f64> {
        let past = self.past_bars(symbol);
        let start = past.len().saturating_sub(n);
        past[start..].iter().filter_map(|b| b.field(field)).collect()
    }

    fn advance(&mut self) -> FeedStep {
        let Some(&now) = self.timeline.get(self.next) else {
            self.next = self.timeline.len() + 1;
            return FeedStep::EndOfFeed;
        };
        self.next += 1;

        for (symbol, seen) in self.seen.iter_mut() {
            let series = self.store.series(symbol);
            while *seen < series.len() && series[*seen].timestamp <= now {
                *seen += 1;
            }
        }
        debug!(tick = self.next, %now, "feed advanced");
        FeedStep::Continue { timestamp: now }
    }

    fn exhausted(&self) -> bool {
        self.next >= self.timeline.len()
    }

    fn symbols(&self) -> Vec<String> {
        self.store.symbols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day(n: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap() + Duration::days(n)
    }

    fn bar(sym: &str, n: i64, close: f64) -> Bar {
        Bar::new(sym, day(n), close, close, close, close, 100.0)
    }

    fn feed() -> BarFeed {
        // B has no bar on day 1
        BarFeed::new(
            BarStore::from_bars(vec![
                bar("A", 0, 10.0),
                bar("A", 1, 11.0),
                bar("A", 2, 12.0),
                bar("B", 0, 50.0),
                bar("B", 2, 52.0),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn nothing_is_current_before_first_advance() {
        let f = feed();
        assert_eq!(f.current_timestamp(), None);
        assert_eq!(f.current_price("A", &BarField::Close), None);
        assert!(f.historical("A", &BarField::Close, 5).is_empty());
        assert!(!f.exhausted());
    }

    #[test]
    fn advance_walks_the_union_timeline_then_ends() {
        let mut f = feed();
        assert_eq!(f.advance(), FeedStep::Continue { timestamp: day(0) });
        assert_eq!(f.advance(), FeedStep::Continue { timestamp: day(1) });
        assert_eq!(f.advance(), FeedStep::Continue { timestamp: day(2) });
        assert!(f.exhausted());
        // current tick is still readable after the last advance
        assert_eq!(f.current_price("A", &BarField::Close), Some(12.0));
        assert_eq!(f.advance(), FeedStep::EndOfFeed);
        assert_eq!(f.advance(), FeedStep::EndOfFeed);
    }

    #[test]
    fn missing_bar_means_no_current_price() {
        let mut f = feed();
        f.advance();
        f.advance();
        assert_eq!(f.current_price("A", &BarField::Close), Some(11.0));
        assert_eq!(f.current_price("B", &BarField::Close), None);
        assert_eq!(f.historical("B", &BarField::Close, 3), vec![50.0]);
        assert_eq!(f.current_prices(&BarField::Close).len(), 1);
    }

    #[test]
    fn historical_excludes_current_tick() {
        let mut f = feed();
        for _ in 0..3 {
            f.advance();
        }
        assert_eq!(f.historical("A", &BarField::Close, 5), vec![10.0, 11.0]);
        assert_eq!(f.historical("A", &BarField::Close, 1), vec![11.0]);
        assert_eq!(f.historical("B", &BarField::Close, 5), vec![50.0]);
    }
}
