//! In-memory bar store.
//!
//! The store is the data provider a [`BarFeed`](crate::BarFeed) owns. It is
//! built explicitly (from bars, CSV, or a test fixture) and injected; there is
//! no process-wide cache.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::types::Bar;

#[derive(Debug, Clone, PartialEq)]
pub enum BarStoreError {
    EmptySymbol,
    /// Two bars for the same symbol share a timestamp.
    Duplicate {
        symbol: String,
        timestamp: DateTime<Utc>,
    },
    NonFinitePrice {
        symbol: String,
        timestamp: DateTime<Utc>,
    },
}

impl fmt::Display for BarStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarStoreError::EmptySymbol => write!(f, "bar store: empty symbol"),
            BarStoreError::Duplicate { symbol, timestamp } => {
                write!(f, "bar store: duplicate bar {symbol} @ {timestamp}")
            }
            BarStoreError::NonFinitePrice { symbol, timestamp } => {
                write!(f, "bar store: non-finite price {symbol} @ {timestamp}")
            }
        }
    }
}

impl std::error::Error for BarStoreError {}

/// Per-symbol bar series, each sorted by timestamp.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BarStore {
    series: BTreeMap<String, Vec<Bar>>,
}

impl BarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from bars in any order.
    pub fn from_bars<I>(bars: I) -> Result<Self, BarStoreError>
    where
        I: IntoIterator<Item = Bar>,
    {
        let mut store = Self::new();
        for bar in bars {
            store.insert(bar)?;
        }
        Ok(store)
    }

    /// Insert one bar, keeping its series ordered.
    pub fn insert(&mut self, bar: Bar) -> Result<(), BarStoreError> {
        if bar.symbol.trim().is_empty() {
            return Err(BarStoreError::EmptySymbol);
        }
        if ![bar.open, bar.high, bar.low, bar.close].iter().all(|p| p.is_finite()) {
            return Err(BarStoreError::NonFinitePrice {
                symbol: bar.symbol,
                timestamp: bar.timestamp,
            });
        }

        let series = self.series.entry(bar.symbol.clone()).or_default();
        match series.binary_search_by(|b| b.timestamp.cmp(&bar.timestamp)) {
            Ok(_) => Err(BarStoreError::Duplicate {
                symbol: bar.symbol,
                timestamp: bar.timestamp,
            }),
            Err(pos) => {
                series.insert(pos, bar);
                Ok(())
            }
        }
    }

    pub fn series(&self, symbol: &str) -> &[Bar] {
        self.series.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn symbols(&self) -> Vec<String> {
        self.series.keys().cloned().collect()
    }

    /// Union of all bar timestamps, ascending and de-duplicated.
    pub fn timeline(&self) -> Vec<DateTime<Utc>> {
        let mut ts: Vec<DateTime<Utc>> = self
            .series
            .values()
            .flat_map(|s| s.iter().map(|b| b.timestamp))
            .collect();
        ts.sort();
        ts.dedup();
        ts
    }

    /// Keep only bars inside `[start, end]` (either bound optional).
    pub fn restrict(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        let keep = |t: &DateTime<Utc>| start.map_or(true, |s| *t >= s) && end.map_or(true, |e| *t <= e);
        let series = self
            .series
            .iter()
            .map(|(sym, bars)| {
                let kept: Vec<Bar> = bars.iter().filter(|b| keep(&b.timestamp)).cloned().collect();
                (sym.clone(), kept)
            })
            .filter(|(_, bars)| !bars.is_empty())
            .collect();
        Self { series }
    }

    /// Total number of bars across all symbols.
    pub fn len(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
