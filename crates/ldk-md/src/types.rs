use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which value of a bar a price lookup refers to.
///
/// Anything that is not one of the OHLCV columns is an extra column
/// carried by the bar (e.g. a precomputed `atr`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BarField {
    Open,
    High,
    Low,
    #[default]
    Close,
    Volume,
    Extra(String),
}

impl BarField {
    /// Case-insensitive parse; unknown names become [`BarField::Extra`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "open" => BarField::Open,
            "high" => BarField::High,
            "low" => BarField::Low,
            "close" => BarField::Close,
            "volume" => BarField::Volume,
            other => BarField::Extra(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BarField::Open => "open",
            BarField::High => "high",
            BarField::Low => "low",
            BarField::Close => "close",
            BarField::Volume => "volume",
            BarField::Extra(name) => name.as_str(),
        }
    }
}

impl fmt::Display for BarField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OHLCV bar for one symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    /// Bar close time (UTC).
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Additional numeric columns keyed by lower-case name.
    #[serde(default)]
    pub extra: BTreeMap<String, f64>,
}

impl Bar {
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: f64) -> Self {
        self.extra.insert(name.into().to_ascii_lowercase(), value);
        self
    }

    pub fn field(&self, field: &BarField) -> Option<f64> {
        match field {
            BarField::Open => Some(self.open),
            BarField::High => Some(self.high),
            BarField::Low => Some(self.low),
            BarField::Close => Some(self.close),
            BarField::Volume => Some(self.volume),
            BarField::Extra(name) => self.extra.get(name).copied(),
        }
    }
}

/// Result of advancing a feed by one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedStep {
    /// A new tick is current.
    Continue { timestamp: DateTime<Utc> },
    /// No more data. Normal termination, not a failure.
    EndOfFeed,
}
