use chrono::{DateTime, Utc};
use ldk_md::{BarField, MarketFeed};
use ldk_portfolio::{Attrs, Ledger, Position};
use serde::{Deserialize, Serialize};

/// What a strategy wants done with a symbol.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    OpenLong,
    OpenShort,
    /// Add one original unit to an open position.
    Extend,
    /// Exit the whole position.
    Close,
}

impl SignalKind {
    /// Processing rank within one batch: exits first, then adds, then entries.
    pub fn priority(&self) -> u8 {
        match self {
            SignalKind::Close => 2,
            SignalKind::Extend => 1,
            SignalKind::OpenLong | SignalKind::OpenShort => 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub kind: SignalKind,
    /// Ranks signals of the same kind within a batch (higher first).
    pub confidence: f64,
    /// Strategy-defined bag threaded into orders and fills.
    #[serde(default)]
    pub attrs: Attrs,
}

impl Signal {
    pub fn new(symbol: impl Into<String>, kind: SignalKind) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
            confidence: 0.0,
            attrs: Attrs::new(),
        }
    }

    pub fn open_long(symbol: impl Into<String>) -> Self {
        Self::new(symbol, SignalKind::OpenLong)
    }

    pub fn open_short(symbol: impl Into<String>) -> Self {
        Self::new(symbol, SignalKind::OpenShort)
    }

    pub fn extend(symbol: impl Into<String>) -> Self {
        Self::new(symbol, SignalKind::Extend)
    }

    pub fn close(symbol: impl Into<String>) -> Self {
        Self::new(symbol, SignalKind::Close)
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Numeric attribute, if present and a number.
    pub fn attr_f64(&self, key: &str) -> Option<f64> {
        self.attrs.get(key).and_then(serde_json::Value::as_f64)
    }
}

/// All signals a strategy produced for one tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalBatch {
    pub timestamp: DateTime<Utc>,
    pub signals: Vec<Signal>,
}

impl SignalBatch {
    pub fn new(timestamp: DateTime<Utc>, signals: Vec<Signal>) -> Self {
        Self { timestamp, signals }
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// Strategy identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategySpec {
    pub name: String,
    /// Bars of history the strategy needs before it can emit anything.
    pub warmup_bars: usize,
}

impl StrategySpec {
    pub fn new(name: impl Into<String>, warmup_bars: usize) -> Self {
        Self {
            name: name.into(),
            warmup_bars,
        }
    }
}

/// Read-only view handed to a strategy on every tick.
///
/// No mutation path to the ledger exists through this context.
pub struct StrategyContext<'a> {
    /// Deterministic tick counter (1-based), not wall-clock.
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub feed: &'a dyn MarketFeed,
    pub ledger: &'a Ledger,
}

impl<'a> StrategyContext<'a> {
    pub fn new(
        tick: u64,
        timestamp: DateTime<Utc>,
        feed: &'a dyn MarketFeed,
        ledger: &'a Ledger,
    ) -> Self {
        Self {
            tick,
            timestamp,
            feed,
            ledger,
        }
    }

    pub fn price(&self, symbol: &str, field: &BarField) -> Option<f64> {
        self.feed.current_price(symbol, field)
    }

    pub fn position(&self, symbol: &str) -> Option<&'a Position> {
        self.ledger.position(symbol)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.feed.symbols()
    }
}

/// A trading strategy: one tick in, zero or more signals out.
pub trait Strategy: Send {
    fn spec(&self) -> StrategySpec;

    fn on_tick(&mut self, ctx: &StrategyContext<'_>) -> Vec<Signal>;
}

/// Host-level policy errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StrategyHostError {
    MultiStrategyNotAllowed,
    NoStrategyRegistered,
}

impl std::fmt::Display for StrategyHostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyHostError::MultiStrategyNotAllowed => {
                write!(f, "strategy host: only one strategy may be registered")
            }
            StrategyHostError::NoStrategyRegistered => {
                write!(f, "strategy host: no strategy registered")
            }
        }
    }
}

impl std::error::Error for StrategyHostError {}

/// Shadow mode config.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ShadowMode {
    #[default]
    Off,
    /// Strategy runs and its signals are recorded, but nothing is traded.
    On,
}

/// Host output for one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct TickOutput {
    pub batch: SignalBatch,
    /// True when the batch must not be traded.
    pub shadow: bool,
    /// Signals dropped by the host because they were malformed.
    pub dropped: usize,
}
