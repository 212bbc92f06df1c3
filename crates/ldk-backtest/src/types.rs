use std::time::Duration;

use chrono::{DateTime, Utc};
use ldk_execution::{ExecutionError, Order};
use ldk_portfolio::{Fill, LedgerConfig, LedgerError, LedgerSnapshot, PerformanceMetrics};
use ldk_risk::{SizingConfig, Veto};
use serde::Serialize;

/// Backtest configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct BacktestConfig {
    /// Account parameters for the ledger created at start.
    pub ledger: LedgerConfig,

    /// Sizing gate parameters. `sizing.price_field` is also the fill price.
    pub sizing: SizingConfig,

    /// Pause after every tick (zero for historical runs).
    pub heartbeat: Duration,

    /// Annualisation factor for the Sharpe ratio.
    pub periods_per_year: u32,

    /// Shadow mode: if true, strategy runs but trades are not executed.
    pub shadow_mode: bool,
}

impl BacktestConfig {
    /// Reasonable defaults for testing.
    pub fn test_defaults() -> Self {
        Self {
            ledger: LedgerConfig::test_defaults(),
            sizing: SizingConfig::test_defaults(),
            heartbeat: Duration::ZERO,
            periods_per_year: ldk_portfolio::TRADING_DAYS_PER_YEAR,
            shadow_mode: false,
        }
    }
}

/// Simulation loop state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum LoopState {
    Running,
    Finished,
}

/// Counters accumulated over a run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub ticks: u64,
    /// Signals forwarded to the sizing gate.
    pub signals: u64,
    /// Signals recorded but not traded (shadow mode).
    pub shadow_signals: u64,
    /// Malformed signals dropped by the strategy host.
    pub dropped_signals: u64,
    pub orders: u64,
    pub fills: u64,
    pub vetoes: u64,
    pub fill_failures: u64,
    pub ledger_rejections: u64,
    /// Events discarded because of cancellation.
    pub discarded_events: u64,
}

/// A step of the pipeline that refused to go further. The run continues.
#[derive(Clone, Debug, PartialEq)]
pub enum Rejection {
    Vetoed {
        timestamp: DateTime<Utc>,
        veto: Veto,
    },
    FillFailed {
        timestamp: DateTime<Utc>,
        order: Order,
        error: ExecutionError,
    },
    LedgerRejected {
        timestamp: DateTime<Utc>,
        fill: Fill,
        error: LedgerError,
    },
}

impl Rejection {
    pub fn symbol(&self) -> &str {
        match self {
            Rejection::Vetoed { veto, .. } => &veto.symbol,
            Rejection::FillFailed { order, .. } => &order.symbol,
            Rejection::LedgerRejected { fill, .. } => &fill.symbol,
        }
    }
}

/// Backtest report produced after a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BacktestReport {
    pub state: LoopState,
    /// True when the run stopped on the cancel token rather than end of data.
    pub cancelled: bool,
    pub stats: RunStats,
    pub metrics: PerformanceMetrics,
    /// One snapshot per processed tick.
    pub equity_curve: Vec<LedgerSnapshot>,
    /// All fills accepted by the ledger, in order.
    pub fills: Vec<Fill>,
}

impl BacktestReport {
    pub fn final_snapshot(&self) -> Option<&LedgerSnapshot> {
        self.equity_curve.last()
    }
}
