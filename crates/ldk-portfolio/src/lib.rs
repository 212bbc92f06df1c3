//! ldk-portfolio
//!
//! Leveraged position ledger and performance metrics.
//! - Fill-driven ledger is the source of truth
//! - Margin deposit / financed leg / settlement dummy cash per symbol
//! - Exact-close only (partial reductions are rejected)
//! - Financing interest accrued over calendar days held
//! - Snapshots + equity-curve metrics (return, Sharpe, drawdown)
//! - Pure deterministic logic (no IO, no clock, no broker wiring)

mod accounting;
mod types;

pub mod ledger;
pub mod metrics;

pub use accounting::{
    accrued_interest, cash_delta, days_held, entry_legs, realized_pnl, MarginLegs,
};
pub use ledger::{Ledger, LedgerConfig, LedgerError, LedgerSnapshot, COMMISSION_RESERVE_RATE};
pub use metrics::{
    compute_metrics, drawdown_series, returns, sharpe_ratio, PerformanceMetrics,
    TRADING_DAYS_PER_YEAR,
};
pub use types::{tiered_commission, Fill, Position, MIN_COMMISSION};

use std::collections::BTreeMap;

/// Opaque strategy-defined attributes carried from signal to fill.
pub type Attrs = BTreeMap<String, serde_json::Value>;

/// Canonical mark map type (symbol -> price).
pub type MarkMap = BTreeMap<String, f64>;

/// Helper to build a MarkMap with minimal boilerplate.
pub fn marks<I, S>(items: I) -> MarkMap
where
    I: IntoIterator<Item = (S, f64)>,
    S: Into<String>,
{
    let mut m = MarkMap::new();
    for (sym, px) in items {
        m.insert(sym.into(), px);
    }
    m
}
