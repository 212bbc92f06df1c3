//! Performance metrics over an equity curve of [`LedgerSnapshot`]s.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ledger::LedgerSnapshot;

/// Default annualisation factor for daily bars.
pub const TRADING_DAYS_PER_YEAR: u32 = 252;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// last total / first total - 1
    pub total_return: f64,
    pub sharpe_ratio: f64,
    /// Largest fractional decline from a high-water mark.
    pub max_drawdown: f64,
    /// Longest run of consecutive ticks spent below a high-water mark.
    pub drawdown_duration: u64,
}

/// Tick-over-tick returns of the account total.
///
/// The step that takes a positive total to zero or below yields a return of
/// -1 or worse. Once the total is no longer positive a relative return is
/// undefined; those steps count as 0.0 and are logged.
pub fn returns(curve: &[LedgerSnapshot]) -> Vec<f64> {
    curve
        .windows(2)
        .map(|w| {
            let prev = w[0].total;
            if prev > 0.0 {
                w[1].total / prev - 1.0
            } else {
                debug!(at = %w[1].timestamp, prev, "return undefined on non-positive total");
                0.0
            }
        })
        .collect()
}

/// Fractional drawdown from the running high-water mark at every tick.
///
/// A leveraged account that falls below zero shows a drawdown above 1.0.
/// Before the high-water mark is ever positive there is nothing to draw
/// down from; those ticks are 0.0 and logged.
pub fn drawdown_series(curve: &[LedgerSnapshot]) -> Vec<f64> {
    let mut hwm = f64::NEG_INFINITY;
    curve
        .iter()
        .map(|s| {
            hwm = hwm.max(s.total);
            if hwm > 0.0 {
                (hwm - s.total) / hwm
            } else {
                debug!(at = %s.timestamp, hwm, "drawdown undefined without positive high-water mark");
                0.0
            }
        })
        .collect()
}

/// Annualised Sharpe ratio (risk-free rate 0, sample standard deviation).
///
/// Returns 0.0 when there are fewer than two returns or no variance.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: u32) -> f64 {
    let n = returns.len();
    if n < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / n as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std = var.sqrt();
    if std <= 0.0 || std.is_nan() {
        return 0.0;
    }
    (periods_per_year as f64).sqrt() * mean / std
}

pub fn compute_metrics(curve: &[LedgerSnapshot], periods_per_year: u32) -> PerformanceMetrics {
    let (Some(first), Some(last)) = (curve.first(), curve.last()) else {
        return PerformanceMetrics::default();
    };

    let total_return = if first.total > 0.0 {
        last.total / first.total - 1.0
    } else {
        0.0
    };

    let dd = drawdown_series(curve);
    let max_drawdown = dd.iter().copied().fold(0.0_f64, f64::max);

    let mut run = 0u64;
    let mut longest = 0u64;
    for d in &dd {
        if *d > 0.0 {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }

    PerformanceMetrics {
        total_return,
        sharpe_ratio: sharpe_ratio(&returns(curve), periods_per_year),
        max_drawdown,
        drawdown_duration: longest,
    }
}
