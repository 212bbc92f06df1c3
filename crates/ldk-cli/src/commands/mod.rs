//! Command handler modules for the `ldk` binary.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod backtest;

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use ldk_backtest::BacktestConfig;
use ldk_config::BacktestSettings;
use ldk_md::{BarField, InstrumentTable};
use ldk_portfolio::LedgerConfig;
use ldk_risk::SizingConfig;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Engine config from validated settings.
pub fn backtest_config(s: &BacktestSettings) -> BacktestConfig {
    BacktestConfig {
        ledger: LedgerConfig::new(
            s.ledger.initial_capital,
            s.ledger.margin_ratio,
            s.ledger.interest_rate,
        ),
        sizing: SizingConfig {
            risk_fraction: s.sizing.risk_fraction,
            volatility_attr: s.sizing.volatility_attr.clone(),
            price_field: BarField::parse(&s.execution.price_field),
            use_pre_tick_equity: s.sizing.use_pre_tick_equity,
        },
        heartbeat: Duration::from_millis(s.run.heartbeat_ms),
        periods_per_year: s.metrics.periods_per_year,
        shadow_mode: s.run.shadow_mode,
    }
}

pub fn instrument_table(s: &BacktestSettings) -> InstrumentTable {
    s.instruments
        .lot_sizes
        .iter()
        .fold(InstrumentTable::new(s.instruments.default_lot_size), |t, (sym, lot)| {
            t.with_lot(sym.clone(), *lot)
        })
}

/// Parse a `--start`/`--end` date. `--end` covers the whole day.
pub fn parse_date_bound(raw: Option<&str>, flag: &str, end_of_day: bool) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let d = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid {flag} date: {raw}"))?;
    let t = if end_of_day {
        d.and_hms_opt(23, 59, 59)
    } else {
        d.and_hms_opt(0, 0, 0)
    }
    .with_context(|| format!("invalid {flag} date: {raw}"))?;
    Ok(Some(t.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldk_md::LotSizeProvider;

    #[test]
    fn settings_map_onto_engine_config() {
        let mut s = BacktestSettings::default();
        s.ledger.margin_ratio = 0.5;
        s.execution.price_field = "open".into();
        s.run.heartbeat_ms = 250;
        let cfg = backtest_config(&s);
        assert_eq!(cfg.ledger.margin_ratio, 0.5);
        assert_eq!(cfg.sizing.price_field, BarField::Open);
        assert_eq!(cfg.heartbeat, Duration::from_millis(250));
        assert!(!cfg.shadow_mode);
    }

    #[test]
    fn lot_overrides_apply() {
        let mut s = BacktestSettings::default();
        s.instruments.default_lot_size = 100;
        s.instruments.lot_sizes.insert("9988.HK".into(), 500);
        let t = instrument_table(&s);
        assert_eq!(t.lot_size("9988.HK"), 500);
        assert_eq!(t.lot_size("0700.HK"), 100);
    }

    #[test]
    fn date_bounds() {
        let start = parse_date_bound(Some("2024-01-02"), "--start", false).unwrap().unwrap();
        let end = parse_date_bound(Some("2024-01-02"), "--end", true).unwrap().unwrap();
        assert_eq!(start.to_rfc3339(), "2024-01-02T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-01-02T23:59:59+00:00");
        assert!(parse_date_bound(None, "--start", false).unwrap().is_none());
        assert!(parse_date_bound(Some("02/01/2024"), "--start", false).is_err());
    }
}
