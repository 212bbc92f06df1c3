use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Typed view of the effective backtest config. Every section and key is
/// optional in YAML; absent keys take the defaults below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    pub ledger: LedgerSettings,
    pub sizing: SizingSettings,
    pub execution: ExecutionSettings,
    pub instruments: InstrumentSettings,
    pub run: RunSettings,
    pub metrics: MetricsSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub initial_capital: f64,
    /// Fraction of notional funded by own capital, in (0, 1].
    pub margin_ratio: f64,
    /// Financing rate per calendar day on the borrowed fraction.
    pub interest_rate: f64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            margin_ratio: 1.0,
            interest_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingSettings {
    pub risk_fraction: f64,
    pub volatility_attr: String,
    pub use_pre_tick_equity: bool,
}

impl Default for SizingSettings {
    fn default() -> Self {
        Self {
            risk_fraction: 0.01,
            volatility_attr: "atr".to_string(),
            use_pre_tick_equity: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Bar field used for fills, marks and sizing (`open`, `close`, ...).
    pub price_field: String,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            price_field: "close".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentSettings {
    pub default_lot_size: u64,
    pub lot_sizes: BTreeMap<String, u64>,
}

impl Default for InstrumentSettings {
    fn default() -> Self {
        Self {
            default_lot_size: 1,
            lot_sizes: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Pause after each tick; 0 for historical runs.
    pub heartbeat_ms: u64,
    pub shadow_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub periods_per_year: u32,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            periods_per_year: 252,
        }
    }
}

impl BacktestSettings {
    /// Deserialize and validate.
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let s: BacktestSettings = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: settings do not match the backtest schema")?;
        s.validate()?;
        Ok(s)
    }

    pub fn validate(&self) -> Result<()> {
        let l = &self.ledger;
        if !l.initial_capital.is_finite() || l.initial_capital <= 0.0 {
            bail!("CONFIG_INVALID: ledger.initial_capital must be > 0 (got {})", l.initial_capital);
        }
        if !(l.margin_ratio > 0.0 && l.margin_ratio <= 1.0) {
            bail!("CONFIG_INVALID: ledger.margin_ratio must be in (0, 1] (got {})", l.margin_ratio);
        }
        if !l.interest_rate.is_finite() || l.interest_rate < 0.0 {
            bail!("CONFIG_INVALID: ledger.interest_rate must be >= 0 (got {})", l.interest_rate);
        }

        let s = &self.sizing;
        if !(s.risk_fraction > 0.0 && s.risk_fraction <= 1.0) {
            bail!("CONFIG_INVALID: sizing.risk_fraction must be in (0, 1] (got {})", s.risk_fraction);
        }
        if s.volatility_attr.trim().is_empty() {
            bail!("CONFIG_INVALID: sizing.volatility_attr must not be empty");
        }

        if self.execution.price_field.trim().is_empty() {
            bail!("CONFIG_INVALID: execution.price_field must not be empty");
        }
        if self.instruments.default_lot_size == 0 {
            bail!("CONFIG_INVALID: instruments.default_lot_size must be >= 1");
        }
        if let Some((sym, _)) = self.instruments.lot_sizes.iter().find(|(_, lot)| **lot == 0) {
            bail!("CONFIG_INVALID: instruments.lot_sizes.{sym} must be >= 1");
        }
        if self.metrics.periods_per_year == 0 {
            bail!("CONFIG_INVALID: metrics.periods_per_year must be >= 1");
        }
        Ok(())
    }
}
