//! Leveraged position ledger.
//!
//! # Purpose
//! [`accounting`](crate::accounting) holds the margin/financing arithmetic.
//! This module wraps it behind a [`Ledger`] that:
//!
//! - Validates every fill before touching state (no zero quantity, no
//!   non-positive price, no negative commission, non-empty symbol).
//! - Dispatches each fill to open / extend / close and rejects lighten.
//! - Produces immutable [`LedgerSnapshot`] values for the equity curve.
//!
//! # Usage
//! ```ignore
//! let mut ledger = Ledger::new(LedgerConfig::new(100_000.0, 0.5, 0.0))?;
//! ledger.apply(Fill::new(ts, "AAPL", 100, 150.0))?;
//! let snap = ledger.snapshot(ts, &marks([("AAPL", 151.0)]));
//! ```
//!
//! # Determinism
//! No IO, no clock, no randomness. Two ledgers fed the same fills and marks
//! produce identical snapshots.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    accounting::{accrued_interest, cash_delta, entry_legs, realized_pnl, MarginLegs},
    types::{Fill, Position},
    MarkMap,
};

/// Commission reserve used by [`Ledger::affordable`], as a fraction of notional.
pub const COMMISSION_RESERVE_RATE: f64 = 0.01;

const INTEGRITY_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Account-level parameters fixed for the lifetime of a ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub initial_capital: f64,
    /// Fraction of notional funded from own capital, in (0, 1].
    pub margin_ratio: f64,
    /// Financing rate per calendar day on the borrowed fraction.
    pub interest_rate: f64,
}

impl LedgerConfig {
    pub fn new(initial_capital: f64, margin_ratio: f64, interest_rate: f64) -> Self {
        Self {
            initial_capital,
            margin_ratio,
            interest_rate,
        }
    }

    /// Unlevered, interest-free account with 100k capital.
    pub fn test_defaults() -> Self {
        Self::new(100_000.0, 1.0, 0.0)
    }

    fn validate(&self) -> Result<(), LedgerError> {
        if !self.initial_capital.is_finite() || self.initial_capital < 0.0 {
            return Err(LedgerError::InvalidConfig {
                field: "initial_capital",
                value: self.initial_capital,
            });
        }
        if !(self.margin_ratio > 0.0 && self.margin_ratio <= 1.0) {
            return Err(LedgerError::InvalidConfig {
                field: "margin_ratio",
                value: self.margin_ratio,
            });
        }
        if !self.interest_rate.is_finite() || self.interest_rate < 0.0 {
            return Err(LedgerError::InvalidConfig {
                field: "interest_rate",
                value: self.interest_rate,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Every way the ledger can refuse a config or a fill.
///
/// A refused fill never mutates the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    InvalidConfig { field: &'static str, value: f64 },
    EmptySymbol,
    /// Zero-quantity fill: neither a buy nor a sell.
    InvalidFillDirection { symbol: String },
    NonPositivePrice { symbol: String, price: f64 },
    NegativeCommission { symbol: String, commission: f64 },
    /// Opposite-side fill whose size does not exactly match the open position.
    LightenNotAllowed {
        symbol: String,
        position_qty: i64,
        fill_qty: i64,
    },
    /// Entry or extension needs more cash than the account holds.
    InsufficientCash {
        symbol: String,
        required: f64,
        available: f64,
    },
    /// Replaying the journal did not reproduce the live state.
    IntegrityMismatch { detail: String },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfig { field, value } => {
                write!(f, "ledger config: invalid {field} = {value}")
            }
            Self::EmptySymbol => write!(f, "ledger invariant: symbol must not be empty"),
            Self::InvalidFillDirection { symbol } => {
                write!(f, "ledger invariant: fill for {symbol} has zero quantity")
            }
            Self::NonPositivePrice { symbol, price } => {
                write!(f, "ledger invariant: price for {symbol} must be > 0, got {price}")
            }
            Self::NegativeCommission { symbol, commission } => write!(
                f,
                "ledger invariant: commission for {symbol} must be >= 0, got {commission}"
            ),
            Self::LightenNotAllowed {
                symbol,
                position_qty,
                fill_qty,
            } => write!(
                f,
                "lighten not allowed: {symbol} position {position_qty}, fill {fill_qty}"
            ),
            Self::InsufficientCash {
                symbol,
                required,
                available,
            } => write!(
                f,
                "insufficient cash for {symbol}: required {required:.2}, available {available:.2}"
            ),
            Self::IntegrityMismatch { detail } => write!(f, "ledger integrity: {detail}"),
        }
    }
}

impl std::error::Error for LedgerError {}

// ---------------------------------------------------------------------------
// Snapshot (read-only view)
// ---------------------------------------------------------------------------

/// Valuation of the account at one tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Holding value per symbol ever traded (0 once closed).
    pub holdings: BTreeMap<String, f64>,
    pub cash: f64,
    /// Commission paid to date.
    pub commission: f64,
    /// Financing interest paid to date.
    pub interest: f64,
    /// cash + sum(holdings)
    pub total: f64,
}

impl LedgerSnapshot {
    pub fn holding(&self, symbol: &str) -> f64 {
        self.holdings.get(symbol).copied().unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Ledger {
    config: LedgerConfig,
    cash: f64,
    commission: f64,
    interest: f64,
    realized_pnl: f64,
    positions: BTreeMap<String, Position>,
    /// Every symbol that has held a position, for zero rows after close.
    traded: BTreeSet<String>,
    /// Last mark seen per open symbol, used when a tick has no price.
    last_marks: MarkMap,
    journal: Vec<Fill>,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self {
            cash: config.initial_capital,
            config,
            commission: 0.0,
            interest: 0.0,
            realized_pnl: 0.0,
            positions: BTreeMap::new(),
            traded: BTreeSet::new(),
            last_marks: MarkMap::new(),
            journal: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Write surface
    // -----------------------------------------------------------------------

    /// Apply a fill: open, extend or close the symbol's position.
    ///
    /// # Errors
    /// Returns [`LedgerError`] on any invariant violation, including a
    /// partial close. The ledger is **not** mutated on error.
    pub fn apply(&mut self, fill: Fill) -> Result<(), LedgerError> {
        Self::validate_fill(&fill)?;

        let open_qty = self
            .positions
            .get(&fill.symbol)
            .map(|p| p.quantity)
            .unwrap_or(0);

        if open_qty == 0 || open_qty.signum() == fill.quantity.signum() {
            self.apply_entry(fill)
        } else if open_qty.unsigned_abs() == fill.abs_qty() {
            self.apply_close(fill);
            Ok(())
        } else {
            Err(LedgerError::LightenNotAllowed {
                symbol: fill.symbol,
                position_qty: open_qty,
                fill_qty: fill.quantity,
            })
        }
    }

    fn apply_entry(&mut self, fill: Fill) -> Result<(), LedgerError> {
        let legs = entry_legs(fill.notional(), self.config.margin_ratio, fill.is_buy());
        let delta = cash_delta(&fill, &legs, 0.0);
        if -delta > self.cash {
            return Err(LedgerError::InsufficientCash {
                symbol: fill.symbol,
                required: -delta,
                available: self.cash,
            });
        }

        self.cash += delta;
        self.commission += fill.commission;
        self.traded.insert(fill.symbol.clone());

        let pos = self
            .positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::new(fill.symbol.clone()));
        let extending = pos.quantity != 0;
        pos.quantity += fill.quantity;
        pos.deposit += legs.deposit;
        pos.finance += legs.finance;
        pos.dummy_cash += legs.dummy_cash;
        pos.fills.push(fill.clone());

        debug!(
            symbol = %fill.symbol,
            qty = fill.quantity,
            price = fill.price,
            extending,
            cash = self.cash,
            "ledger entry"
        );
        self.journal.push(fill);
        Ok(())
    }

    fn apply_close(&mut self, fill: Fill) {
        // Caller checked the position exists with the exact opposite size.
        let Some(pos) = self.positions.remove(&fill.symbol) else {
            return;
        };

        let interest = accrued_interest(
            &pos.fills,
            fill.timestamp,
            self.config.margin_ratio,
            self.config.interest_rate,
        );
        let released = MarginLegs {
            deposit: -pos.deposit,
            finance: -pos.finance,
            dummy_cash: -pos.dummy_cash,
        };
        let pnl = realized_pnl(&pos.fills, &fill);

        self.cash += cash_delta(&fill, &released, interest);
        self.commission += fill.commission;
        self.interest += interest;
        self.realized_pnl += pnl;
        self.last_marks.remove(&fill.symbol);

        debug!(
            symbol = %fill.symbol,
            qty = fill.quantity,
            price = fill.price,
            pnl,
            interest,
            cash = self.cash,
            "ledger close"
        );
        self.journal.push(fill);
    }

    /// Validate a fill without mutating any state.
    fn validate_fill(fill: &Fill) -> Result<(), LedgerError> {
        if fill.symbol.trim().is_empty() {
            return Err(LedgerError::EmptySymbol);
        }
        if fill.quantity == 0 {
            return Err(LedgerError::InvalidFillDirection {
                symbol: fill.symbol.clone(),
            });
        }
        if !fill.price.is_finite() || fill.price <= 0.0 {
            return Err(LedgerError::NonPositivePrice {
                symbol: fill.symbol.clone(),
                price: fill.price,
            });
        }
        if !fill.commission.is_finite() || fill.commission < 0.0 {
            return Err(LedgerError::NegativeCommission {
                symbol: fill.symbol.clone(),
                commission: fill.commission,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    /// Capital an entry of `quantity` at `price` is expected to need:
    /// margin plus a 1% commission reserve.
    pub fn required_capital(&self, quantity: u64, price: f64) -> f64 {
        let notional = price * quantity as f64;
        notional * self.config.margin_ratio + notional * COMMISSION_RESERVE_RATE
    }

    /// Fast advisory pre-check used before sizing an order.
    pub fn affordable(&self, symbol: &str, quantity: u64, price: f64) -> bool {
        let required = self.required_capital(quantity, price);
        let ok = self.cash > required;
        if !ok {
            debug!(symbol, quantity, price, required, cash = self.cash, "not affordable");
        }
        ok
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn is_flat(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn commission(&self) -> f64 {
        self.commission
    }

    pub fn interest(&self) -> f64 {
        self.interest
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn margin_ratio(&self) -> f64 {
        self.config.margin_ratio
    }

    pub fn interest_rate(&self) -> f64 {
        self.config.interest_rate
    }

    pub fn initial_capital(&self) -> f64 {
        self.config.initial_capital
    }

    /// Every accepted fill, in application order.
    pub fn journal(&self) -> &[Fill] {
        &self.journal
    }

    pub fn fills_applied(&self) -> usize {
        self.journal.len()
    }

    /// Mark for an open position: this tick's price, else the last seen
    /// mark, else the price it last traded at.
    fn mark_for(&self, pos: &Position, marks: &MarkMap) -> f64 {
        marks
            .get(&pos.symbol)
            .or_else(|| self.last_marks.get(&pos.symbol))
            .copied()
            .or_else(|| pos.last_fill().map(|f| f.price))
            .unwrap_or(0.0)
    }

    /// Account value: cash plus the holding of every open position.
    pub fn total(&self, marks: &MarkMap) -> f64 {
        self.cash
            + self
                .positions
                .values()
                .map(|p| p.holding(self.mark_for(p, marks)))
                .sum::<f64>()
    }

    /// Value the account at `timestamp`.
    ///
    /// Remembers the marks it used so a later tick without a price for an
    /// open symbol keeps its last valuation.
    pub fn snapshot(&mut self, timestamp: DateTime<Utc>, marks: &MarkMap) -> LedgerSnapshot {
        let mut holdings: BTreeMap<String, f64> =
            self.traded.iter().map(|s| (s.clone(), 0.0)).collect();

        let mut used = Vec::with_capacity(self.positions.len());
        for pos in self.positions.values() {
            let mark = self.mark_for(pos, marks);
            holdings.insert(pos.symbol.clone(), pos.holding(mark));
            used.push((pos.symbol.clone(), mark));
        }
        for (sym, mark) in used {
            self.last_marks.insert(sym, mark);
        }

        let total = self.cash + holdings.values().sum::<f64>();
        LedgerSnapshot {
            timestamp,
            holdings,
            cash: self.cash,
            commission: self.commission,
            interest: self.interest,
            total,
        }
    }

    /// Replay the journal into a fresh ledger and compare against live state.
    pub fn verify_integrity(&self) -> Result<(), LedgerError> {
        let mut replay = Ledger::new(self.config.clone())?;
        for fill in &self.journal {
            replay.apply(fill.clone())?;
        }

        let close = |a: f64, b: f64| (a - b).abs() <= INTEGRITY_TOLERANCE;
        if !close(replay.cash, self.cash) {
            return Err(LedgerError::IntegrityMismatch {
                detail: format!("cash live={} replay={}", self.cash, replay.cash),
            });
        }
        if !close(replay.commission, self.commission) {
            return Err(LedgerError::IntegrityMismatch {
                detail: format!(
                    "commission live={} replay={}",
                    self.commission, replay.commission
                ),
            });
        }
        let live: Vec<(&String, i64)> = self.positions.iter().map(|(s, p)| (s, p.quantity)).collect();
        let again: Vec<(&String, i64)> =
            replay.positions.iter().map(|(s, p)| (s, p.quantity)).collect();
        if live != again {
            return Err(LedgerError::IntegrityMismatch {
                detail: format!("positions live={live:?} replay={again:?}"),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
