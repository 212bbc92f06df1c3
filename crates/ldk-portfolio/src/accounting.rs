//! Margin, financing and settlement arithmetic.
//!
//! Pure functions only. The [`Ledger`](crate::Ledger) owns the invariant
//! checks and the state; this module owns the numbers.

use chrono::{DateTime, Utc};

use crate::types::Fill;

/// Deltas applied to a position's deposit / finance / dummy-cash legs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MarginLegs {
    pub deposit: f64,
    pub finance: f64,
    pub dummy_cash: f64,
}

impl MarginLegs {
    pub fn sum(&self) -> f64 {
        self.deposit + self.finance + self.dummy_cash
    }
}

/// Legs created by an entry or extension of unsigned `notional` at margin `ratio`.
///
/// deposit = V*r, finance = -V*(1-r).
/// Long: dummy = -deposit. Short: dummy = deposit + 2*|finance|.
pub fn entry_legs(notional: f64, ratio: f64, long: bool) -> MarginLegs {
    let deposit = notional * ratio;
    let finance = -notional * (1.0 - ratio);
    let dummy_cash = if long {
        -deposit
    } else {
        deposit + 2.0 * finance.abs()
    };
    MarginLegs {
        deposit,
        finance,
        dummy_cash,
    }
}

/// Cash movement for a fill that changes the legs by `legs`.
///
/// cash_before = cash_after + q*price + dDeposit + dFinance + dDummy + commission + interest
pub fn cash_delta(fill: &Fill, legs: &MarginLegs, interest: f64) -> f64 {
    -(fill.signed_notional() + legs.sum() + fill.commission + interest)
}

/// Whole calendar days between two instants (UTC dates), floored at zero.
pub fn days_held(opened: DateTime<Utc>, closed: DateTime<Utc>) -> i64 {
    (closed.date_naive() - opened.date_naive()).num_days().max(0)
}

/// Financing cost on the borrowed fraction of every open fill.
///
/// sum over fills of |q| * price * (1 - ratio) * daily_rate * days_held
pub fn accrued_interest(
    fills: &[Fill],
    closed_at: DateTime<Utc>,
    ratio: f64,
    daily_rate: f64,
) -> f64 {
    fills
        .iter()
        .map(|f| {
            f.notional() * (1.0 - ratio) * daily_rate * days_held(f.timestamp, closed_at) as f64
        })
        .sum()
}

/// Realized PnL of a full close: the negated net share cash flow.
pub fn realized_pnl(open_fills: &[Fill], closing: &Fill) -> f64 {
    let opened: f64 = open_fills.iter().map(Fill::signed_notional).sum();
    -(opened + closing.signed_notional())
}
