use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Attrs;

/// Minimum per-fill commission (currency units).
pub const MIN_COMMISSION: f64 = 1.3;
/// Per-share rate for fills of up to [`TIER_BREAK_QTY`] shares.
pub const SMALL_TICKET_RATE: f64 = 0.013;
/// Per-share rate above [`TIER_BREAK_QTY`] shares.
pub const LARGE_TICKET_RATE: f64 = 0.008;
pub const TIER_BREAK_QTY: u64 = 500;

/// Tiered commission schedule applied when a fill carries no explicit value.
///
/// `max(1.3, 0.013 * qty)` up to 500 shares, `max(1.3, 0.008 * qty)` above.
pub fn tiered_commission(qty: u64) -> f64 {
    let rate = if qty <= TIER_BREAK_QTY {
        SMALL_TICKET_RATE
    } else {
        LARGE_TICKET_RATE
    };
    (rate * qty as f64).max(MIN_COMMISSION)
}

/// A single executed fill (the accounting atom).
///
/// `quantity` is signed: positive = bought, negative = sold.
/// `commission` is an absolute cash amount (>= 0).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub quantity: i64,
    pub price: f64,
    pub commission: f64,
    #[serde(default)]
    pub attrs: Attrs,
}

impl Fill {
    /// Build a fill charged at the tiered commission schedule.
    pub fn new<S: Into<String>>(
        timestamp: DateTime<Utc>,
        symbol: S,
        quantity: i64,
        price: f64,
    ) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            quantity,
            price,
            commission: tiered_commission(quantity.unsigned_abs()),
            attrs: Attrs::new(),
        }
    }

    /// Replace the scheduled commission with an explicit amount.
    pub fn with_commission(mut self, commission: f64) -> Self {
        self.commission = commission;
        self
    }

    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn is_buy(&self) -> bool {
        self.quantity > 0
    }

    pub fn abs_qty(&self) -> u64 {
        self.quantity.unsigned_abs()
    }

    /// Unsigned notional (`price * |quantity|`).
    pub fn notional(&self) -> f64 {
        self.price * self.abs_qty() as f64
    }

    /// Signed cash flow of the shares themselves (`quantity * price`).
    pub fn signed_notional(&self) -> f64 {
        self.quantity as f64 * self.price
    }
}

/// Leveraged position for one symbol. Exists only while open.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Signed quantity (+long, -short). Never zero while the position exists.
    pub quantity: i64,
    /// Own capital set aside as margin (>= 0).
    pub deposit: f64,
    /// Borrowed capital behind the leveraged portion (<= 0).
    pub finance: f64,
    /// Settlement accumulator for short proceeds and long offsets.
    pub dummy_cash: f64,
    /// Fills contributing to the open quantity, oldest first.
    pub fills: Vec<Fill>,
}

impl Position {
    pub(crate) fn new<S: Into<String>>(symbol: S) -> Self {
        Self {
            symbol: symbol.into(),
            quantity: 0,
            deposit: 0.0,
            finance: 0.0,
            dummy_cash: 0.0,
            fills: Vec::new(),
        }
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    pub fn abs_qty(&self) -> u64 {
        self.quantity.unsigned_abs()
    }

    /// The fill that opened the position.
    pub fn first_fill(&self) -> Option<&Fill> {
        self.fills.first()
    }

    pub fn last_fill(&self) -> Option<&Fill> {
        self.fills.last()
    }

    /// Mark-to-market value of the shares (`quantity * mark`).
    pub fn market_value(&self, mark: f64) -> f64 {
        self.quantity as f64 * mark
    }

    /// Value this position contributes to the account total at `mark`.
    pub fn holding(&self, mark: f64) -> f64 {
        self.market_value(mark) + self.deposit + self.finance + self.dummy_cash
    }
}
