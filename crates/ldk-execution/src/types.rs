use std::fmt;

use chrono::{DateTime, Utc};
use ldk_portfolio::Attrs;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Side that produces a fill of the given signed quantity.
    pub fn of_quantity(qty: i64) -> Side {
        if qty >= 0 {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    /// +1 for Buy, -1 for Sell.
    pub fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type. The simulator fills both at the bar's reference price.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    #[default]
    Market,
    Limit,
}

/// A sized order. Quantity is always positive; direction is `side`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub kind: OrderKind,
    pub quantity: u64,
    pub side: Side,
    #[serde(default)]
    pub attrs: Attrs,
    /// Explicit commission; None means the tiered schedule.
    #[serde(default)]
    pub commission: Option<f64>,
}

impl Order {
    pub fn market<S: Into<String>>(
        timestamp: DateTime<Utc>,
        symbol: S,
        side: Side,
        quantity: u64,
    ) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            kind: OrderKind::Market,
            quantity,
            side,
            attrs: Attrs::new(),
            commission: None,
        }
    }

    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn with_commission(mut self, commission: f64) -> Self {
        self.commission = Some(commission);
        self
    }

    /// Signed quantity the resulting fill will carry.
    pub fn signed_quantity(&self) -> i64 {
        self.side.sign() * self.quantity as i64
    }
}
