use std::fmt;

use ldk_execution::Order;
use ldk_md::BarField;
use ldk_strategy::SignalKind;

/// Sizing configuration (risk budget + policies).
#[derive(Clone, Debug, PartialEq)]
pub struct SizingConfig {
    /// Fraction of equity risked per unit of the signal's volatility measure.
    pub risk_fraction: f64,

    /// Signal attribute holding the volatility measure (e.g. ATR).
    pub volatility_attr: String,

    /// Price field used to value and size (same one the fill simulator uses).
    pub price_field: BarField,

    /// If true, opens/extends are sized from equity and cash captured before
    /// any same-batch close settles. If false, the projected release of those
    /// closes is credited first.
    pub use_pre_tick_equity: bool,
}

impl SizingConfig {
    pub fn test_defaults() -> Self {
        Self {
            risk_fraction: 0.01,
            volatility_attr: "atr".to_string(),
            price_field: BarField::Close,
            use_pre_tick_equity: true,
        }
    }
}

/// Why a signal produced no order.
#[derive(Clone, Debug, PartialEq)]
pub enum VetoReason {
    /// No price for the symbol this tick.
    DataUnavailable,
    /// Volatility attribute absent, non-numeric or not > 0.
    MissingVolatility { attr: String },
    /// Risk budget rounds down to zero lots.
    NonPositiveQuantity,
    /// Affordability pre-check failed.
    InsufficientCapital { required: f64, available: f64 },
    /// Extend/Close for a symbol with no open position.
    NoOpenPosition,
    /// Open for a symbol that already has a position not being closed.
    PositionAlreadyOpen,
}

impl fmt::Display for VetoReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VetoReason::DataUnavailable => write!(f, "DATA_UNAVAILABLE"),
            VetoReason::MissingVolatility { attr } => write!(f, "MISSING_VOLATILITY({attr})"),
            VetoReason::NonPositiveQuantity => write!(f, "NON_POSITIVE_QUANTITY"),
            VetoReason::InsufficientCapital {
                required,
                available,
            } => write!(
                f,
                "INSUFFICIENT_CAPITAL(required={required:.2}, available={available:.2})"
            ),
            VetoReason::NoOpenPosition => write!(f, "NO_OPEN_POSITION"),
            VetoReason::PositionAlreadyOpen => write!(f, "POSITION_ALREADY_OPEN"),
        }
    }
}

/// A dropped signal and its reason.
#[derive(Clone, Debug, PartialEq)]
pub struct Veto {
    pub symbol: String,
    pub kind: SignalKind,
    pub reason: VetoReason,
}

/// Gate output for one batch. `orders` are in bus order.
#[derive(Clone, Debug, PartialEq)]
pub struct SizingDecision {
    pub orders: Vec<Order>,
    pub vetoes: Vec<Veto>,
    /// Equity the batch was sized against.
    pub equity: f64,
}
