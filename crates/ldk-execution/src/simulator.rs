use std::fmt;

use ldk_md::{BarField, MarketFeed};
use ldk_portfolio::{tiered_commission, Fill};
use tracing::debug;

use crate::types::Order;

#[derive(Clone, Debug, PartialEq)]
pub enum ExecutionError {
    /// No reference price for the symbol at the current tick.
    DataUnavailable { symbol: String, field: BarField },
    ZeroQuantity { symbol: String },
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::DataUnavailable { symbol, field } => {
                write!(f, "no {field} price for {symbol} at current tick")
            }
            ExecutionError::ZeroQuantity { symbol } => {
                write!(f, "order for {symbol} has zero quantity")
            }
        }
    }
}

impl std::error::Error for ExecutionError {}

/// Zero-latency, zero-slippage fills at the current bar's reference price.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FillSimulator {
    price_field: BarField,
}

impl FillSimulator {
    pub fn new(price_field: BarField) -> Self {
        Self { price_field }
    }

    /// Fill `order` in full.
    ///
    /// # Errors
    /// [`ExecutionError::DataUnavailable`] when the feed has no price for the
    /// symbol this tick. The price is never defaulted.
    pub fn fill(&self, order: &Order, feed: &dyn MarketFeed) -> Result<Fill, ExecutionError> {
        if order.quantity == 0 {
            return Err(ExecutionError::ZeroQuantity {
                symbol: order.symbol.clone(),
            });
        }
        let price = feed
            .current_price(&order.symbol, &self.price_field)
            .ok_or_else(|| ExecutionError::DataUnavailable {
                symbol: order.symbol.clone(),
                field: self.price_field.clone(),
            })?;

        let commission = order
            .commission
            .unwrap_or_else(|| tiered_commission(order.quantity));
        let fill = Fill::new(order.timestamp, order.symbol.clone(), order.signed_quantity(), price)
            .with_commission(commission)
            .with_attrs(order.attrs.clone());

        debug!(
            symbol = %fill.symbol,
            side = %order.side,
            qty = fill.quantity,
            price,
            commission,
            "simulated fill"
        );
        Ok(fill)
    }
}
