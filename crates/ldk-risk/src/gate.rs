use std::collections::BTreeSet;

use ldk_execution::{Order, Side};
use ldk_md::{LotSizeProvider, MarketFeed};
use ldk_portfolio::{tiered_commission, Ledger};
use ldk_strategy::{Signal, SignalBatch, SignalKind};
use tracing::{debug, warn};

use crate::types::{SizingConfig, SizingDecision, Veto, VetoReason};

/// Turns one tick's signals into bounded orders.
///
/// Reads the ledger, never mutates it. Closes are emitted first and are
/// never vetoed for capital. Opens and extends accepted earlier in a batch
/// reserve their margin, so later ones in the same batch see less cash.
#[derive(Clone, Debug)]
pub struct SizingGate {
    config: SizingConfig,
}

/// Capital state threaded through one batch.
struct Budget {
    equity: f64,
    /// Cash credited from same-batch closes (policy dependent).
    credit: f64,
    /// Capital reserved by opens and extends already accepted in this batch.
    committed: f64,
    closing: BTreeSet<String>,
}

impl SizingGate {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    /// Size every signal of `batch`.
    ///
    /// Order of the result: all closes, then extends, then opens; within a
    /// kind, higher confidence first, ties in emission order.
    pub fn size(
        &self,
        batch: &SignalBatch,
        ledger: &Ledger,
        feed: &dyn MarketFeed,
        lots: &dyn LotSizeProvider,
    ) -> SizingDecision {
        let marks = feed.current_prices(&self.config.price_field);
        let mut budget = Budget {
            equity: ledger.total(&marks),
            credit: 0.0,
            committed: 0.0,
            closing: BTreeSet::new(),
        };
        let equity_at_start = budget.equity;

        let mut ordered: Vec<&Signal> = batch.signals.iter().collect();
        ordered.sort_by(|a, b| {
            b.kind
                .priority()
                .cmp(&a.kind.priority())
                .then(b.confidence.total_cmp(&a.confidence))
        });

        let mut orders = Vec::new();
        let mut vetoes = Vec::new();
        for sig in ordered {
            let sized = match sig.kind {
                SignalKind::Close => self.size_close(sig, batch, ledger, feed, &mut budget),
                SignalKind::Extend => self.size_extend(sig, batch, ledger, feed, &mut budget),
                SignalKind::OpenLong | SignalKind::OpenShort => {
                    self.size_open(sig, batch, ledger, feed, lots, &mut budget)
                }
            };
            match sized {
                Ok(order) => {
                    debug!(
                        symbol = %order.symbol,
                        side = %order.side,
                        qty = order.quantity,
                        kind = ?sig.kind,
                        "sized order"
                    );
                    orders.push(order);
                }
                Err(reason) => {
                    warn!(symbol = %sig.symbol, kind = ?sig.kind, %reason, "signal vetoed");
                    vetoes.push(Veto {
                        symbol: sig.symbol.clone(),
                        kind: sig.kind,
                        reason,
                    });
                }
            }
        }

        SizingDecision {
            orders,
            vetoes,
            equity: equity_at_start,
        }
    }

    fn size_close(
        &self,
        sig: &Signal,
        batch: &SignalBatch,
        ledger: &Ledger,
        feed: &dyn MarketFeed,
        budget: &mut Budget,
    ) -> Result<Order, VetoReason> {
        if budget.closing.contains(&sig.symbol) {
            return Err(VetoReason::NoOpenPosition);
        }
        let pos = ledger
            .position(&sig.symbol)
            .ok_or(VetoReason::NoOpenPosition)?;
        let entry_qty = pos.first_fill().map(|f| f.quantity).unwrap_or(pos.quantity);
        let qty = pos.abs_qty();

        if !self.config.use_pre_tick_equity {
            if let Some(price) = feed.current_price(&sig.symbol, &self.config.price_field) {
                let commission = tiered_commission(qty);
                budget.credit += pos.holding(price) - commission;
                budget.equity -= commission;
            }
        }
        budget.closing.insert(sig.symbol.clone());

        Ok(
            Order::market(batch.timestamp, sig.symbol.clone(), Side::of_quantity(entry_qty).opposite(), qty)
                .with_attrs(sig.attrs.clone()),
        )
    }

    fn size_extend(
        &self,
        sig: &Signal,
        batch: &SignalBatch,
        ledger: &Ledger,
        feed: &dyn MarketFeed,
        budget: &mut Budget,
    ) -> Result<Order, VetoReason> {
        if budget.closing.contains(&sig.symbol) {
            return Err(VetoReason::NoOpenPosition);
        }
        let pos = ledger
            .position(&sig.symbol)
            .ok_or(VetoReason::NoOpenPosition)?;
        let unit = pos
            .first_fill()
            .map(|f| f.abs_qty())
            .ok_or(VetoReason::NoOpenPosition)?;
        let price = self.price(sig, feed)?;
        self.reserve_capital(ledger, &sig.symbol, unit, price, budget)?;

        Ok(
            Order::market(batch.timestamp, sig.symbol.clone(), Side::of_quantity(pos.quantity), unit)
                .with_attrs(sig.attrs.clone()),
        )
    }

    fn size_open(
        &self,
        sig: &Signal,
        batch: &SignalBatch,
        ledger: &Ledger,
        feed: &dyn MarketFeed,
        lots: &dyn LotSizeProvider,
        budget: &mut Budget,
    ) -> Result<Order, VetoReason> {
        if ledger.position(&sig.symbol).is_some() && !budget.closing.contains(&sig.symbol) {
            return Err(VetoReason::PositionAlreadyOpen);
        }
        let price = self.price(sig, feed)?;
        let volatility = sig
            .attr_f64(&self.config.volatility_attr)
            .filter(|v| v.is_finite() && *v > 0.0)
            .ok_or_else(|| VetoReason::MissingVolatility {
                attr: self.config.volatility_attr.clone(),
            })?;

        let qty = open_quantity(
            budget.equity,
            self.config.risk_fraction,
            volatility,
            price,
            lots.lot_size(&sig.symbol),
        );
        if qty == 0 {
            return Err(VetoReason::NonPositiveQuantity);
        }
        self.reserve_capital(ledger, &sig.symbol, qty, price, budget)?;

        let side = if sig.kind == SignalKind::OpenLong {
            Side::Buy
        } else {
            Side::Sell
        };
        Ok(Order::market(batch.timestamp, sig.symbol.clone(), side, qty).with_attrs(sig.attrs.clone()))
    }

    fn price(&self, sig: &Signal, feed: &dyn MarketFeed) -> Result<f64, VetoReason> {
        feed.current_price(&sig.symbol, &self.config.price_field)
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or(VetoReason::DataUnavailable)
    }

    /// Check `qty @ price` against cash not yet spoken for in this batch and
    /// reserve it on success. Must be the last check before an order is built.
    fn reserve_capital(
        &self,
        ledger: &Ledger,
        symbol: &str,
        qty: u64,
        price: f64,
        budget: &mut Budget,
    ) -> Result<(), VetoReason> {
        let required = ledger.required_capital(qty, price);
        let available = ledger.cash() + budget.credit - budget.committed;
        let ok = if budget.credit == 0.0 && budget.committed == 0.0 {
            ledger.affordable(symbol, qty, price)
        } else {
            available > required
        };
        if !ok {
            return Err(VetoReason::InsufficientCapital { required, available });
        }
        budget.committed += required;
        Ok(())
    }
}

/// Whole-lot quantity for a risk budget of `equity * risk_fraction / volatility`.
pub fn open_quantity(equity: f64, risk_fraction: f64, volatility: f64, price: f64, lot: u64) -> u64 {
    let lot = lot.max(1);
    let budget = equity * risk_fraction / volatility;
    let lots = (budget / (lot as f64 * price)).floor();
    if lots.is_finite() && lots > 0.0 {
        lots as u64 * lot
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_rounds_down_to_whole_lots() {
        // 100k * 1% / 2.0 = 500 budget; 500 / (100 * 1.2) = 4.16 lots
        assert_eq!(open_quantity(100_000.0, 0.01, 2.0, 1.2, 100), 400);
        assert_eq!(open_quantity(100_000.0, 0.01, 2.0, 1.2, 1), 416);
    }

    #[test]
    fn quantity_is_zero_when_budget_below_one_lot() {
        assert_eq!(open_quantity(1_000.0, 0.01, 5.0, 50.0, 1), 0);
        assert_eq!(open_quantity(-1_000.0, 0.01, 1.0, 1.0, 1), 0);
    }

    #[test]
    fn halving_equity_halves_unrounded_quantity() {
        let full = open_quantity(400_000.0, 0.01, 1.0, 10.0, 1);
        let half = open_quantity(200_000.0, 0.01, 1.0, 10.0, 1);
        assert_eq!(full, 400);
        assert_eq!(half, 200);
    }
}
