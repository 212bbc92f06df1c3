use chrono::{DateTime, Utc};
use ldk_execution::{FillSimulator, Order};
use ldk_md::{FeedStep, LotSizeProvider, MarketFeed};
use ldk_portfolio::{
    compute_metrics, Fill, Ledger, LedgerError, LedgerSnapshot, PerformanceMetrics,
};
use ldk_risk::SizingGate;
use ldk_strategy::{
    ShadowMode, SignalBatch, Strategy, StrategyContext, StrategyHost, StrategyHostError,
};
use tracing::{debug, info, warn};

use crate::bus::{Event, EventBus};
use crate::cancel::CancelToken;
use crate::types::{BacktestConfig, BacktestReport, LoopState, Rejection, RunStats};

/// Backtest error variants. Anything listed here stops the run; per-signal
/// and per-fill refusals are recorded as [`Rejection`]s instead.
#[derive(Clone, Debug, PartialEq)]
pub enum BacktestError {
    /// Ledger config invalid, or the end-of-run journal replay disagreed.
    Ledger(LedgerError),
    /// Strategy host error (forwarded).
    StrategyHost(StrategyHostError),
    InvalidSizing { field: &'static str, value: f64 },
}

impl std::fmt::Display for BacktestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BacktestError::Ledger(e) => write!(f, "ledger: {e}"),
            BacktestError::StrategyHost(e) => write!(f, "{e}"),
            BacktestError::InvalidSizing { field, value } => {
                write!(f, "invalid sizing config: {field} = {value}")
            }
        }
    }
}

impl std::error::Error for BacktestError {}

impl From<LedgerError> for BacktestError {
    fn from(e: LedgerError) -> Self {
        BacktestError::Ledger(e)
    }
}

/// The backtest engine: single-threaded, event-driven replay.
///
/// Pipeline per tick: DATA_TICK -> STRATEGY -> SIGNALS -> SIZING -> ORDER
/// -> SIMULATOR -> FILL -> LEDGER, drained to empty, then one snapshot.
pub struct BacktestEngine {
    config: BacktestConfig,
    feed: Box<dyn MarketFeed>,
    lots: Box<dyn LotSizeProvider>,
    host: StrategyHost,
    gate: SizingGate,
    simulator: FillSimulator,
    ledger: Ledger,
    bus: EventBus,
    cancel: CancelToken,
    state: LoopState,
    cancelled: bool,
    /// Deterministic tick counter (1-based once the first tick is processed).
    tick: u64,
    warmup_bars: usize,
    stats: RunStats,
    curve: Vec<LedgerSnapshot>,
    rejections: Vec<Rejection>,
}

impl BacktestEngine {
    pub fn new(
        config: BacktestConfig,
        feed: Box<dyn MarketFeed>,
        lots: Box<dyn LotSizeProvider>,
    ) -> Result<Self, BacktestError> {
        validate_sizing(&config)?;
        let ledger = Ledger::new(config.ledger.clone())?;
        let shadow = if config.shadow_mode {
            ShadowMode::On
        } else {
            ShadowMode::Off
        };

        Ok(Self {
            gate: SizingGate::new(config.sizing.clone()),
            simulator: FillSimulator::new(config.sizing.price_field.clone()),
            host: StrategyHost::new(shadow),
            config,
            feed,
            lots,
            ledger,
            bus: EventBus::new(),
            cancel: CancelToken::new(),
            state: LoopState::Running,
            cancelled: false,
            tick: 0,
            warmup_bars: 0,
            stats: RunStats::default(),
            curve: Vec::new(),
            rejections: Vec::new(),
        })
    }

    /// Register a strategy. Must be called before run().
    pub fn add_strategy(&mut self, s: Box<dyn Strategy>) -> Result<(), BacktestError> {
        self.host.register(s).map_err(BacktestError::StrategyHost)?;
        self.warmup_bars = self
            .host
            .spec()
            .map_err(BacktestError::StrategyHost)?
            .warmup_bars;
        Ok(())
    }

    /// Handle that stops the loop cooperatively from any thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn rejections(&self) -> &[Rejection] {
        &self.rejections
    }

    /// Snapshots taken so far, one per processed tick.
    pub fn equity_curve(&self) -> &[LedgerSnapshot] {
        &self.curve
    }

    pub fn metrics(&self, curve: &[LedgerSnapshot]) -> PerformanceMetrics {
        compute_metrics(curve, self.config.periods_per_year)
    }

    /// Run until the feed is exhausted or the cancel token fires.
    pub fn run(&mut self) -> Result<BacktestReport, BacktestError> {
        let strategy = self.host.spec().map_err(BacktestError::StrategyHost)?;
        info!(
            strategy = %strategy.name,
            symbols = self.feed.symbols().len(),
            capital = self.ledger.initial_capital(),
            margin_ratio = self.ledger.margin_ratio(),
            shadow = self.config.shadow_mode,
            "backtest starting"
        );

        while self.step()? == LoopState::Running {}

        self.ledger.verify_integrity()?;
        let metrics = self.metrics(&self.curve);
        info!(
            ticks = self.stats.ticks,
            fills = self.stats.fills,
            vetoes = self.stats.vetoes,
            cancelled = self.cancelled,
            total_return = metrics.total_return,
            max_drawdown = metrics.max_drawdown,
            "backtest finished"
        );

        Ok(BacktestReport {
            state: self.state,
            cancelled: self.cancelled,
            stats: self.stats.clone(),
            metrics,
            equity_curve: self.curve.clone(),
            fills: self.ledger.journal().to_vec(),
        })
    }

    /// Process one tick: advance, drain the bus, snapshot, heartbeat.
    ///
    /// Returns the loop state after the tick. Calling again once `Finished`
    /// does nothing.
    pub fn step(&mut self) -> Result<LoopState, BacktestError> {
        if self.state == LoopState::Finished {
            return Ok(LoopState::Finished);
        }
        if self.cancel.is_cancelled() {
            return Ok(self.finish(true));
        }
        if self.feed.exhausted() {
            return Ok(self.finish(false));
        }

        let timestamp = match self.feed.advance() {
            FeedStep::Continue { timestamp } => timestamp,
            FeedStep::EndOfFeed => return Ok(self.finish(false)),
        };
        self.tick += 1;
        self.stats.ticks += 1;
        self.bus.push(Event::DataTick { timestamp });

        while let Some(event) = self.bus.pop() {
            debug!(tick = self.tick, event = event.label(), "dispatch");
            self.dispatch(event)?;
            if self.cancel.is_cancelled() && !self.bus.is_empty() {
                let dropped = self.bus.clear();
                self.stats.discarded_events += dropped as u64;
                warn!(tick = self.tick, dropped, "cancelled mid-tick; queued events discarded");
            }
        }

        let marks = self.feed.current_prices(&self.config.sizing.price_field);
        let snap = self.ledger.snapshot(timestamp, &marks);
        debug!(tick = self.tick, cash = snap.cash, total = snap.total, "snapshot");
        self.curve.push(snap);

        if !self.config.heartbeat.is_zero() {
            std::thread::sleep(self.config.heartbeat);
        }
        Ok(self.state)
    }

    fn finish(&mut self, cancelled: bool) -> LoopState {
        if cancelled {
            info!(tick = self.tick, "cancel requested; stopping");
        } else {
            debug!(tick = self.tick, "end of feed");
        }
        self.cancelled = cancelled;
        self.state = LoopState::Finished;
        self.state
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    fn dispatch(&mut self, event: Event) -> Result<(), BacktestError> {
        match event {
            Event::DataTick { timestamp } => self.on_data_tick(timestamp),
            Event::Signals(batch) => {
                self.on_signals(&batch);
                Ok(())
            }
            Event::Order(order) => {
                self.on_order(order);
                Ok(())
            }
            Event::Fill(fill) => {
                self.on_fill(fill);
                Ok(())
            }
        }
    }

    fn on_data_tick(&mut self, timestamp: DateTime<Utc>) -> Result<(), BacktestError> {
        if self.tick <= self.warmup_bars as u64 {
            return Ok(());
        }
        let ctx = StrategyContext::new(self.tick, timestamp, self.feed.as_ref(), &self.ledger);
        let Some(out) = self.host.on_tick(&ctx).map_err(BacktestError::StrategyHost)? else {
            return Ok(());
        };

        self.stats.dropped_signals += out.dropped as u64;
        if out.batch.is_empty() {
            return Ok(());
        }
        if out.shadow {
            self.stats.shadow_signals += out.batch.len() as u64;
            info!(tick = self.tick, signals = out.batch.len(), "shadow batch not traded");
            return Ok(());
        }
        self.stats.signals += out.batch.len() as u64;
        self.bus.push(Event::Signals(out.batch));
        Ok(())
    }

    fn on_signals(&mut self, batch: &SignalBatch) {
        let decision = self.gate.size(
            batch,
            &self.ledger,
            self.feed.as_ref(),
            self.lots.as_ref(),
        );
        debug!(
            tick = self.tick,
            equity = decision.equity,
            orders = decision.orders.len(),
            vetoes = decision.vetoes.len(),
            "batch sized"
        );

        self.stats.vetoes += decision.vetoes.len() as u64;
        self.rejections
            .extend(decision.vetoes.into_iter().map(|veto| Rejection::Vetoed {
                timestamp: batch.timestamp,
                veto,
            }));
        for order in decision.orders {
            self.stats.orders += 1;
            self.bus.push(Event::Order(order));
        }
    }

    fn on_order(&mut self, order: Order) {
        match self.simulator.fill(&order, self.feed.as_ref()) {
            Ok(fill) => self.bus.push(Event::Fill(fill)),
            Err(error) => {
                warn!(symbol = %order.symbol, %error, "order not filled");
                self.stats.fill_failures += 1;
                self.rejections.push(Rejection::FillFailed {
                    timestamp: order.timestamp,
                    order,
                    error,
                });
            }
        }
    }

    fn on_fill(&mut self, fill: Fill) {
        match self.ledger.apply(fill.clone()) {
            Ok(()) => self.stats.fills += 1,
            Err(error) => {
                warn!(symbol = %fill.symbol, qty = fill.quantity, %error, "fill rejected by ledger");
                self.stats.ledger_rejections += 1;
                self.rejections.push(Rejection::LedgerRejected {
                    timestamp: fill.timestamp,
                    fill,
                    error,
                });
            }
        }
    }
}

fn validate_sizing(config: &BacktestConfig) -> Result<(), BacktestError> {
    let rf = config.sizing.risk_fraction;
    if !(rf.is_finite() && rf > 0.0 && rf <= 1.0) {
        return Err(BacktestError::InvalidSizing {
            field: "risk_fraction",
            value: rf,
        });
    }
    if config.periods_per_year == 0 {
        return Err(BacktestError::InvalidSizing {
            field: "periods_per_year",
            value: 0.0,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
