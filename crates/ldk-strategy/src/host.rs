use tracing::warn;

use crate::{
    ShadowMode, Signal, SignalBatch, Strategy, StrategyContext, StrategyHostError, StrategySpec,
    TickOutput,
};

/// StrategyHost enforces:
/// - exactly one strategy
/// - malformed signals (empty symbol, non-finite confidence) never leave the host
/// - shadow mode gating (batch is flagged as not tradable)
pub struct StrategyHost {
    strategy: Option<Box<dyn Strategy>>,
    spec: Option<StrategySpec>,
    shadow: ShadowMode,
}

impl StrategyHost {
    pub fn new(shadow: ShadowMode) -> Self {
        Self {
            strategy: None,
            spec: None,
            shadow,
        }
    }

    /// Register a strategy. Only one.
    pub fn register(&mut self, s: Box<dyn Strategy>) -> Result<(), StrategyHostError> {
        if self.strategy.is_some() {
            return Err(StrategyHostError::MultiStrategyNotAllowed);
        }
        self.spec = Some(s.spec());
        self.strategy = Some(s);
        Ok(())
    }

    pub fn spec(&self) -> Result<StrategySpec, StrategyHostError> {
        self.spec.clone().ok_or(StrategyHostError::NoStrategyRegistered)
    }

    /// Run one tick. `Ok(None)` when the strategy had nothing to say.
    pub fn on_tick(
        &mut self,
        ctx: &StrategyContext<'_>,
    ) -> Result<Option<TickOutput>, StrategyHostError> {
        let s = self
            .strategy
            .as_mut()
            .ok_or(StrategyHostError::NoStrategyRegistered)?;

        let raw = s.on_tick(ctx);
        let total = raw.len();
        let signals: Vec<Signal> = raw
            .into_iter()
            .filter(|sig| {
                let ok = !sig.symbol.trim().is_empty() && sig.confidence.is_finite();
                if !ok {
                    warn!(symbol = %sig.symbol, kind = ?sig.kind, "malformed signal dropped");
                }
                ok
            })
            .collect();
        let dropped = total - signals.len();

        if signals.is_empty() && dropped == 0 {
            return Ok(None);
        }
        Ok(Some(TickOutput {
            batch: SignalBatch::new(ctx.timestamp, signals),
            shadow: self.shadow == ShadowMode::On,
            dropped,
        }))
    }
}
