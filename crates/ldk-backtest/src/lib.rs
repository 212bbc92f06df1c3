//! ldk-backtest
//!
//! Simulation loop for the leveraged backtest core.
//!
//! Pipeline per tick: DATA_TICK -> STRATEGY -> SIGNALS -> SIZING -> ORDER -> FILL -> LEDGER
//!
//! - Closed [`Event`] enum, exhaustive dispatch, FIFO bus drained to empty every tick
//! - Deterministic replay (same bars + config => identical curve and fills)
//! - One ledger snapshot per tick, then an optional heartbeat sleep
//! - Cooperative cancellation checked before each tick and between dispatches
//! - Vetoes, fill failures and ledger refusals are recorded, never fatal
//! - Shadow mode support (strategy runs but trades not executed)

pub mod bus;
pub mod cancel;
mod engine;
pub mod types;

pub use bus::{Event, EventBus};
pub use cancel::CancelToken;
pub use engine::{BacktestEngine, BacktestError};
pub use types::{BacktestConfig, BacktestReport, LoopState, Rejection, RunStats};
