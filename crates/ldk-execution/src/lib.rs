//! ldk-execution
//!
//! Order contract and the backtest fill simulator.
//! - Orders carry a positive quantity and a side; fills carry signed quantity
//! - Fills are complete, at the feed's reference price, no slippage
//! - Missing price data is an error, never a default
//! - Pure deterministic logic, no broker wiring

mod simulator;
mod types;

pub use simulator::{ExecutionError, FillSimulator};
pub use types::{Order, OrderKind, Side};
