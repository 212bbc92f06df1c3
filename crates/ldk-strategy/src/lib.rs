//! ldk-strategy
//!
//! Strategy plugin framework.
//!
//! Contract:
//! - Strategies emit typed SIGNALS (open long/short, extend, close); the
//!   sizing gate turns them into orders.
//! - Hook: on_tick -> Vec<Signal> (may be empty).
//! - Context is read-only: feed queries and ledger positions, no mutation path.
//! - Shadow mode: strategy runs but its batches are flagged as not tradable.

mod host;
mod types;

pub use host::*;
pub use types::*;
