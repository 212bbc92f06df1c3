//! ldk-risk
//!
//! Risk sizing gate: strategy signals in, bounded orders out.
//!
//! Goals:
//! - Volatility-scaled position sizing rounded down to whole lots
//! - Pyramiding by the original unit size
//! - Exact full-size closes, never vetoed for capital
//! - Affordability pre-check against the ledger
//! - Every dropped signal returned with its reason
//!
//! Deterministic, pure logic. Reads the ledger; never mutates it.

mod gate;
mod types;

pub use gate::{open_quantity, SizingGate};
pub use types::*;
