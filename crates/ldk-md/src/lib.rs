//! ldk-md
//!
//! Market-data side of the backtest core.
//!
//! This crate owns the feed abstraction ([`MarketFeed`]) the simulation loop
//! consumes, an explicitly constructed [`BarStore`] provider, the historical
//! [`BarFeed`] replay over it, CSV ingest, and lot-size metadata.

pub mod ingest_csv;
pub mod instruments;

mod feed;
mod replay;
mod store;
mod types;

pub use feed::MarketFeed;
pub use ingest_csv::{load_csv_file, parse_csv_str, parse_timestamp, CsvIngestError};
pub use instruments::{InstrumentTable, LotSizeProvider};
pub use replay::BarFeed;
pub use store::{BarStore, BarStoreError};
pub use types::{Bar, BarField, FeedStep};
