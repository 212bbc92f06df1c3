//! CSV ingestion for daily bars.
//!
//! ## Column contract (case-insensitive, order-independent)
//!
//! | Column               | Example                  | Notes                                  |
//! |----------------------|--------------------------|----------------------------------------|
//! | `symbol`             | `AAPL`                   | Optional when a default symbol is given |
//! | `timestamp` / `date` | `2024-01-02` / RFC 3339 / epoch secs | Dates are taken as 00:00 UTC |
//! | `open` `high` `low` `close` | `182.34`          | Required                               |
//! | `volume`             | `1000000`                | Optional, defaults to 0                |
//! | anything else        | `atr` = `1.92`           | Numeric extra column; blanks skipped   |

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};

use crate::store::{BarStore, BarStoreError};
use crate::types::Bar;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum CsvIngestError {
    /// An I/O or CSV-library error.
    Io(String),
    /// The header row is missing a required column.
    MissingHeader(String),
    /// A record field could not be parsed into the expected type.
    ParseField {
        row: usize,
        field: String,
        raw: String,
    },
    /// Parsed bars were rejected by the store.
    Store(BarStoreError),
}

impl fmt::Display for CsvIngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsvIngestError::Io(msg) => write!(f, "csv io error: {msg}"),
            CsvIngestError::MissingHeader(col) => {
                write!(f, "csv missing required header column: '{col}'")
            }
            CsvIngestError::ParseField { row, field, raw } => {
                write!(f, "csv row {row}: cannot parse field '{field}' from value '{raw}'")
            }
            CsvIngestError::Store(e) => write!(f, "csv rejected by store: {e}"),
        }
    }
}

impl std::error::Error for CsvIngestError {}

impl From<BarStoreError> for CsvIngestError {
    fn from(e: BarStoreError) -> Self {
        CsvIngestError::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a CSV file into a [`BarStore`].
///
/// `default_symbol` names the instrument when the file has no `symbol` column
/// (one file per symbol).
pub fn load_csv_file(path: &Path, default_symbol: Option<&str>) -> Result<BarStore, CsvIngestError> {
    let file = std::fs::File::open(path)
        .map_err(|e| CsvIngestError::Io(format!("open '{}': {e}", path.display())))?;
    let bars = parse_csv_reader(file, default_symbol)?;
    Ok(BarStore::from_bars(bars)?)
}

/// Parse CSV from a string slice (useful for tests without touching the
/// filesystem).
pub fn parse_csv_str(src: &str, default_symbol: Option<&str>) -> Result<Vec<Bar>, CsvIngestError> {
    parse_csv_reader(src.as_bytes(), default_symbol)
}

pub fn parse_csv_reader<R: Read>(
    src: R,
    default_symbol: Option<&str>,
) -> Result<Vec<Bar>, CsvIngestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(src);

    let headers = rdr
        .headers()
        .map_err(|e| CsvIngestError::Io(e.to_string()))?
        .clone();
    let cols = Columns::resolve(&headers, default_symbol.is_some())?;

    let mut out = Vec::new();
    for (i, rec) in rdr.records().enumerate() {
        // 1-based data rows, header = row 0
        let row = i + 1;
        let rec = rec.map_err(|e| CsvIngestError::Io(e.to_string()))?;

        let symbol = match cols.symbol {
            Some(idx) => rec.get(idx).unwrap_or_default().to_string(),
            None => default_symbol.unwrap_or_default().to_string(),
        };
        let ts_raw = rec.get(cols.timestamp).unwrap_or_default();
        let timestamp = parse_timestamp(ts_raw).ok_or_else(|| CsvIngestError::ParseField {
            row,
            field: headers[cols.timestamp].to_string(),
            raw: ts_raw.to_string(),
        })?;

        let price = |idx: usize| -> Result<f64, CsvIngestError> {
            let raw = rec.get(idx).unwrap_or_default();
            raw.parse::<f64>().map_err(|_| CsvIngestError::ParseField {
                row,
                field: headers[idx].to_string(),
                raw: raw.to_string(),
            })
        };

        let mut bar = Bar::new(
            symbol,
            timestamp,
            price(cols.open)?,
            price(cols.high)?,
            price(cols.low)?,
            price(cols.close)?,
            match cols.volume {
                Some(idx) => price(idx)?,
                None => 0.0,
            },
        );

        for (idx, name) in &cols.extra {
            // Blank or non-numeric extras (e.g. indicator warm-up) are absent.
            if let Some(v) = rec.get(*idx).and_then(|raw| raw.parse::<f64>().ok()) {
                bar.extra.insert(name.clone(), v);
            }
        }
        out.push(bar);
    }

    Ok(out)
}

/// Accepts RFC 3339, `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` (UTC) and epoch seconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Columns {
    symbol: Option<usize>,
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
    extra: Vec<(usize, String)>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord, has_default_symbol: bool) -> Result<Self, CsvIngestError> {
        let index: BTreeMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_ascii_lowercase(), i))
            .collect();
        let required = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| CsvIngestError::MissingHeader(name.to_string()))
        };

        let symbol = index.get("symbol").copied();
        if symbol.is_none() && !has_default_symbol {
            return Err(CsvIngestError::MissingHeader("symbol".to_string()));
        }
        let timestamp = index
            .get("timestamp")
            .or_else(|| index.get("date"))
            .copied()
            .ok_or_else(|| CsvIngestError::MissingHeader("timestamp".to_string()))?;

        let known = ["symbol", "timestamp", "date", "open", "high", "low", "close", "volume"];
        let extra = index
            .iter()
            .filter(|(name, _)| !known.contains(&name.as_str()))
            .map(|(name, &i)| (i, name.clone()))
            .collect();

        Ok(Self {
            symbol,
            timestamp,
            open: required("open")?,
            high: required("high")?,
            low: required("low")?,
            close: required("close")?,
            volume: index.get("volume").copied(),
            extra,
        })
    }
}
