use std::collections::BTreeMap;

/// Exchange metadata needed to size orders.
pub trait LotSizeProvider {
    /// Minimum tradable multiple for `symbol` (always >= 1).
    fn lot_size(&self, symbol: &str) -> u64;
}

/// Static lot-size table with a fallback for unlisted symbols.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstrumentTable {
    default_lot: u64,
    lots: BTreeMap<String, u64>,
}

impl InstrumentTable {
    pub fn new(default_lot: u64) -> Self {
        Self {
            default_lot: default_lot.max(1),
            lots: BTreeMap::new(),
        }
    }

    pub fn with_lot(mut self, symbol: impl Into<String>, lot: u64) -> Self {
        self.lots.insert(symbol.into(), lot.max(1));
        self
    }

    pub fn insert(&mut self, symbol: impl Into<String>, lot: u64) {
        self.lots.insert(symbol.into(), lot.max(1));
    }
}

impl Default for InstrumentTable {
    fn default() -> Self {
        Self::new(1)
    }
}

impl LotSizeProvider for InstrumentTable {
    fn lot_size(&self, symbol: &str) -> u64 {
        self.lots.get(symbol).copied().unwrap_or(self.default_lot)
    }
}
