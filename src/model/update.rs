use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct Price {
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
}

impl Price {
    pub fn new(bid: f64, ask: f64, last: f64) -> Self {
        Self { bid, ask, last }
    }
}

/// One price tick for one symbol.
///
/// The symbol is the conflation key. Two updates are only ever compared by
/// symbol; the timestamp is carried through untouched.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarketUpdate {
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    pub symbol: String,
    pub price: Price,
}

impl MarketUpdate {
    pub fn new(timestamp_ms: u64, symbol: impl Into<String>, price: Price) -> Self {
        Self {
            timestamp_ms,
            symbol: symbol.into(),
            price,
        }
    }

    /// Create an update stamped with the current wall-clock time.
    pub fn now(symbol: impl Into<String>, price: Price) -> Self {
        Self::new(epoch_millis(), symbol, price)
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.symbol
    }
}

pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
