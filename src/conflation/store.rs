//! Thread-safe conflation store shared by producers and the drain loop.

use parking_lot::Mutex;

use crate::model::MarketUpdate;

use super::buffer::{BufferStats, ConflatingBuffer, PendingEntry};

/// Holds at most one pending update per symbol behind a single mutex.
///
/// Every operation runs in one critical section, so a `take` and an `offer`
/// for the same symbol are strictly ordered: the offer either lands before
/// the take (and its value is the one delivered) or after it (and the symbol
/// becomes pending again).
pub struct ConflationStore {
    inner: Mutex<ConflatingBuffer>,
}

impl ConflationStore {
    /// Create a store sized for 1024 symbols.
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a store sized for roughly `capacity` distinct symbols.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(ConflatingBuffer::with_capacity(capacity)),
        }
    }

    /// Make `update` the pending value of its symbol.
    ///
    /// A symbol that is already pending keeps its position; a new one goes
    /// to the back.
    pub fn offer(&self, update: MarketUpdate) {
        self.inner.lock().offer(update);
    }

    /// Copy of the earliest pending update, left in place.
    pub fn peek_next(&self) -> Option<MarketUpdate> {
        self.inner.lock().peek_next().cloned()
    }

    /// Remove the earliest pending symbol and return its latest update.
    pub fn take_next(&self) -> Option<MarketUpdate> {
        self.inner.lock().take_next()
    }

    /// Remove `symbol` if it is pending and return its latest update.
    pub fn take(&self, symbol: &str) -> Option<MarketUpdate> {
        self.inner.lock().take_entry(symbol).map(|entry| entry.update)
    }

    pub(crate) fn take_entry(&self, symbol: &str) -> Option<PendingEntry> {
        self.inner.lock().take_entry(symbol)
    }

    pub(crate) fn restore(&self, entry: PendingEntry) -> bool {
        self.inner.lock().restore(entry)
    }

    /// Copy of the pending value of `symbol`, if any.
    pub fn latest(&self, symbol: &str) -> Option<MarketUpdate> {
        self.inner.lock().latest(symbol).cloned()
    }

    /// Check if `symbol` is waiting for delivery.
    pub fn is_pending(&self, symbol: &str) -> bool {
        self.inner.lock().contains(symbol)
    }

    /// Snapshot of the pending symbols, earliest first.
    pub fn pending_keys(&self) -> Vec<String> {
        self.inner.lock().pending_keys()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Number of pending symbols.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Snapshot of the buffer statistics.
    pub fn stats(&self) -> BufferStats {
        self.inner.lock().stats().clone()
    }
}

impl Default for ConflationStore {
    fn default() -> Self {
        Self::new()
    }
}
