//! Keyed buffer holding the latest pending update per symbol.

use std::collections::{BTreeMap, HashMap};

use crate::model::MarketUpdate;

/// A pending update together with its queue position.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    /// Position in the pending order; lower is earlier
    pub(crate) seq: u64,
    pub update: MarketUpdate,
}

/// Buffer statistics for monitoring and debugging.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BufferStats {
    /// Every call to `offer`
    pub updates_offered: u64,
    /// Offers that overwrote an already pending value
    pub updates_conflated: u64,
    /// Entries removed for delivery
    pub updates_taken: u64,
    /// Entries put back after a failed delivery
    pub updates_restored: u64,
}

/// Single-threaded conflating buffer.
///
/// `latest` maps each pending symbol to its newest update and doubles as the
/// pending set. `order` maps a monotonically increasing sequence number to
/// the symbol, so the head is always the symbol that became pending first and
/// any symbol can be removed without scanning.
pub struct ConflatingBuffer {
    latest: HashMap<String, PendingEntry>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
    stats: BufferStats,
}

impl ConflatingBuffer {
    /// Create a buffer sized for 1024 symbols.
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a buffer sized for roughly `capacity` distinct symbols.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            latest: HashMap::with_capacity(capacity),
            order: BTreeMap::new(),
            next_seq: 0,
            stats: BufferStats::default(),
        }
    }

    /// Get the buffer statistics.
    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }

    /// Number of pending symbols.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Check if `symbol` is pending.
    pub fn contains(&self, symbol: &str) -> bool {
        self.latest.contains_key(symbol)
    }

    /// Insert or overwrite the pending update for `update.symbol`.
    ///
    /// A symbol that is already pending keeps its position.
    pub fn offer(&mut self, update: MarketUpdate) {
        self.stats.updates_offered += 1;

        if let Some(existing) = self.latest.get_mut(update.key()) {
            existing.update = update;
            self.stats.updates_conflated += 1;
            return;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, update.symbol.clone());
        self.latest.insert(update.symbol.clone(), PendingEntry { seq, update });
    }

    /// Latest update of the earliest pending symbol, left in place.
    pub fn peek_next(&self) -> Option<&MarketUpdate> {
        let (_, symbol) = self.order.first_key_value()?;
        self.latest.get(symbol).map(|entry| &entry.update)
    }

    /// Remove the earliest pending symbol and return its latest update.
    pub fn take_next(&mut self) -> Option<MarketUpdate> {
        let (_, symbol) = self.order.pop_first()?;
        let entry = self.latest.remove(&symbol)?;
        self.stats.updates_taken += 1;
        Some(entry.update)
    }

    /// Remove a specific pending symbol, keeping its queue position in the
    /// returned entry.
    pub fn take_entry(&mut self, symbol: &str) -> Option<PendingEntry> {
        let entry = self.latest.remove(symbol)?;
        self.order.remove(&entry.seq);
        self.stats.updates_taken += 1;
        Some(entry)
    }

    /// Put back an entry whose delivery failed.
    ///
    /// If the symbol was offered again in the meantime the newer value wins
    /// and the entry is dropped. Otherwise it regains its old position.
    /// Returns whether the entry was reinstated.
    pub fn restore(&mut self, entry: PendingEntry) -> bool {
        if self.latest.contains_key(entry.update.key()) {
            return false;
        }
        self.order.insert(entry.seq, entry.update.symbol.clone());
        self.latest.insert(entry.update.symbol.clone(), entry);
        self.stats.updates_restored += 1;
        true
    }

    /// Pending value of `symbol`, if any.
    pub fn latest(&self, symbol: &str) -> Option<&MarketUpdate> {
        self.latest.get(symbol).map(|entry| &entry.update)
    }

    /// Pending symbols, earliest first.
    pub fn pending_keys(&self) -> Vec<String> {
        self.order.values().cloned().collect()
    }
}

impl Default for ConflatingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Price;

    fn tick(symbol: &str, last: f64) -> MarketUpdate {
        MarketUpdate::new(0, symbol, Price::new(last - 1.0, last + 1.0, last))
    }

    #[test]
    fn test_buffer_offer_and_take() {
        let mut buffer = ConflatingBuffer::new();
        buffer.offer(tick("BTC/USD", 100.0));

        assert_eq!(buffer.len(), 1);
        assert!(buffer.take_next().is_some());
        assert!(buffer.is_empty());
        assert!(buffer.take_next().is_none());
    }

    #[test]
    fn test_conflation_overwrite() {
        let mut buffer = ConflatingBuffer::new();
        for i in 0..1000 {
            buffer.offer(tick("A", i as f64));
        }

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.stats().updates_conflated, 999);

        let update = buffer.take_next().unwrap();
        assert_eq!(update.price.last, 999.0);
        assert!(buffer.is_empty());
        assert!(buffer.latest("A").is_none());
    }

    #[test]
    fn test_reoffer_keeps_first_position() {
        let mut buffer = ConflatingBuffer::new();
        buffer.offer(tick("A", 1.0));
        buffer.offer(tick("B", 2.0));
        buffer.offer(tick("A", 3.0));

        assert_eq!(buffer.pending_keys(), vec!["A", "B"]);
        assert_eq!(buffer.peek_next().unwrap().price.last, 3.0);
    }

    #[test]
    fn test_peek_does_not_remove() {
        let mut buffer = ConflatingBuffer::new();
        assert!(buffer.peek_next().is_none());

        buffer.offer(tick("A", 1.0));
        assert_eq!(buffer.peek_next().unwrap().symbol, "A");
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_take_entry_from_middle() {
        let mut buffer = ConflatingBuffer::new();
        buffer.offer(tick("A", 1.0));
        buffer.offer(tick("B", 2.0));
        buffer.offer(tick("C", 3.0));

        let entry = buffer.take_entry("B").unwrap();
        assert_eq!(entry.update.symbol, "B");
        assert_eq!(buffer.pending_keys(), vec!["A", "C"]);
        assert!(buffer.take_entry("B").is_none());
    }

    #[test]
    fn test_taken_symbol_repends_at_back() {
        let mut buffer = ConflatingBuffer::new();
        buffer.offer(tick("A", 1.0));
        buffer.offer(tick("B", 2.0));
        buffer.take_next();
        buffer.offer(tick("A", 5.0));

        assert_eq!(buffer.pending_keys(), vec!["B", "A"]);
    }

    #[test]
    fn test_restore_regains_position() {
        let mut buffer = ConflatingBuffer::new();
        buffer.offer(tick("A", 1.0));
        buffer.offer(tick("B", 2.0));

        let entry = buffer.take_entry("A").unwrap();
        assert!(buffer.restore(entry));
        assert_eq!(buffer.pending_keys(), vec!["A", "B"]);
        assert_eq!(buffer.stats().updates_restored, 1);
    }

    #[test]
    fn test_restore_loses_to_newer_offer() {
        let mut buffer = ConflatingBuffer::new();
        buffer.offer(tick("A", 1.0));

        let entry = buffer.take_entry("A").unwrap();
        buffer.offer(tick("A", 9.0));

        assert!(!buffer.restore(entry));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.latest("A").unwrap().price.last, 9.0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::model::Price;
    use proptest::prelude::*;
    use std::collections::HashMap;

    proptest! {
        #[test]
        fn prop_latest_value_earliest_position(
            offers in prop::collection::vec((0usize..8, any::<u32>()), 0..200),
        ) {
            let mut buffer = ConflatingBuffer::new();
            let mut first_seen = Vec::new();
            let mut last_value = HashMap::new();

            for &(s, value) in &offers {
                let symbol = format!("S{}", s);
                if !first_seen.contains(&symbol) {
                    first_seen.push(symbol.clone());
                }
                let last = value as f64;
                last_value.insert(symbol.clone(), last);
                buffer.offer(MarketUpdate::new(0, &symbol, Price::new(last, last, last)));
            }

            prop_assert_eq!(buffer.pending_keys(), first_seen.clone());
            prop_assert_eq!(
                buffer.stats().updates_conflated as usize,
                offers.len() - first_seen.len()
            );

            for symbol in &first_seen {
                let update = buffer.take_next().unwrap();
                prop_assert_eq!(&update.symbol, symbol);
                prop_assert_eq!(update.price.last, last_value[symbol]);
            }
            prop_assert!(buffer.is_empty());
        }
    }
}
