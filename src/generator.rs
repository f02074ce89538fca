//! Synthetic tick generation for demos and load tests.

use crate::model::update::epoch_millis;
use crate::model::{MarketUpdate, Price};

/// Produces bursts of ticks over a fixed set of symbols `A0..A{n-1}`.
///
/// Each call to [`generate`](Self::generate) yields `records_per_symbol`
/// rounds, and every round touches every symbol once, so the last update per
/// symbol in a burst carries the highest prices of that burst.
#[derive(Debug, Clone)]
pub struct MarketDataGenerator {
    symbols: Vec<String>,
    records_per_symbol: usize,
    generation: u64,
}

impl MarketDataGenerator {
    pub fn new(symbol_count: usize, records_per_symbol: usize) -> Self {
        Self {
            symbols: (0..symbol_count).map(|i| format!("A{}", i)).collect(),
            records_per_symbol,
            generation: 0,
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Number of bursts generated so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Generate the next burst, ordered round by round.
    pub fn generate(&mut self) -> Vec<MarketUpdate> {
        self.generation += 1;
        let base = self.generation as f64;
        let stamp = epoch_millis() + self.generation;

        let mut burst = Vec::with_capacity(self.symbols.len() * self.records_per_symbol);
        for i in 1..=self.records_per_symbol {
            let step = i as f64;
            for symbol in &self.symbols {
                let price = Price::new(base + step, base + step + step, base + step - 1.0);
                burst.push(MarketUpdate::new(stamp, symbol.clone(), price));
            }
        }
        burst
    }
}
