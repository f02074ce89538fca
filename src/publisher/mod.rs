//! The drain loop: moves admitted symbols from the store to the sink.
//!
//! One call to [`ThrottledPublisher::run`] is one pass. A pass takes a
//! snapshot of the pending symbols and asks the limiter about each of them
//! exactly once, in pending order. Admitted symbols are taken out of the
//! store with their latest value and published; rejected symbols stay
//! pending, still conflating, until a later pass.

pub mod sink;

pub use sink::{ChannelSink, LoggingSink, NoopSink, RecordingSink, UpdateSink};

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::conflation::ConflationStore;
use crate::limiter::{Admission, RateLimiter};

/// What happens to a symbol whose publish returned an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishFailurePolicy {
    /// Put the update back in its old position unless a newer update
    /// for the symbol arrived meanwhile. Not counted as a delivery.
    #[default]
    RetainPending,

    /// Count the attempt as delivered and drop the update.
    TreatAsDelivered,
}

/// Outcome of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Symbols pending when the pass started
    pub attempted: usize,
    pub published: usize,
    pub global_limited: usize,
    pub key_limited: usize,
    /// Admitted symbols the sink refused
    pub failed: usize,
    /// Admitted symbols that were no longer pending when taken
    pub vanished: usize,
    /// Symbols still pending when the pass ended
    pub remaining: usize,
}

impl PassReport {
    /// Attempts turned away by either limit.
    pub fn rejected(&self) -> usize {
        self.global_limited + self.key_limited
    }

    /// True when the pass looked at symbols and the global budget refused
    /// every one of them.
    pub fn budget_exhausted(&self) -> bool {
        self.attempted > 0 && self.global_limited == self.attempted
    }
}

/// Drains a [`ConflationStore`] into an [`UpdateSink`] under a [`RateLimiter`].
pub struct ThrottledPublisher {
    store: Arc<ConflationStore>,
    limiter: Arc<RateLimiter>,
    sink: Arc<dyn UpdateSink>,
    on_failure: PublishFailurePolicy,
    /// Deliveries per symbol over the publisher's lifetime
    publish_counts: Mutex<BTreeMap<String, u64>>,
}

impl ThrottledPublisher {
    /// Create a publisher with the default failure policy.
    pub fn new(
        store: Arc<ConflationStore>,
        limiter: Arc<RateLimiter>,
        sink: Arc<dyn UpdateSink>,
    ) -> Self {
        Self {
            store,
            limiter,
            sink,
            on_failure: PublishFailurePolicy::default(),
            publish_counts: Mutex::new(BTreeMap::new()),
        }
    }

    /// Set what a failed publish does to the symbol.
    pub fn with_failure_policy(mut self, policy: PublishFailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn store(&self) -> &Arc<ConflationStore> {
        &self.store
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run one pass.
    ///
    /// Makes at most one admission attempt per symbol that was pending when
    /// the pass began, so it always terminates even if every attempt is
    /// rejected. Symbols offered during the pass wait for the next one.
    pub fn run(&self) -> PassReport {
        if self.store.is_empty() {
            return PassReport::default();
        }

        let snapshot = self.store.pending_keys();
        let mut report = PassReport {
            attempted: snapshot.len(),
            ..Default::default()
        };

        for symbol in &snapshot {
            match self.limiter.check(symbol) {
                Admission::Admitted => {}
                Admission::GlobalLimited => {
                    report.global_limited += 1;
                    continue;
                }
                Admission::KeyLimited => {
                    report.key_limited += 1;
                    continue;
                }
            }

            // Another pass sharing this store may have delivered it already.
            let Some(entry) = self.store.take_entry(symbol) else {
                report.vanished += 1;
                debug!(symbol = %symbol, "Admitted symbol no longer pending");
                continue;
            };

            match self.sink.publish(&entry.update) {
                Ok(()) => {
                    report.published += 1;
                    let count = self.record_delivery(symbol);
                    trace!(
                        symbol = %symbol,
                        last = entry.update.price.last,
                        deliveries = count,
                        occupancy = self.limiter.window_occupancy(),
                        "Published update"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    warn!("Publish failed for {}: {}", symbol, e);
                    match self.on_failure {
                        PublishFailurePolicy::RetainPending => {
                            self.store.restore(entry);
                        }
                        PublishFailurePolicy::TreatAsDelivered => {
                            self.record_delivery(symbol);
                        }
                    }
                }
            }
        }

        report.remaining = self.store.pending_count();
        if report.published > 0 || report.failed > 0 || report.vanished > 0 {
            debug!(
                published = report.published,
                rejected = report.rejected(),
                failed = report.failed,
                vanished = report.vanished,
                remaining = report.remaining,
                "Drain pass complete"
            );
        }
        report
    }

    fn record_delivery(&self, symbol: &str) -> u64 {
        let mut counts = self.publish_counts.lock();
        let count = counts.entry(symbol.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Deliveries per symbol, ordered by symbol.
    pub fn publish_counts(&self) -> BTreeMap<String, u64> {
        self.publish_counts.lock().clone()
    }

    /// Deliveries of one symbol.
    pub fn delivered(&self, symbol: &str) -> u64 {
        self.publish_counts.lock().get(symbol).copied().unwrap_or(0)
    }

    /// Total deliveries across all symbols.
    pub fn total_delivered(&self) -> u64 {
        self.publish_counts.lock().values().sum()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::limiter::{BudgetCharge, LimiterConfig};
    use crate::model::{MarketUpdate, Price};
    use proptest::prelude::*;
    use std::time::Duration;

    fn charge() -> impl Strategy<Value = BudgetCharge> {
        prop_oneof![Just(BudgetCharge::PerAttempt), Just(BudgetCharge::PerDelivery)]
    }

    proptest! {
        #[test]
        fn prop_pass_attempts_each_pending_symbol_once(
            symbols in 0usize..64,
            rounds in 1usize..4,
            max in 1usize..32,
            charge in charge(),
        ) {
            let clock = ManualClock::new();
            let store = Arc::new(ConflationStore::new());
            let config = LimiterConfig::builder()
                .max_admissions(max)
                .window(Duration::from_secs(1))
                .budget_charge(charge)
                .build()
                .unwrap();
            let limiter = Arc::new(RateLimiter::with_clock(config, Arc::new(clock.clone())).unwrap());
            let sink = Arc::new(RecordingSink::new());
            let publisher = ThrottledPublisher::new(Arc::clone(&store), limiter, sink.clone());

            for round in 0..rounds {
                for s in 0..symbols {
                    let last = round as f64;
                    store.offer(MarketUpdate::new(0, format!("A{}", s), Price::new(last, last, last)));
                }
            }

            let report = publisher.run();

            prop_assert_eq!(report.attempted, symbols);
            prop_assert_eq!(publisher.limiter().metrics().attempts(), symbols as u64);
            prop_assert_eq!(report.published, symbols.min(max));
            prop_assert_eq!(
                report.published + report.rejected() + report.failed + report.vanished,
                report.attempted
            );
            prop_assert_eq!(report.remaining, symbols - report.published);
            let expected: Vec<String> = (0..report.published).map(|s| format!("A{}", s)).collect();
            prop_assert_eq!(sink.symbols(), expected);
        }
    }
}
