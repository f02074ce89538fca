//! A throttling session: one store, one limiter, one sink.
//!
//! The session is the value both sides share. Producers call
//! [`ThrottleSession::ingest`] (or push into the channel returned by
//! [`ThrottleSession::spawn_ingest`]); a scheduler calls
//! [`ThrottleSession::run_pass`], or lets [`ThrottleSession::spawn_drainer`]
//! do it on a fixed period.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::{Clock, MonoClock};
use crate::config::ThrottleConfig;
use crate::conflation::ConflationStore;
use crate::error::ThrottleError;
use crate::limiter::RateLimiter;
use crate::model::MarketUpdate;
use crate::publisher::{PassReport, ThrottledPublisher, UpdateSink};

/// Ingress side of the pipeline.
pub trait UpdateHandler: Send + Sync {
    fn on_update(&self, update: MarketUpdate);
}

impl UpdateHandler for ConflationStore {
    fn on_update(&self, update: MarketUpdate) {
        self.offer(update);
    }
}

pub struct ThrottleSession {
    config: ThrottleConfig,
    publisher: ThrottledPublisher,
}

impl ThrottleSession {
    /// Create a session on the monotonic system clock.
    pub fn new(config: ThrottleConfig, sink: Arc<dyn UpdateSink>) -> Result<Self, ThrottleError> {
        Self::with_clock(config, sink, Arc::new(MonoClock))
    }

    /// Create a session reading time from `clock`.
    pub fn with_clock(
        config: ThrottleConfig,
        sink: Arc<dyn UpdateSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ThrottleError> {
        config.validate()?;
        let store = Arc::new(ConflationStore::with_capacity(config.store_capacity));
        let limiter = Arc::new(RateLimiter::with_clock(config.limiter_config(), clock)?);
        let publisher = ThrottledPublisher::new(store, limiter, sink)
            .with_failure_policy(config.on_publish_failure);

        Ok(Self { config, publisher })
    }

    /// Get the session configuration.
    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Get the shared conflation store.
    pub fn store(&self) -> &Arc<ConflationStore> {
        self.publisher.store()
    }

    /// Get the shared rate limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        self.publisher.limiter()
    }

    /// Get the publisher that runs the drain passes.
    pub fn publisher(&self) -> &ThrottledPublisher {
        &self.publisher
    }

    /// Accept one update. Never blocks on the sink and never fails.
    #[inline]
    pub fn ingest(&self, update: MarketUpdate) {
        self.store().offer(update);
    }

    /// Run one drain pass now.
    pub fn run_pass(&self) -> PassReport {
        self.publisher.run()
    }

    /// Run a drain pass every `config.drain_interval_ms` on the tokio runtime.
    pub fn spawn_drainer(self: &Arc<Self>) -> DrainerHandle {
        let session = Arc::clone(self);
        let period = self.config.drain_interval();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut passes = 0u64;

            info!("Drainer started (every {:?})", period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = session.run_pass();
                        passes += 1;
                        if report.budget_exhausted() {
                            warn!(
                                "Global budget refused all {} pending symbols ({} in window, charge {})",
                                report.attempted,
                                session.limiter().window_occupancy(),
                                session.config.budget_charge
                            );
                        }
                        let evicted = session.limiter().evict_idle_keys();
                        if evicted > 0 {
                            debug!("Evicted {} idle symbols from the limiter", evicted);
                        }
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }
            info!("Drainer stopped after {} passes", passes);
            passes
        });

        DrainerHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    /// Feed the store from a bounded channel.
    ///
    /// The returned task ends when every sender is dropped and yields the
    /// number of updates it forwarded.
    pub fn spawn_ingest(
        self: &Arc<Self>,
        capacity: usize,
    ) -> (mpsc::Sender<MarketUpdate>, JoinHandle<u64>) {
        let (sender, mut receiver) = mpsc::channel::<MarketUpdate>(capacity);
        let session = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut forwarded = 0u64;
            while let Some(update) = receiver.recv().await {
                session.ingest(update);
                forwarded += 1;
            }
            info!("Ingest channel closed after {} updates", forwarded);
            forwarded
        });

        (sender, task)
    }
}

impl UpdateHandler for ThrottleSession {
    fn on_update(&self, update: MarketUpdate) {
        self.ingest(update);
    }
}

/// Handle to a running drainer task.
pub struct DrainerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<u64>,
}

impl DrainerHandle {
    /// Check if the drainer task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the drainer and wait for it. Returns the number of passes run.
    pub async fn shutdown(mut self) -> Result<u64, ThrottleError> {
        if let Some(tx) = self.shutdown.take() {
            // The task may already be gone; the join below reports why.
            let _ = tx.send(());
        }
        Ok(self.task.await?)
    }
}
