//! Publication sinks.

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::ThrottleError;
use crate::model::MarketUpdate;

/// Downstream target for admitted updates.
///
/// `publish` is called synchronously from the drain loop, once per admitted
/// symbol per pass. An `Err` means the update was not delivered.
pub trait UpdateSink: Send + Sync {
    fn publish(&self, update: &MarketUpdate) -> Result<(), ThrottleError>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl UpdateSink for NoopSink {
    fn publish(&self, _update: &MarketUpdate) -> Result<(), ThrottleError> {
        Ok(())
    }
}

/// Keeps every published update in memory, in publish order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    published: Mutex<Vec<MarketUpdate>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every published update, oldest first.
    pub fn published(&self) -> Vec<MarketUpdate> {
        self.published.lock().clone()
    }

    /// Symbols of the published updates, oldest first.
    pub fn symbols(&self) -> Vec<String> {
        self.published
            .lock()
            .iter()
            .map(|update| update.symbol.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.published.lock().len()
    }

    pub fn clear(&self) {
        self.published.lock().clear();
    }
}

impl UpdateSink for RecordingSink {
    fn publish(&self, update: &MarketUpdate) -> Result<(), ThrottleError> {
        self.published.lock().push(update.clone());
        Ok(())
    }
}

/// Writes each update as a JSON line to the log at INFO level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl UpdateSink for LoggingSink {
    fn publish(&self, update: &MarketUpdate) -> Result<(), ThrottleError> {
        let json = serde_json::to_string(update)?;
        info!(target: "tick_throttler::published", "{}", json);
        Ok(())
    }
}

/// Forwards updates into a bounded tokio channel without waiting.
///
/// A full channel is reported as a failed publish, so the symbol stays
/// pending under [`PublishFailurePolicy::RetainPending`](super::PublishFailurePolicy).
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<MarketUpdate>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<MarketUpdate>) -> Self {
        Self { sender }
    }

    /// Create a sink together with the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<MarketUpdate>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(sender), receiver)
    }
}

impl UpdateSink for ChannelSink {
    fn publish(&self, update: &MarketUpdate) -> Result<(), ThrottleError> {
        match self.sender.try_send(update.clone()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(ThrottleError::SinkFailed("channel full".to_string()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ThrottleError::ChannelClosed),
        }
    }
}
