//! Rolling window of admission timestamps.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Timestamps recorded within the trailing `window`.
///
/// Entries are appended in clock order, so expired entries are always at
/// the front.
#[derive(Debug)]
pub struct SlidingWindow {
    stamps: VecDeque<Instant>,
    window: Duration,
}

impl SlidingWindow {
    pub fn new(window: Duration, capacity_hint: usize) -> Self {
        Self {
            stamps: VecDeque::with_capacity(capacity_hint),
            window,
        }
    }

    /// Drop every entry at least `window` old.
    pub fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.stamps.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.stamps.push_back(now);
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_is_inclusive_at_boundary() {
        let start = Instant::now();
        let mut window = SlidingWindow::new(Duration::from_secs(1), 4);
        window.record(start);
        window.record(start + Duration::from_millis(500));

        window.prune(start + Duration::from_millis(999));
        assert_eq!(window.len(), 2);

        window.prune(start + Duration::from_secs(1));
        assert_eq!(window.len(), 1);

        window.prune(start + Duration::from_millis(1500));
        assert!(window.is_empty());
    }
}
