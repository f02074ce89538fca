//! Admission counters.

/// Snapshot of limiter activity since creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimiterMetrics {
    pub admitted: u64,
    pub global_rejections: u64,
    pub key_rejections: u64,
    /// Entries currently held in the global window
    pub window_occupancy: usize,
    /// Symbols with a recorded last admission
    pub tracked_keys: usize,
}

impl LimiterMetrics {
    pub fn attempts(&self) -> u64 {
        self.admitted + self.global_rejections + self.key_rejections
    }

    /// Share of attempts that were rejected, as a percentage.
    pub fn rejection_percent(&self) -> f64 {
        let attempts = self.attempts();
        if attempts == 0 {
            0.0
        } else {
            ((self.global_rejections + self.key_rejections) as f64 / attempts as f64) * 100.0
        }
    }
}

impl std::fmt::Display for LimiterMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "admitted: {}, rejected: {} global / {} key ({:.1}%), window: {}",
            self.admitted,
            self.global_rejections,
            self.key_rejections,
            self.rejection_percent(),
            self.window_occupancy
        )
    }
}
