//! Dual-granularity rate limiter over a rolling time window.
//!
//! A symbol may be published only if
//! 1. fewer than `max_admissions_per_window` entries sit in the global
//!    rolling window, and
//! 2. the symbol itself was last admitted at least one window ago.
//!
//! With [`BudgetCharge::PerAttempt`] the global window records every
//! attempt, so symbols rejected by the per-symbol check still use up the
//! global budget.

mod config;
mod metrics;
mod policy;
mod window;

pub use config::{LimiterConfig, LimiterConfigBuilder};
pub use metrics::LimiterMetrics;
pub use policy::{Admission, BudgetCharge};
pub use window::SlidingWindow;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::clock::{Clock, MonoClock};
use crate::error::ThrottleError;

/// Admission state, guarded as a unit.
struct LimiterState {
    global: SlidingWindow,
    last_admitted_at: HashMap<String, Instant>,
    admitted: u64,
    global_rejections: u64,
    key_rejections: u64,
}

impl LimiterState {
    /// Prune, record `now`, and report whether the window is within budget.
    fn global_admit(&mut self, now: Instant, max: usize) -> bool {
        self.global.prune(now);
        self.global.record(now);
        self.global.len() <= max
    }

    fn key_admit(&mut self, key: &str, now: Instant, window: Duration) -> bool {
        match self.last_admitted_at.get_mut(key) {
            None => {
                self.last_admitted_at.insert(key.to_string(), now);
                true
            }
            Some(last) if now.saturating_duration_since(*last) >= window => {
                *last = now;
                true
            }
            Some(_) => false,
        }
    }

    fn key_would_admit(&self, key: &str, now: Instant, window: Duration) -> bool {
        self.last_admitted_at
            .get(key)
            .map_or(true, |last| now.saturating_duration_since(*last) >= window)
    }

    fn count(&mut self, admission: Admission) -> Admission {
        match admission {
            Admission::Admitted => self.admitted += 1,
            Admission::GlobalLimited => self.global_rejections += 1,
            Admission::KeyLimited => self.key_rejections += 1,
        }
        admission
    }
}

/// Global + per-symbol rate limiter.
///
/// All state sits behind one mutex, so several drain loops may share a
/// limiter without over-admitting.
pub struct RateLimiter {
    config: LimiterConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Create a limiter reading the monotonic system clock.
    pub fn new(config: LimiterConfig) -> Result<Self, ThrottleError> {
        Self::with_clock(config, Arc::new(MonoClock))
    }

    /// Create a limiter reading time from `clock`.
    pub fn with_clock(config: LimiterConfig, clock: Arc<dyn Clock>) -> Result<Self, ThrottleError> {
        config.validate()?;
        // Per-attempt charging can hold more than `max` entries; the hint
        // only covers the steady state.
        let capacity_hint = config.max_admissions_per_window.saturating_add(1).min(65_536);
        let state = LimiterState {
            global: SlidingWindow::new(config.window, capacity_hint),
            last_admitted_at: HashMap::new(),
            admitted: 0,
            global_rejections: 0,
            key_rejections: 0,
        };
        debug!(
            max = config.max_admissions_per_window,
            window_ms = config.window.as_millis() as u64,
            charge = %config.budget_charge,
            "Rate limiter created"
        );
        Ok(Self {
            config,
            clock,
            state: Mutex::new(state),
        })
    }

    /// Get the limiter configuration.
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Global check on its own.
    ///
    /// Always records the attempt in the rolling window, then returns whether
    /// the window is still within `max_admissions_per_window`.
    pub fn global_admit(&self) -> bool {
        let now = self.clock.now();
        self.state
            .lock()
            .global_admit(now, self.config.max_admissions_per_window)
    }

    /// Per-symbol check on its own.
    ///
    /// Records `now` as the symbol's last admission when it passes; a
    /// rejection leaves the record untouched.
    pub fn key_admit(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.state.lock().key_admit(key, now, self.config.window)
    }

    /// Whether `key` may be published now. See [`check`](Self::check).
    #[inline]
    pub fn can_admit(&self, key: &str) -> bool {
        self.check(key).is_admitted()
    }

    /// Run the global check, then the per-symbol check, under one lock.
    ///
    /// The per-symbol check only runs when the global check passed.
    pub fn check(&self, key: &str) -> Admission {
        let now = self.clock.now();
        let max = self.config.max_admissions_per_window;
        let window = self.config.window;
        let mut state = self.state.lock();

        let admission = match self.config.budget_charge {
            BudgetCharge::PerAttempt => {
                if !state.global_admit(now, max) {
                    Admission::GlobalLimited
                } else if !state.key_admit(key, now, window) {
                    Admission::KeyLimited
                } else {
                    Admission::Admitted
                }
            }
            BudgetCharge::PerDelivery => {
                state.global.prune(now);
                if state.global.len() >= max {
                    Admission::GlobalLimited
                } else if !state.key_admit(key, now, window) {
                    Admission::KeyLimited
                } else {
                    state.global.record(now);
                    Admission::Admitted
                }
            }
        };

        trace!(key, %admission, occupancy = state.global.len(), "Admission check");
        state.count(admission)
    }

    /// Whether `key` is outside its per-symbol cool-down, without recording
    /// anything.
    pub fn is_key_ready(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.state.lock().key_would_admit(key, now, self.config.window)
    }

    /// Current size of the global window.
    pub fn window_occupancy(&self) -> usize {
        self.state.lock().global.len()
    }

    /// Forget symbols whose last admission is at least one window old.
    ///
    /// Such a record admits exactly like a missing one, so this only bounds
    /// memory. Returns how many records were dropped.
    pub fn evict_idle_keys(&self) -> usize {
        let now = self.clock.now();
        let window = self.config.window;
        let mut state = self.state.lock();
        let before = state.last_admitted_at.len();
        state
            .last_admitted_at
            .retain(|_, last| now.saturating_duration_since(*last) < window);
        before - state.last_admitted_at.len()
    }

    /// Snapshot of the admission counters.
    pub fn metrics(&self) -> LimiterMetrics {
        let state = self.state.lock();
        LimiterMetrics {
            admitted: state.admitted,
            global_rejections: state.global_rejections,
            key_rejections: state.key_rejections,
            window_occupancy: state.global.len(),
            tracked_keys: state.last_admitted_at.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(max: usize, window_ms: u64) -> (RateLimiter, ManualClock) {
        limiter_with(LimiterConfig::new(max, Duration::from_millis(window_ms)))
    }

    fn limiter_with(config: LimiterConfig) -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new();
        let limiter = RateLimiter::with_clock(config, Arc::new(clock.clone())).unwrap();
        (limiter, clock)
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(RateLimiter::new(LimiterConfig::new(0, Duration::from_secs(1))).is_err());
        assert!(RateLimiter::new(LimiterConfig::new(5, Duration::ZERO)).is_err());
    }

    #[test]
    fn test_global_admit_records_every_attempt() {
        let (limiter, clock) = limiter(3, 1000);

        assert!(limiter.global_admit());
        assert!(limiter.global_admit());
        assert!(limiter.global_admit());
        assert!(!limiter.global_admit());
        assert!(!limiter.global_admit());
        assert_eq!(limiter.window_occupancy(), 5);

        clock.advance(Duration::from_secs(1));
        assert!(limiter.global_admit());
        assert_eq!(limiter.window_occupancy(), 1);
    }

    #[test]
    fn test_key_admit_once_per_window() {
        let (limiter, clock) = limiter(100, 1000);

        assert!(limiter.key_admit("A"));
        assert!(!limiter.key_admit("A"));
        assert!(limiter.key_admit("B"));

        clock.advance(Duration::from_millis(999));
        assert!(!limiter.key_admit("A"));

        clock.advance(Duration::from_millis(1));
        assert!(limiter.key_admit("A"));
        assert!(!limiter.key_admit("A"));
    }

    #[test]
    fn test_rejected_key_does_not_reset_cooldown() {
        let (limiter, clock) = limiter(100, 1000);

        assert!(limiter.key_admit("A"));
        clock.advance(Duration::from_millis(600));
        assert!(!limiter.key_admit("A"));
        clock.advance(Duration::from_millis(400));
        assert!(limiter.key_admit("A"));
    }

    #[test]
    fn test_check_reports_reason() {
        let (limiter, _clock) = limiter(2, 1000);

        assert_eq!(limiter.check("A"), Admission::Admitted);
        assert_eq!(limiter.check("A"), Admission::KeyLimited);
        assert_eq!(limiter.check("B"), Admission::GlobalLimited);

        let metrics = limiter.metrics();
        assert_eq!(metrics.admitted, 1);
        assert_eq!(metrics.key_rejections, 1);
        assert_eq!(metrics.global_rejections, 1);
        assert_eq!(metrics.window_occupancy, 3);
    }

    #[test]
    fn test_global_rejection_skips_key_check() {
        let (limiter, _clock) = limiter(1, 1000);

        assert!(limiter.can_admit("A"));
        assert!(!limiter.can_admit("B"));
        // B never reached the per-symbol check, so it has no record yet.
        assert!(limiter.is_key_ready("B"));
        assert_eq!(limiter.metrics().tracked_keys, 1);
    }

    #[test]
    fn test_per_attempt_key_rejections_consume_budget() {
        let (limiter, _clock) = limiter(3, 1000);

        assert!(limiter.can_admit("A"));
        assert!(!limiter.can_admit("A"));
        assert!(!limiter.can_admit("A"));
        // Two rejected attempts on A used up the slots B would have had.
        assert!(!limiter.can_admit("B"));
    }

    #[test]
    fn test_per_delivery_charges_only_admissions() {
        let config = LimiterConfig::builder()
            .max_admissions(3)
            .window(Duration::from_secs(1))
            .budget_charge(BudgetCharge::PerDelivery)
            .build()
            .unwrap();
        let (limiter, _clock) = limiter_with(config);

        assert!(limiter.can_admit("A"));
        assert!(!limiter.can_admit("A"));
        assert!(!limiter.can_admit("A"));
        assert!(limiter.can_admit("B"));
        assert!(limiter.can_admit("C"));
        assert_eq!(limiter.check("D"), Admission::GlobalLimited);
        assert_eq!(limiter.window_occupancy(), 3);
    }

    #[test]
    fn test_evict_idle_keys() {
        let (limiter, clock) = limiter(10, 1000);
        limiter.can_admit("A");
        clock.advance(Duration::from_millis(500));
        limiter.can_admit("B");
        clock.advance(Duration::from_millis(500));

        assert_eq!(limiter.evict_idle_keys(), 1);
        assert_eq!(limiter.metrics().tracked_keys, 1);
        assert!(limiter.can_admit("A"));
        assert!(!limiter.can_admit("B"));
    }
}
