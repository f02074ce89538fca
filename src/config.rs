//! Session configuration with tunable limits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ThrottleError;
use crate::limiter::{BudgetCharge, LimiterConfig};
use crate::publisher::PublishFailurePolicy;

/// Configuration for a [`ThrottleSession`](crate::ThrottleSession).
///
/// Durations are whole milliseconds, in code and in JSON:
///
/// ```json
/// { "max_admissions_per_window": 100, "window_ms": 1000, "drain_interval_ms": 100 }
/// ```
///
/// Under [`BudgetCharge::PerAttempt`] every symbol a pass looks at spends a
/// global slot, admitted or not. Once more symbols are pending than
/// `max_admissions_per_window`, and passes run more often than once per
/// window, each pass refills the window with rejected attempts and nothing
/// is published again while the backlog stays that large. With the
/// defaults, 500 pending symbols publish 100 and then stall. Use
/// [`BudgetCharge::PerDelivery`] when the symbol count can exceed the budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Publications allowed across all symbols per window (default: 100)
    pub max_admissions_per_window: usize,
    /// Rolling window and per-symbol cool-down in milliseconds (default: 1000)
    pub window_ms: u64,
    /// Expected number of distinct symbols (default: 1024)
    pub store_capacity: usize,
    /// Period of the background drainer in milliseconds (default: 100)
    pub drain_interval_ms: u64,
    /// What spends the global budget (default: every attempt)
    pub budget_charge: BudgetCharge,
    /// What a failed publish does to the symbol (default: keep it pending)
    pub on_publish_failure: PublishFailurePolicy,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_admissions_per_window: 100,
            window_ms: 1000,
            store_capacity: 1024,
            drain_interval_ms: 100,
            budget_charge: BudgetCharge::PerAttempt,
            on_publish_failure: PublishFailurePolicy::RetainPending,
        }
    }
}

impl ThrottleConfig {
    /// Create a new config builder.
    pub fn builder() -> ThrottleConfigBuilder {
        ThrottleConfigBuilder::default()
    }

    /// A tight budget for slow or metered downstream sinks.
    pub fn strict() -> Self {
        Self {
            max_admissions_per_window: 10,
            drain_interval_ms: 250,
            ..Default::default()
        }
    }

    /// A generous budget for sinks that can absorb bursts.
    pub fn relaxed() -> Self {
        Self {
            max_admissions_per_window: 1000,
            store_capacity: 16_384,
            drain_interval_ms: 20,
            ..Default::default()
        }
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ThrottleError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject zero limits and zero durations.
    pub fn validate(&self) -> Result<(), ThrottleError> {
        self.limiter_config().validate()?;
        if self.drain_interval_ms == 0 {
            return Err(ThrottleError::InvalidConfig(
                "drain_interval must be longer than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The rolling window as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// The drainer period as a [`Duration`].
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    /// The part of this configuration the rate limiter needs.
    pub fn limiter_config(&self) -> LimiterConfig {
        LimiterConfig {
            max_admissions_per_window: self.max_admissions_per_window,
            window: self.window(),
            budget_charge: self.budget_charge,
        }
    }
}

/// Builder pattern for ThrottleConfig.
#[derive(Default)]
pub struct ThrottleConfigBuilder {
    config: ThrottleConfig,
}

impl ThrottleConfigBuilder {
    /// Set the global number of publications per window.
    pub fn max_admissions(mut self, max: usize) -> Self {
        self.config.max_admissions_per_window = max;
        self
    }

    /// Set the rolling window in milliseconds.
    pub fn window_ms(mut self, window: u64) -> Self {
        self.config.window_ms = window;
        self
    }

    /// Set the expected number of distinct symbols.
    pub fn store_capacity(mut self, capacity: usize) -> Self {
        self.config.store_capacity = capacity;
        self
    }

    /// Set the drainer period in milliseconds.
    pub fn drain_interval_ms(mut self, interval: u64) -> Self {
        self.config.drain_interval_ms = interval;
        self
    }

    /// Set what spends the global budget.
    pub fn budget_charge(mut self, charge: BudgetCharge) -> Self {
        self.config.budget_charge = charge;
        self
    }

    /// Set what a failed publish does to the symbol.
    pub fn on_publish_failure(mut self, policy: PublishFailurePolicy) -> Self {
        self.config.on_publish_failure = policy;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<ThrottleConfig, ThrottleError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
