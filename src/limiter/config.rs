//! Rate limiter configuration.

use std::time::Duration;

use crate::error::ThrottleError;

use super::policy::BudgetCharge;

/// Configuration for the [`RateLimiter`](super::RateLimiter).
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterConfig {
    /// Publications allowed across all symbols per window (default: 100)
    pub max_admissions_per_window: usize,
    /// Length of the rolling window, also the per-symbol cool-down (default: 1s)
    pub window: Duration,
    /// What spends the global budget (default: every attempt)
    pub budget_charge: BudgetCharge,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_admissions_per_window: 100,
            window: Duration::from_secs(1),
            budget_charge: BudgetCharge::PerAttempt,
        }
    }
}

impl LimiterConfig {
    /// Create a config with the default budget charge.
    pub fn new(max_admissions_per_window: usize, window: Duration) -> Self {
        Self {
            max_admissions_per_window,
            window,
            ..Default::default()
        }
    }

    /// Create a new config builder.
    pub fn builder() -> LimiterConfigBuilder {
        LimiterConfigBuilder::default()
    }

    /// Reject limits the limiter cannot honour.
    pub fn validate(&self) -> Result<(), ThrottleError> {
        if self.max_admissions_per_window == 0 {
            return Err(ThrottleError::InvalidConfig(
                "max_admissions_per_window must be positive".to_string(),
            ));
        }
        if self.window.is_zero() {
            return Err(ThrottleError::InvalidConfig(
                "window must be longer than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder pattern for LimiterConfig.
#[derive(Default)]
pub struct LimiterConfigBuilder {
    config: LimiterConfig,
}

impl LimiterConfigBuilder {
    /// Set the global number of admissions per window.
    pub fn max_admissions(mut self, max: usize) -> Self {
        self.config.max_admissions_per_window = max;
        self
    }

    /// Set the rolling window, also the per-symbol cool-down.
    pub fn window(mut self, window: Duration) -> Self {
        self.config.window = window;
        self
    }

    /// Set what spends the global budget.
    pub fn budget_charge(mut self, charge: BudgetCharge) -> Self {
        self.config.budget_charge = charge;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<LimiterConfig, ThrottleError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
