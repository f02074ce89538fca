//! Admission outcomes and budget accounting policy.

use serde::{Deserialize, Serialize};

/// Result of asking the limiter whether a symbol may be published now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Both the global and the per-symbol budget allowed it.
    Admitted,

    /// The rolling window already holds the maximum number of entries.
    GlobalLimited,

    /// The symbol was admitted less than one window ago.
    KeyLimited,
}

impl Admission {
    #[inline]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }

    /// Get human-readable name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::GlobalLimited => "global_limited",
            Self::KeyLimited => "key_limited",
        }
    }
}

impl std::fmt::Display for Admission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What consumes a slot of the global rolling budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetCharge {
    /// Every admission attempt takes a slot, including attempts the global
    /// or per-symbol check then rejects.
    #[default]
    PerAttempt,

    /// Only attempts that pass both checks take a slot.
    PerDelivery,
}

impl BudgetCharge {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PerAttempt => "per_attempt",
            Self::PerDelivery => "per_delivery",
        }
    }
}

impl std::fmt::Display for BudgetCharge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_admitted() {
        assert!(Admission::Admitted.is_admitted());
        assert!(!Admission::GlobalLimited.is_admitted());
        assert!(!Admission::KeyLimited.is_admitted());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Admission::KeyLimited), "key_limited");
        assert_eq!(format!("{}", BudgetCharge::PerDelivery), "per_delivery");
    }

    #[test]
    fn test_budget_charge_serde() {
        let charge: BudgetCharge = serde_json::from_str(r#""per_delivery""#).unwrap();
        assert_eq!(charge, BudgetCharge::PerDelivery);
        assert_eq!(BudgetCharge::default(), BudgetCharge::PerAttempt);
    }
}
