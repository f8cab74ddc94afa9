//! Money value type.

use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point issues.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    /// Amount in cents (e.g., 10000 = 100.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from a whole unit value.
    pub fn from_units(units: i64) -> Self {
        Self { cents: units * 100 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns true if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, (self.cents % 100).abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_units_converts_to_cents() {
        assert_eq!(Money::from_units(100).cents(), 10_000);
    }

    #[test]
    fn positivity() {
        assert!(Money::from_cents(1).is_positive());
        assert!(!Money::from_cents(0).is_positive());
        assert!(!Money::from_cents(-100).is_positive());
    }

    #[test]
    fn display_formats_as_decimal() {
        assert_eq!(Money::from_cents(10_000).to_string(), "100.00");
        assert_eq!(Money::from_cents(105).to_string(), "1.05");
    }

    #[test]
    fn serialization_is_transparent() {
        let json = serde_json::to_string(&Money::from_cents(2500)).unwrap();
        assert_eq!(json, "2500");
    }
}
