//! Monetary amounts backed by `rust_decimal`.
//!
//! Arithmetic is exact decimal arithmetic; rounding only happens where a rule
//! asks for it (VAT is rounded to two fractional digits, half-up). Overflow is
//! reported as a validation failure instead of panicking.

use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Number of fractional digits monetary results are rounded to.
pub const MONEY_SCALE: u32 = 2;

/// A monetary amount in the (single) shop currency.
///
/// Serialized as a JSON number, accepted as a number or a decimal string.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// `self × quantity`, unrounded.
    pub fn times(self, quantity: u32) -> DomainResult<Money> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Money)
            .ok_or_else(|| DomainError::validation(format!("amount overflow: {self} x {quantity}")))
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation(format!("amount overflow: {self} + {other}")))
    }

    /// `self × rate`, rounded to [`MONEY_SCALE`] digits with ties away from zero
    /// (half-up for the non-negative amounts this system handles).
    pub fn apply_rate(self, rate: Decimal) -> DomainResult<Money> {
        let raw = self
            .0
            .checked_mul(rate)
            .ok_or_else(|| DomainError::validation(format!("amount overflow: {self} x {rate}")))?;
        Ok(Money(raw.round_dp_with_strategy(
            MONEY_SCALE,
            RoundingStrategy::MidpointAwayFromZero,
        )))
    }

    /// Sum of amounts, failing on overflow.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> DomainResult<Money> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Money)
            .map_err(|e| DomainError::validation(format!("invalid amount '{s}': {e}")))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    #[test]
    fn apply_rate_rounds_half_up_to_two_digits() {
        let rate = Decimal::from_str("0.20").unwrap();
        // 0.625 x 0.2 = 0.125 -> 0.13
        assert_eq!(money("0.625").apply_rate(rate).unwrap(), money("0.13"));
        // 0.62 x 0.2 = 0.124 -> 0.12
        assert_eq!(money("0.62").apply_rate(rate).unwrap(), money("0.12"));
        assert_eq!(money("1200.00").apply_rate(rate).unwrap(), money("240.00"));
    }

    #[test]
    fn times_multiplies_exactly() {
        assert_eq!(money("1500.00").times(2).unwrap(), money("3000.00"));
        assert_eq!(money("0.10").times(3).unwrap(), money("0.30"));
    }

    #[test]
    fn overflow_is_a_validation_error() {
        let err = Money::new(Decimal::MAX).times(2).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn serializes_as_json_number_and_accepts_strings() {
        let json = serde_json::to_value(money("1440.00")).unwrap();
        assert_eq!(json.as_f64(), Some(1440.0));

        let from_number: Money = serde_json::from_str("99.99").unwrap();
        let from_string: Money = serde_json::from_str("\"99.99\"").unwrap();
        assert_eq!(from_number, money("99.99"));
        assert_eq!(from_string, money("99.99"));
    }

    #[test]
    fn negative_detection_ignores_negative_zero() {
        assert!(money("-0.01").is_negative());
        assert!(!money("0").is_negative());
        assert!(!money("-0.00").is_negative());
    }

    proptest! {
        #[test]
        fn checked_sum_matches_integer_cent_sum(cents in proptest::collection::vec(0i64..10_000_000, 0..20)) {
            let expected: i64 = cents.iter().sum();
            let total = Money::checked_sum(cents.iter().map(|c| Money::new(Decimal::new(*c, 2)))).unwrap();
            prop_assert_eq!(total, Money::new(Decimal::new(expected, 2)));
        }
    }
}
