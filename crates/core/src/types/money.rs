//! Fixed-point money helpers.
//!
//! The store trades in a single implicit currency. Amounts are
//! [`rust_decimal::Decimal`] values in major units (rupees) with two decimal
//! places; the payment gateway wants integer minor units (paise).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Number of minor units in one major unit.
const MINOR_UNITS_PER_MAJOR: i64 = 100;

/// Errors converting a decimal amount for the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Negative amounts can never be charged.
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),
    /// Amount does not fit in an `i64` of minor units.
    #[error("amount out of range: {0}")]
    OutOfRange(Decimal),
}

/// Price of `quantity` units at `unit_price`.
#[must_use]
pub fn line_subtotal(unit_price: Decimal, quantity: u32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Sum an iterator of amounts.
pub fn sum<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().fold(Decimal::ZERO, |acc, x| acc + x)
}

/// Convert a major-unit amount into integer minor units, rounding half away
/// from zero at the second decimal place.
///
/// # Errors
///
/// Returns [`MoneyError::Negative`] for amounts below zero and
/// [`MoneyError::OutOfRange`] if the result overflows `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative(amount));
    }
    let minor = round(amount) * Decimal::from(MINOR_UNITS_PER_MAJOR);
    minor.to_i64().ok_or(MoneyError::OutOfRange(amount))
}

/// Convert integer minor units back into a major-unit amount.
#[must_use]
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// Round to two decimal places, half away from zero.
#[must_use]
pub fn round(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount with exactly two decimal places.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = round(amount);
    rounded.rescale(2);
    rounded.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_line_subtotal_is_exact() {
        assert_eq!(line_subtotal(dec("0.10"), 3), dec("0.30"));
        assert_eq!(line_subtotal(dec("500.00"), 2), dec("1000.00"));
    }

    #[test]
    fn test_sum_does_not_drift() {
        let total = sum(std::iter::repeat_n(dec("0.10"), 10));
        assert_eq!(total, dec("1.00"));
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(dec("1000.00")).unwrap(), 100_000);
        assert_eq!(to_minor_units(dec("12.345")).unwrap(), 1235);
        assert_eq!(to_minor_units(Decimal::ZERO).unwrap(), 0);
        assert!(matches!(
            to_minor_units(dec("-1")),
            Err(MoneyError::Negative(_))
        ));
    }

    #[test]
    fn test_from_minor_units() {
        assert_eq!(from_minor_units(49_950), dec("499.50"));
    }

    #[test]
    fn test_format_amount_pads_to_two_places() {
        assert_eq!(format_amount(dec("500")), "500.00");
        assert_eq!(format_amount(dec("12.5")), "12.50");
        assert_eq!(format_amount(dec("3.999")), "4.00");
    }
}
