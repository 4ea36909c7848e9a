use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Number of minor units (cents) per major unit for the currencies we settle in.
const MINOR_UNITS_PER_MAJOR: i64 = 100;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Amount must be positive, got {0}")]
    NotPositive(Decimal),
    #[error("Amount {0} does not fit in minor units")]
    Overflow(Decimal),
}

/// Round a user-facing decimal amount to cents.
pub fn round_to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a decimal currency amount (e.g. `49.99`) into the processor's
/// integer minor-unit representation (e.g. `4999`).
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    if amount <= Decimal::ZERO {
        return Err(MoneyError::NotPositive(amount));
    }

    let cents = round_to_cents(amount)
        .checked_mul(Decimal::from(MINOR_UNITS_PER_MAJOR))
        .ok_or(MoneyError::Overflow(amount))?;

    cents.to_i64().ok_or(MoneyError::Overflow(amount))
}

pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn converts_decimal_amount_to_cents() {
        assert_eq!(to_minor_units(dec!(49.99)), Ok(4999));
        assert_eq!(to_minor_units(dec!(10)), Ok(1000));
        assert_eq!(to_minor_units(dec!(0.01)), Ok(1));
    }

    #[test]
    fn rounds_sub_cent_amounts_half_away_from_zero() {
        assert_eq!(to_minor_units(dec!(19.995)), Ok(2000));
        assert_eq!(to_minor_units(dec!(19.994)), Ok(1999));
    }

    #[test]
    fn rejects_zero_and_negative_amounts() {
        assert_eq!(to_minor_units(dec!(0)), Err(MoneyError::NotPositive(dec!(0))));
        assert!(to_minor_units(dec!(-5.00)).is_err());
    }

    #[test]
    fn minor_units_back_to_decimal() {
        assert_eq!(from_minor_units(4999), dec!(49.99));
    }
}
