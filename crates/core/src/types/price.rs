//! Type-safe money representation using decimal arithmetic.
//!
//! All amounts are Brazilian reais with two fractional digits. Arithmetic
//! goes through [`rust_decimal::Decimal`] so `0.1 + 0.2` style float drift
//! never reaches an order total.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Sub};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};

/// Whole reais that fit a `NUMERIC(10, 2)` column.
const MAX_WHOLE_REAIS: i64 = 100_000_000;

/// Errors that can occur when parsing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input string is empty.
    #[error("price cannot be empty")]
    Empty,
    /// The input is not a decimal number.
    #[error("invalid price: {0}")]
    Invalid(String),
    /// The amount is below zero.
    #[error("price cannot be negative")]
    Negative,
    /// The amount does not fit the database column.
    #[error("price is too large")]
    TooLarge,
}

/// An amount of money in BRL.
///
/// Always rounded to two decimal places (half away from zero, matching how
/// prices were displayed with `toFixed(2)`).
///
/// ```
/// use hortifruti_core::Price;
///
/// let banana: Price = "4,99".parse().unwrap();
/// assert_eq!(banana.times(3).to_string(), "R$ 14.97");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero reais.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from an amount, rounding to cents.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Create a price from untrusted input, rounding to cents.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] below zero and
    /// [`PriceError::TooLarge`] for amounts of 10^8 reais or more.
    pub fn checked(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        let price = Self::new(amount);
        if price.0 >= Decimal::from(MAX_WHOLE_REAIS) {
            return Err(PriceError::TooLarge);
        }
        Ok(price)
    }

    /// Create a price from an integer number of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Price of `quantity` units.
    #[must_use]
    pub fn times(self, quantity: i32) -> Self {
        Self::new(self.0 * Decimal::from(quantity))
    }

    /// Apply a percentage discount (`10` means 10% off).
    ///
    /// Percentages outside `0..=100` are clamped.
    #[must_use]
    pub fn discounted_by(self, percent: i32) -> Self {
        let percent = Decimal::from(percent.clamp(0, 100));
        Self::new(self.0 - self.0 * percent / Decimal::ONE_HUNDRED)
    }

    /// Fraction of this price (`0.1` means 10% of the amount).
    #[must_use]
    pub fn fraction(self, rate: Decimal) -> Self {
        Self::new(self.0 * rate)
    }

    /// Subtract, never going below zero.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - other.0)
        }
    }

    /// Plain two-decimal amount without currency symbol, for form inputs.
    #[must_use]
    pub fn plain(&self) -> String {
        format!("{:.2}", self.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R$ {:.2}", self.0)
    }
}

impl FromStr for Price {
    type Err = PriceError;

    /// Parse `"5.99"`, `"5,99"` or `"R$ 5,99"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches("R$").trim();
        if trimmed.is_empty() {
            return Err(PriceError::Empty);
        }

        let normalized = trimmed.replace(',', ".");
        let amount =
            Decimal::from_str(&normalized).map_err(|_| PriceError::Invalid(s.to_owned()))?;

        Self::checked(amount)
    }
}

/// JSON input goes through the same checks as form input.
impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::checked(amount).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dot_and_comma() {
        assert_eq!("5.99".parse::<Price>().unwrap(), Price::from_cents(599));
        assert_eq!("5,99".parse::<Price>().unwrap(), Price::from_cents(599));
        assert_eq!("R$ 12,50".parse::<Price>().unwrap(), Price::from_cents(1250));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!("".parse::<Price>(), Err(PriceError::Empty));
        assert!(matches!("abc".parse::<Price>(), Err(PriceError::Invalid(_))));
        assert_eq!("-1".parse::<Price>(), Err(PriceError::Negative));
    }

    #[test]
    fn test_display_uses_two_decimals() {
        assert_eq!(Price::from_cents(599).to_string(), "R$ 5.99");
        assert_eq!(Price::from_cents(500).to_string(), "R$ 5.00");
        assert_eq!(Price::ZERO.to_string(), "R$ 0.00");
    }

    #[test]
    fn test_times_and_sum() {
        let apple = Price::from_cents(599);
        let lettuce = Price::from_cents(299);
        let total: Price = [apple.times(2), lettuce.times(3)].into_iter().sum();
        assert_eq!(total, Price::from_cents(2095));
    }

    #[test]
    fn test_discounted_by_percentage() {
        let price = Price::from_cents(1000);
        assert_eq!(price.discounted_by(10), Price::from_cents(900));
        assert_eq!(price.discounted_by(0), price);
        assert_eq!(price.discounted_by(150), Price::ZERO);
    }

    #[test]
    fn test_discount_rounds_to_cents() {
        // 4.99 * 0.85 = 4.2415
        assert_eq!(Price::from_cents(499).discounted_by(15), Price::from_cents(424));
    }

    #[test]
    fn test_saturating_sub() {
        let a = Price::from_cents(500);
        let b = Price::from_cents(800);
        assert_eq!(a.saturating_sub(b), Price::ZERO);
        assert_eq!(b.saturating_sub(a), Price::from_cents(300));
    }

    #[test]
    fn test_parse_rejects_amounts_over_column_size() {
        assert_eq!("100000000".parse::<Price>(), Err(PriceError::TooLarge));
        assert_eq!(
            "99999999,99".parse::<Price>().unwrap(),
            Price::from_cents(9_999_999_999)
        );
    }

    #[test]
    fn test_deserialize_validates_amount() {
        assert!(serde_json::from_str::<Price>("\"-10.00\"").is_err());
        assert!(serde_json::from_str::<Price>("\"100000000.00\"").is_err());
        assert_eq!(
            serde_json::from_str::<Price>("\"1.999\"").unwrap(),
            Price::from_cents(200)
        );
        assert_eq!(
            serde_json::from_str::<Price>("\"4.49\"").unwrap(),
            Price::from_cents(449)
        );
    }

    #[test]
    fn test_serde_keeps_two_decimals() {
        let json = serde_json::to_string(&Price::from_cents(599)).unwrap();
        assert_eq!(serde_json::from_str::<Price>(&json).unwrap(), Price::from_cents(599));
    }

    #[test]
    fn test_plain() {
        assert_eq!(Price::from_cents(2000).plain(), "20.00");
    }
}
