//! Money type shared by every store and the settlement engine
//!
//! Prices are `rust_decimal::Decimal` everywhere. Legacy rows and clients
//! send prices either as JSON numbers or as decimal text ("15.50", "$15.50"),
//! so conversion happens once at the boundary and nowhere else.
//!
//! A [`Price`] fits the `NUMERIC(12, 2)` price columns: at most two decimal
//! places and at most [`Price::MAX_CENTS`] cents. Aggregates (cart totals,
//! stats) are plain `Decimal` and are only ever added with `checked_add`.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("Price cannot be empty")]
    Empty,

    #[error("Price cannot be negative")]
    Negative,

    #[error("Invalid price: {0}")]
    Invalid(String),

    #[error("Price {0} exceeds the maximum of 9999999999.99")]
    TooLarge(String),

    #[error("Price {0} has more than two decimal places")]
    TooPrecise(String),

    #[error("Amount overflow")]
    Overflow,
}

/// Non-negative fixed-point amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(Decimal);

impl Price {
    pub const ZERO: Price = Price(Decimal::ZERO);

    /// Largest listing price, in cents (9_999_999_999.99)
    pub const MAX_CENTS: i64 = 999_999_999_999;

    pub const SCALE: u32 = 2;

    pub fn new(value: Decimal) -> Result<Self, PriceError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(PriceError::Negative);
        }
        let rounded = value.round_dp(Self::SCALE);
        if rounded != value {
            return Err(PriceError::TooPrecise(value.to_string()));
        }
        if rounded > Self::max().0 {
            return Err(PriceError::TooLarge(value.to_string()));
        }
        Ok(Self(rounded))
    }

    pub fn max() -> Price {
        Price(Decimal::new(Self::MAX_CENTS, Self::SCALE))
    }

    /// Parse price text, tolerating surrounding whitespace and a leading `$`
    pub fn parse(raw: &str) -> Result<Self, PriceError> {
        let s = raw.trim();
        let s = s.strip_prefix('$').unwrap_or(s).trim();
        if s.is_empty() {
            return Err(PriceError::Empty);
        }
        if s.contains(['e', 'E']) {
            return Err(PriceError::Invalid(raw.to_string()));
        }
        let value = Decimal::from_str(s).map_err(|_| PriceError::Invalid(raw.to_string()))?;
        Self::new(value)
    }

    #[inline]
    pub fn inner(self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

/// Largest stats aggregate, matching the `NUMERIC(14, 2)` stats columns
pub fn max_total() -> Decimal {
    Decimal::new(99_999_999_999_999, Price::SCALE)
}

/// Sum of `prices`. Fails instead of panicking when the total leaves the
/// aggregate range.
pub fn checked_total<I>(prices: I) -> Result<Decimal, PriceError>
where
    I: IntoIterator<Item = Price>,
{
    prices
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, p| checked_accumulate(acc, p.0))
}

/// `acc + amount`, bounded by [`max_total`]
pub fn checked_accumulate(acc: Decimal, amount: Decimal) -> Result<Decimal, PriceError> {
    acc.checked_add(amount)
        .filter(|sum| *sum <= max_total())
        .ok_or(PriceError::Overflow)
}

/// Lenient conversion for previously stored aggregate values: anything
/// missing or unparseable counts as zero.
pub fn coerce_decimal(raw: Option<&str>) -> Decimal {
    let Some(s) = raw.map(str::trim) else {
        return Decimal::ZERO;
    };
    let s = s.strip_prefix('$').unwrap_or(s).trim();
    if s.contains(['e', 'E']) {
        return Decimal::ZERO;
    }
    Decimal::from_str(s).unwrap_or(Decimal::ZERO)
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Price::parse(s)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Price::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(p: Price) -> Self {
        p.0
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum DecimalOrString {
            String(String),
            Number(Decimal),
        }

        match DecimalOrString::deserialize(deserializer)? {
            DecimalOrString::String(s) => Price::parse(&s).map_err(D::Error::custom),
            DecimalOrString::Number(d) => Price::new(d).map_err(D::Error::custom),
        }
    }
}

impl Serialize for Price {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // String keeps the scale ("15.50" stays "15.50")
        serializer.serialize_str(&self.0.to_string())
    }
}
