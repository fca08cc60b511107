//! Money amounts in Japanese yen.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use serde::{Deserialize, Serialize};

/// An amount of money in whole Japanese yen.
///
/// Yen has no fractional unit, so amounts are plain integers. `Display`
/// renders with thousands separators (`13000` → `"13,000"`); currency
/// suffixes are left to the presentation layer.
///
/// ## Examples
///
/// ```
/// use paperslip_core::Yen;
///
/// let unit_price = Yen::new(2500);
/// let subtotal = unit_price.times(2);
/// assert_eq!(subtotal, Yen::new(5000));
/// assert_eq!(subtotal.to_string(), "5,000");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Yen(i64);

impl Yen {
    /// Zero yen.
    pub const ZERO: Self = Self(0);

    /// Create an amount from whole yen.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Get the underlying amount in whole yen.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Multiply a unit price by a quantity.
    #[must_use]
    pub const fn times(self, quantity: i32) -> Self {
        Self(self.0 * quantity as i64)
    }
}

impl Add for Yen {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Yen {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<i64> for Yen {
    fn from(amount: i64) -> Self {
        Self(amount)
    }
}

impl From<Yen> for i64 {
    fn from(amount: Yen) -> Self {
        amount.0
    }
}

impl fmt::Display for Yen {
    /// Formats with thousands separators, e.g. `13,000`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

        let lead = digits.len() % 3;
        for (i, c) in digits.chars().enumerate() {
            if i != 0 && (i + 3 - lead) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }

        if self.0 < 0 {
            write!(f, "-{grouped}")
        } else {
            write!(f, "{grouped}")
        }
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Yen {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Yen {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Yen {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
