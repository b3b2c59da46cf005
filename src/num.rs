//! Integers in Swail are arbitrary precision, so every integer value wraps a [`BigInt`]

use core::fmt;

use arbitrary::{Arbitrary, Unstructured};
use gc_arena::Collect;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

/// An arbitrary-precision signed integer as held by a runtime value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Collect)]
#[collect(require_static)]
pub struct Integer(BigInt);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a decimal integer: {0:?}")]
pub struct ParseIntegerError(pub Box<str>);

impl Integer {
    pub fn new(value: BigInt) -> Self {
        Self(value)
    }

    /// Parses `[+-]?[0-9]+`. Surrounding whitespace is rejected.
    pub fn from_decimal(text: &str) -> Result<Self, ParseIntegerError> {
        let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseIntegerError(Box::from(text)));
        }
        BigInt::parse_bytes(text.as_bytes(), 10)
            .map(Self)
            .ok_or_else(|| ParseIntegerError(Box::from(text)))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_bigint(&self) -> &BigInt {
        &self.0
    }

    pub fn to_i64(&self) -> Option<i64> {
        self.0.to_i64()
    }
}

impl From<i64> for Integer {
    fn from(value: i64) -> Self {
        Self(BigInt::from(value))
    }
}

impl From<BigInt> for Integer {
    fn from(value: BigInt) -> Self {
        Self(value)
    }
}

impl PartialEq<i64> for Integer {
    fn eq(&self, other: &i64) -> bool {
        self.0 == BigInt::from(*other)
    }
}

impl PartialEq<BigInt> for Integer {
    fn eq(&self, other: &BigInt) -> bool {
        &self.0 == other
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Build from raw little-endian magnitude bytes so arbtest reaches values far beyond i64
impl<'a> Arbitrary<'a> for Integer {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        let negative: bool = u.arbitrary()?;
        let len = u.int_in_range(0..=24)?;
        let magnitude = u.bytes(len)?;
        let sign = if negative {
            num_bigint::Sign::Minus
        } else {
            num_bigint::Sign::Plus
        };
        Ok(Self(BigInt::from_bytes_le(sign, magnitude)))
    }
}
