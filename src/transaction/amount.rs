//! Fixed-point amount handling.
//!
//! Amounts arrive as decimal strings and are scaled to base units
//! (`amount * 10^decimals`) without ever passing through floating point.

use std::fmt;

use alloy::primitives::U256;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("Amount is empty")]
    Empty,

    #[error("Amount must not be negative")]
    Negative,

    #[error("Amount '{0}' is not a plain decimal number")]
    Malformed(String),

    #[error("Amount has more than {decimals} decimal places")]
    ExcessPrecision { decimals: u8 },

    #[error("Amount is too large")]
    Overflow,
}

/// Scale a decimal string to base units.
///
/// Trailing fractional zeros do not count towards precision, so `"1.50"`
/// is valid with one decimal.
pub fn scale(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    let s = amount.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }
    if s.starts_with('-') {
        return Err(AmountError::Negative);
    }

    let (whole, fraction) = match s.split_once('.') {
        Some((whole, fraction)) => {
            if fraction.is_empty() {
                return Err(AmountError::Malformed(s.to_string()));
            }
            (whole, fraction)
        }
        None => (s, ""),
    };
    if whole.is_empty()
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(AmountError::Malformed(s.to_string()));
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(AmountError::ExcessPrecision { decimals });
    }

    let digits = format!("{}{:0<width$}", whole, fraction, width = decimals as usize);
    U256::from_str_radix(&digits, 10).map_err(|_| AmountError::Overflow)
}

/// Render base units back as a decimal string, without trailing zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

/// A decimal amount as given by the caller, kept verbatim until scaled.
///
/// Accepts both JSON strings (`"10.5"`) and JSON numbers (`10.5`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecimalAmount(String);

impl DecimalAmount {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn scale(&self, decimals: u8) -> Result<U256, AmountError> {
        scale(&self.0, decimals)
    }
}

impl fmt::Display for DecimalAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accepts a JSON string verbatim or a JSON integer. Non-integer numbers are
/// refused: once a parser has turned them into `f64` the digits past the
/// 17th are gone.
impl<'de> Deserialize<'de> for DecimalAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = DecimalAmount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal string or an integer")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                Ok(DecimalAmount(value.to_string()))
            }

            fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
                Ok(DecimalAmount(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                Ok(DecimalAmount(value.to_string()))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                Ok(DecimalAmount(value.to_string()))
            }

            fn visit_f64<E: de::Error>(self, _value: f64) -> Result<Self::Value, E> {
                Err(E::custom(
                    "fractional or oversized amounts must be sent as strings, e.g. \"10.5\"",
                ))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

impl Serialize for DecimalAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
