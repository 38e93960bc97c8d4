//! Decimal-string parsing and the two non-monetary scaled quantities used on
//! quote lines: [`Quantity`] (1e-3) and [`Percent`] (1e-6 of a percent).
//!
//! Inputs are parsed from text so no float rounding is introduced at the
//! boundary. Both `.` and `,` are accepted as the decimal separator.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::fixedpoint::write_scaled;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecimalError {
    Empty,
    Malformed(String),
    /// More fractional digits than the target scale can hold exactly.
    TooPrecise { value: String, max_digits: u32 },
    Overflow(String),
}

impl fmt::Display for DecimalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecimalError::Empty => write!(f, "empty decimal"),
            DecimalError::Malformed(v) => write!(f, "invalid decimal: {v:?}"),
            DecimalError::TooPrecise { value, max_digits } => write!(
                f,
                "decimal {value:?} has more than {max_digits} fractional digits"
            ),
            DecimalError::Overflow(v) => write!(f, "decimal out of range: {v:?}"),
        }
    }
}

impl std::error::Error for DecimalError {}

/// Parse a decimal string into an integer at `10^-scale`.
///
/// Accepts an optional leading sign, `.` or `,` as separator and surrounding
/// whitespace. Exponents, thousands separators and non-finite values are
/// rejected.
pub fn parse_scaled(input: &str, scale: u32) -> Result<i64, DecimalError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DecimalError::Empty);
    }

    let (negative, body) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let normalized = body.replace(',', ".");
    let mut parts = normalized.split('.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next().unwrap_or("");
    if parts.next().is_some() || (int_part.is_empty() && frac_part.is_empty()) {
        return Err(DecimalError::Malformed(input.to_string()));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(DecimalError::Malformed(input.to_string()));
    }

    let frac_trimmed = frac_part.trim_end_matches('0');
    if frac_trimmed.len() > scale as usize {
        return Err(DecimalError::TooPrecise {
            value: input.to_string(),
            max_digits: scale,
        });
    }

    let overflow = || DecimalError::Overflow(input.to_string());
    let int_val: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| overflow())?
    };
    let frac_val: i64 = if frac_trimmed.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac_trimmed, width = scale as usize);
        padded.parse().map_err(|_| overflow())?
    };

    let magnitude = int_val
        .checked_mul(10_i64.pow(scale))
        .and_then(|v| v.checked_add(frac_val))
        .ok_or_else(overflow)?;

    Ok(if negative { -magnitude } else { magnitude })
}

// ---------------------------------------------------------------------------
// Quantity
// ---------------------------------------------------------------------------

/// Line quantity at 1e-3 scale (`Quantity::new(2_000)` is two units).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(i64);

impl Quantity {
    pub const SCALE: i64 = 1_000;
    pub const ZERO: Quantity = Quantity(0);
    pub const ONE: Quantity = Quantity(Self::SCALE);

    #[inline]
    pub const fn new(raw_millis: i64) -> Self {
        Quantity(raw_millis)
    }

    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * Self::SCALE)
    }

    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    pub fn parse(s: &str) -> Result<Quantity, DecimalError> {
        parse_scaled(s, 3).map(Quantity)
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_scaled(f, self.0, 3, 0)
    }
}

// ---------------------------------------------------------------------------
// Percent
// ---------------------------------------------------------------------------

/// A percentage at 1e-6 scale: `Percent::from_whole(19)` is 19 %.
///
/// Values are percentages, not fractions; normalising by 100 happens inside
/// the totals arithmetic.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percent(i64);

impl Percent {
    pub const SCALE: i64 = 1_000_000;
    pub const ZERO: Percent = Percent(0);
    pub const HUNDRED: Percent = Percent(100 * Self::SCALE);

    #[inline]
    pub const fn new(raw: i64) -> Self {
        Percent(raw)
    }

    #[inline]
    pub const fn from_whole(pct: i64) -> Self {
        Percent(pct * Self::SCALE)
    }

    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    pub fn parse(s: &str) -> Result<Percent, DecimalError> {
        parse_scaled(s, 6).map(Percent)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_scaled(f, self.0, 6, 0)
    }
}

macro_rules! decimal_string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                <$ty>::parse(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

decimal_string_serde!(Quantity);
decimal_string_serde!(Percent);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scaled_basic() {
        assert_eq!(parse_scaled("0", 6).unwrap(), 0);
        assert_eq!(parse_scaled("1", 6).unwrap(), 1_000_000);
        assert_eq!(parse_scaled("1.23", 6).unwrap(), 1_230_000);
        assert_eq!(parse_scaled("001.2300", 6).unwrap(), 1_230_000);
        assert_eq!(parse_scaled("+5.000001", 6).unwrap(), 5_000_001);
        assert_eq!(parse_scaled("-2,5", 3).unwrap(), -2_500);
        assert_eq!(parse_scaled(".5", 3).unwrap(), 500);
        assert_eq!(parse_scaled("7.", 3).unwrap(), 7_000);
    }

    #[test]
    fn parse_scaled_rejects_rounding_ambiguity() {
        assert!(matches!(
            parse_scaled("1.0001", 3),
            Err(DecimalError::TooPrecise { .. })
        ));
        // Trailing zeros past the scale are harmless.
        assert_eq!(parse_scaled("1.5000000", 3).unwrap(), 1_500);
    }

    #[test]
    fn parse_scaled_rejects_garbage() {
        assert_eq!(parse_scaled("   ", 3), Err(DecimalError::Empty));
        assert!(parse_scaled("abc", 3).is_err());
        assert!(parse_scaled("1e5", 3).is_err());
        assert!(parse_scaled("1.2.3", 3).is_err());
        assert!(parse_scaled("NaN", 3).is_err());
        assert!(parse_scaled("-", 3).is_err());
        assert!(parse_scaled("99999999999999999999", 3).is_err());
    }

    #[test]
    fn quantity_holds_three_fractional_digits() {
        assert_eq!(Quantity::parse("1,234").unwrap(), Quantity::new(1_234));
        assert_eq!(Quantity::parse("1.2340").unwrap(), Quantity::new(1_234));
        assert_eq!(
            Quantity::parse("1.2345"),
            Err(DecimalError::TooPrecise {
                value: "1.2345".to_string(),
                max_digits: 3
            })
        );
    }

    #[test]
    fn quantity_display_drops_trailing_zeros() {
        assert_eq!(Quantity::from_units(2).to_string(), "2");
        assert_eq!(Quantity::new(2_500).to_string(), "2.5");
    }

    #[test]
    fn percent_display_and_parse() {
        assert_eq!(Percent::from_whole(19).to_string(), "19");
        assert_eq!(Percent::parse("7,5").unwrap(), Percent::new(7_500_000));
    }
}
