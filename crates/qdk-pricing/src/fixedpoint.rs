//! Fixed-point money type.
//!
//! # Scale
//!
//! All money amounts use a 1e-6 (micros) fixed-point representation stored
//! as `i64`. 1 currency unit = 1_000_000 Micros. Quote amounts are rounded to
//! three decimals (a multiple of 1_000 micros) at every aggregation step; the
//! extra precision only exists so that unit prices entered with more digits
//! survive the multiplication before that rounding happens.
//!
//! `Micros` wraps the raw `i64` so the type system prevents:
//! - Implicit construction from raw `i64` (no `From<i64>` impl).
//! - Mixing `Micros` with quantities or percentages in arithmetic.
//!
//! # Serialization
//!
//! Amounts cross the JSON boundary as decimal strings (`"180.000"`), never as
//! floats. At least three fractional digits are always written; digits past
//! the third are written only when non-zero.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::decimal::{parse_scaled, DecimalError};

/// Micros per currency unit.
pub const MICROS_SCALE: i64 = 1_000_000;

/// Micros per 1e-3 currency unit (the quote rounding step).
pub const MICROS_PER_MILLI: i64 = 1_000;

// ---------------------------------------------------------------------------
// Micros newtype
// ---------------------------------------------------------------------------

/// A fixed-point monetary amount at 1e-6 scale (micros).
///
/// Use [`Micros::new`] for explicit construction and [`Micros::raw`] to get
/// the integer back when crossing a storage boundary.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Micros(i64);

impl Micros {
    /// Zero monetary amount.
    pub const ZERO: Micros = Micros(0);

    /// Construct a `Micros` from a raw `i64`.
    #[inline]
    pub const fn new(raw: i64) -> Self {
        Micros(raw)
    }

    /// Construct from a whole number of currency units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Micros(units * MICROS_SCALE)
    }

    /// Extract the underlying raw `i64`.
    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Parse a decimal string (`"12.5"`, `"12,5"`) into micros.
    ///
    /// More than six fractional digits is an error rather than a silent
    /// rounding.
    pub fn parse(s: &str) -> Result<Micros, DecimalError> {
        parse_scaled(s, 6).map(Micros)
    }

    #[inline]
    pub fn checked_add(self, rhs: Micros) -> Option<Micros> {
        self.0.checked_add(rhs.0).map(Micros)
    }

    /// `true` if this amount is non-negative.
    #[inline]
    pub fn is_non_negative(self) -> bool {
        self.0 >= 0
    }

    /// Round to three decimals, half away from zero.
    #[inline]
    pub fn round3(self) -> Micros {
        let millis = div_round_half_away(self.0 as i128, MICROS_PER_MILLI as i128);
        // |millis * 1000| <= |self.0| + 500, which only overflows within 500 of i64::MAX.
        Micros((millis as i64).saturating_mul(MICROS_PER_MILLI))
    }

    /// `true` when the amount carries no digits past the third decimal.
    #[inline]
    pub fn is_rounded3(self) -> bool {
        self.0 % MICROS_PER_MILLI == 0
    }
}

/// Integer division rounding half away from zero. `den` must be positive.
pub(crate) fn div_round_half_away(num: i128, den: i128) -> i128 {
    debug_assert!(den > 0);
    let q = num / den;
    let r = num % den;
    if r.abs() * 2 >= den {
        if num < 0 {
            q - 1
        } else {
            q + 1
        }
    } else {
        q
    }
}

// ---------------------------------------------------------------------------
// Arithmetic operators (closed over Micros)
// ---------------------------------------------------------------------------

impl Add for Micros {
    type Output = Micros;
    #[inline]
    fn add(self, rhs: Micros) -> Micros {
        Micros(self.0 + rhs.0)
    }
}

impl Sub for Micros {
    type Output = Micros;
    #[inline]
    fn sub(self, rhs: Micros) -> Micros {
        Micros(self.0 - rhs.0)
    }
}

impl Neg for Micros {
    type Output = Micros;
    #[inline]
    fn neg(self) -> Micros {
        Micros(-self.0)
    }
}

impl AddAssign for Micros {
    #[inline]
    fn add_assign(&mut self, rhs: Micros) {
        self.0 += rhs.0;
    }
}

impl Sum for Micros {
    fn sum<I: Iterator<Item = Micros>>(iter: I) -> Micros {
        iter.fold(Micros::ZERO, |acc, m| acc + m)
    }
}

// ---------------------------------------------------------------------------
// Display / serde
// ---------------------------------------------------------------------------

impl fmt::Display for Micros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_scaled(f, self.0, 6, 3)
    }
}

impl Serialize for Micros {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Micros {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Micros::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Write a scaled integer as a decimal with `min_frac` to `scale` fractional
/// digits (trailing zeros past `min_frac` are dropped).
pub(crate) fn write_scaled(
    f: &mut fmt::Formatter<'_>,
    raw: i64,
    scale: u32,
    min_frac: usize,
) -> fmt::Result {
    let unit = 10_u64.pow(scale);
    let abs = raw.unsigned_abs();
    let int_part = abs / unit;
    let frac = format!("{:0width$}", abs % unit, width = scale as usize);
    let trimmed = frac.trim_end_matches('0');
    let frac = if trimmed.len() < min_frac {
        &frac[..min_frac]
    } else {
        trimmed
    };
    let sign = if raw < 0 { "-" } else { "" };
    if frac.is_empty() {
        write!(f, "{sign}{int_part}")
    } else {
        write!(f, "{sign}{int_part}.{frac}")
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_additive_identity() {
        let a = Micros::new(42_000_000);
        assert_eq!(a + Micros::ZERO, a);
        assert_eq!(Micros::ZERO + a, a);
    }

    #[test]
    fn round3_half_away_from_zero() {
        assert_eq!(Micros::new(1_000_500).round3(), Micros::new(1_001_000));
        assert_eq!(Micros::new(1_000_499).round3(), Micros::new(1_000_000));
        assert_eq!(Micros::new(-1_000_500).round3(), Micros::new(-1_001_000));
        assert_eq!(Micros::new(-1_000_499).round3(), Micros::new(-1_000_000));
    }

    #[test]
    fn round3_is_idempotent() {
        let m = Micros::new(34_200_000);
        assert!(m.is_rounded3());
        assert_eq!(m.round3(), m);
    }

    #[test]
    fn display_keeps_three_decimals_minimum() {
        assert_eq!(Micros::from_units(180).to_string(), "180.000");
        assert_eq!(Micros::new(1_800_000).to_string(), "1.800");
        assert_eq!(Micros::new(1_234_567).to_string(), "1.234567");
        assert_eq!(Micros::new(-500_000).to_string(), "-0.500");
    }

    #[test]
    fn parse_accepts_comma_separator() {
        assert_eq!(Micros::parse("12,5").unwrap(), Micros::new(12_500_000));
        assert_eq!(Micros::parse(" 100 ").unwrap(), Micros::from_units(100));
    }

    #[test]
    fn serde_uses_decimal_strings() {
        let m = Micros::new(216_000_000);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "\"216.000\"");
        let back: Micros = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn sum_over_iterator() {
        let total: Micros = [Micros::from_units(1), Micros::from_units(2)]
            .into_iter()
            .sum();
        assert_eq!(total, Micros::from_units(3));
    }
}
