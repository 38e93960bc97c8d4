//! qdk-numbering
//!
//! Sequence keys and the textual reference formats built on top of them.
//!
//! The formats are a persisted-state contract:
//! - year-scoped: `PREFIX + YY + zero-pad(seq, 5)` (`DV2500042`)
//! - plain: `PREFIX + seq` (`ART-17`)
//!
//! Issuing the integer is a storage concern; everything here is pure.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub const SEQ_WIDTH: usize = 5;

/// Whether quote numbers restart every calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteScope {
    #[default]
    Yearly,
    Global,
}

/// Logical namespace for one counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceKey(String);

impl SequenceKey {
    pub fn quote(scope: QuoteScope, year: i32) -> Self {
        match scope {
            QuoteScope::Yearly => SequenceKey(format!("quote:{year}")),
            QuoteScope::Global => SequenceKey("quote".to_string()),
        }
    }

    pub fn request(year: i32) -> Self {
        SequenceKey(format!("request:{year}"))
    }

    pub fn article() -> Self {
        SequenceKey("article".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumberFormatError {
    WrongPrefix { expected: String, got: String },
    MissingYear(String),
    BadSequence(String),
}

impl fmt::Display for NumberFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberFormatError::WrongPrefix { expected, got } => {
                write!(f, "reference {got:?} does not start with {expected:?}")
            }
            NumberFormatError::MissingYear(s) => write!(f, "reference {s:?} has no year"),
            NumberFormatError::BadSequence(s) => {
                write!(f, "reference {s:?} has no valid sequence")
            }
        }
    }
}

impl std::error::Error for NumberFormatError {}

/// `PREFIX + YY + zero-pad(seq, 5)`. Sequences past 99999 widen.
pub fn format_yearly(prefix: &str, year: i32, seq: u64) -> String {
    format!(
        "{prefix}{:02}{seq:0width$}",
        year.rem_euclid(100),
        width = SEQ_WIDTH
    )
}

/// `PREFIX + seq`, no padding.
pub fn format_plain(prefix: &str, seq: u64) -> String {
    format!("{prefix}{seq}")
}

/// Inverse of [`format_yearly`]. Two-digit years map into 2000..=2099.
pub fn parse_yearly(prefix: &str, reference: &str) -> Result<(i32, u64), NumberFormatError> {
    let rest = reference
        .strip_prefix(prefix)
        .ok_or_else(|| NumberFormatError::WrongPrefix {
            expected: prefix.to_string(),
            got: reference.to_string(),
        })?;
    let (yy, seq) = match (rest.get(..2), rest.get(2..)) {
        (Some(yy), Some(seq)) if yy.bytes().all(|b| b.is_ascii_digit()) => (yy, seq),
        _ => return Err(NumberFormatError::MissingYear(reference.to_string())),
    };
    if seq.len() < SEQ_WIDTH || !seq.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NumberFormatError::BadSequence(reference.to_string()));
    }
    let yy: i32 = yy
        .parse()
        .map_err(|_| NumberFormatError::MissingYear(reference.to_string()))?;
    let seq: u64 = seq
        .parse()
        .map_err(|_| NumberFormatError::BadSequence(reference.to_string()))?;
    Ok((2000 + yy, seq))
}

/// Inverse of [`format_plain`].
pub fn parse_plain(prefix: &str, reference: &str) -> Result<u64, NumberFormatError> {
    let rest = reference
        .strip_prefix(prefix)
        .ok_or_else(|| NumberFormatError::WrongPrefix {
            expected: prefix.to_string(),
            got: reference.to_string(),
        })?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NumberFormatError::BadSequence(reference.to_string()));
    }
    rest.parse()
        .map_err(|_| NumberFormatError::BadSequence(reference.to_string()))
}

// ---------------------------------------------------------------------------
// Locale-aware ordering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CharClass {
    Other,
    Digit,
    Letter,
}

fn class_of(c: char) -> CharClass {
    if c.is_numeric() {
        CharClass::Digit
    } else if c.is_alphabetic() {
        CharClass::Letter
    } else {
        CharClass::Other
    }
}

/// Primary collation key: accents stripped, case folded.
fn primary_key(s: &str) -> Vec<(CharClass, char)> {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| (class_of(c), c))
        .collect()
}

/// Compare reference numbers the way a French-locale UI lists them.
///
/// Accents and case are ignored first; punctuation sorts before digits, and
/// digits before letters. Ties are broken by lowercase-first, then by the raw
/// string so the order is total.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    primary_key(a)
        .cmp(&primary_key(b))
        .then_with(|| case_key(a).cmp(&case_key(b)))
        .then_with(|| a.cmp(b))
}

fn case_key(s: &str) -> Vec<bool> {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(char::is_uppercase)
        .collect()
}
