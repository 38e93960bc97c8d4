//! Quote line and quote totals.
//!
//! Every aggregate is rounded to three decimals at the step where it is
//! produced, not only at the end:
//!
//! ```text
//! line_total_ht = round3(qty * unit_price_ht * (1 - discount/100))
//! total_ht      = round3(sum(line_total_ht))
//! net_ht        = total_ht
//! vat           = round3(sum(line_total_ht * tax/100))
//! surcharge     = round3(net_ht * surcharge_pct/100)
//! stamp_duty    = 0
//! gross_ttc     = round3(net_ht + vat + surcharge + stamp_duty)
//! ```
//!
//! All products are formed in `i128` on the raw scaled integers so the only
//! rounding is the explicit `round3`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decimal::{Percent, Quantity};
use crate::fixedpoint::{div_round_half_away, Micros, MICROS_PER_MILLI};

/// Fixed levy applied to the net total before tax.
pub const SURCHARGE_PCT: Percent = Percent::from_whole(1);

/// Stamp duty is fixed at zero; kept as an explicit field so a policy change
/// only touches this constant.
pub const STAMP_DUTY: Micros = Micros::ZERO;

// Denominator for percent * amount: Percent::SCALE * 100.
const PCT_DENOM: i128 = (Percent::SCALE as i128) * 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TotalsError {
    /// Discount outside `[0, 100)`.
    DiscountOutOfRange(Percent),
    NegativeTax(Percent),
    NegativePrice(Micros),
    NegativeQuantity(Quantity),
    Overflow,
}

impl fmt::Display for TotalsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TotalsError::DiscountOutOfRange(p) => {
                write!(f, "discount {p}% outside [0, 100)")
            }
            TotalsError::NegativeTax(p) => write!(f, "negative tax rate {p}%"),
            TotalsError::NegativePrice(m) => write!(f, "negative unit price {m}"),
            TotalsError::NegativeQuantity(q) => write!(f, "negative quantity {q}"),
            TotalsError::Overflow => write!(f, "amount overflow"),
        }
    }
}

impl std::error::Error for TotalsError {}

/// Totals block of a quote. A pure function of its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub total_ht: Micros,
    pub net_ht: Micros,
    pub vat: Micros,
    pub surcharge_pct: Percent,
    pub surcharge: Micros,
    pub stamp_duty: Micros,
    pub gross_ttc: Micros,
}

/// The two per-line inputs the quote totals depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxedAmount {
    pub total_ht: Micros,
    pub tax_pct: Percent,
}

/// Compute `round3(qty * unit_price * (1 - discount/100))`.
pub fn line_total_ht(
    qty: Quantity,
    unit_price_ht: Micros,
    discount: Percent,
) -> Result<Micros, TotalsError> {
    if qty.is_negative() {
        return Err(TotalsError::NegativeQuantity(qty));
    }
    if !unit_price_ht.is_non_negative() {
        return Err(TotalsError::NegativePrice(unit_price_ht));
    }
    if discount < Percent::ZERO || discount >= Percent::HUNDRED {
        return Err(TotalsError::DiscountOutOfRange(discount));
    }

    // micros * millis-of-qty * pct-scale  ->  millis of currency
    let num = (unit_price_ht.raw() as i128)
        .checked_mul(qty.raw() as i128)
        .and_then(|v| v.checked_mul((Percent::HUNDRED.raw() - discount.raw()) as i128))
        .ok_or(TotalsError::Overflow)?;
    let den = (Quantity::SCALE as i128) * PCT_DENOM * (MICROS_PER_MILLI as i128);
    millis_to_micros(div_round_half_away(num, den))
}

/// Aggregate line amounts into the quote totals block.
pub fn compute_totals(lines: &[TaxedAmount]) -> Result<QuoteTotals, TotalsError> {
    let mut sum_ht: i128 = 0;
    let mut sum_vat_num: i128 = 0;
    for line in lines {
        if line.tax_pct < Percent::ZERO {
            return Err(TotalsError::NegativeTax(line.tax_pct));
        }
        sum_ht += line.total_ht.raw() as i128;
        sum_vat_num = (line.total_ht.raw() as i128)
            .checked_mul(line.tax_pct.raw() as i128)
            .and_then(|v| sum_vat_num.checked_add(v))
            .ok_or(TotalsError::Overflow)?;
    }

    let total_ht = millis_to_micros(div_round_half_away(sum_ht, MICROS_PER_MILLI as i128))?;
    let net_ht = total_ht;
    let vat = millis_to_micros(div_round_half_away(
        sum_vat_num,
        PCT_DENOM * MICROS_PER_MILLI as i128,
    ))?;
    let surcharge = percent_of(net_ht, SURCHARGE_PCT)?;
    let gross_ttc = net_ht
        .checked_add(vat)
        .and_then(|v| v.checked_add(surcharge))
        .and_then(|v| v.checked_add(STAMP_DUTY))
        .ok_or(TotalsError::Overflow)?
        .round3();

    Ok(QuoteTotals {
        total_ht,
        net_ht,
        vat,
        surcharge_pct: SURCHARGE_PCT,
        surcharge,
        stamp_duty: STAMP_DUTY,
        gross_ttc,
    })
}

/// `round3(amount * pct / 100)`.
pub fn percent_of(amount: Micros, pct: Percent) -> Result<Micros, TotalsError> {
    let num = (amount.raw() as i128) * (pct.raw() as i128);
    millis_to_micros(div_round_half_away(
        num,
        PCT_DENOM * MICROS_PER_MILLI as i128,
    ))
}

fn millis_to_micros(millis: i128) -> Result<Micros, TotalsError> {
    millis
        .checked_mul(MICROS_PER_MILLI as i128)
        .and_then(|v| i64::try_from(v).ok())
        .map(Micros::new)
        .ok_or(TotalsError::Overflow)
}
