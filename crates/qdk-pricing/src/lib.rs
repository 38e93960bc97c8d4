//! qdk-pricing
//!
//! Exact decimal arithmetic for quote lines and quote totals.
//!
//! Pure logic: no IO, no clocks, no randomness. Every amount is a scaled
//! integer; floats never appear.

mod decimal;
mod fixedpoint;
mod totals;

pub use decimal::{parse_scaled, DecimalError, Percent, Quantity};
pub use fixedpoint::{Micros, MICROS_PER_MILLI, MICROS_SCALE};
pub use totals::{
    compute_totals, line_total_ht, percent_of, QuoteTotals, TaxedAmount, TotalsError,
    STAMP_DUTY, SURCHARGE_PCT,
};
