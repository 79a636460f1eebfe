//! Monetary helpers.
//!
//! Amounts are carried as `i64` cents. The catalog API still exchanges unit
//! prices as decimal numbers, so conversions happen at the edges.

/// Decimal places kept for monetary values.
pub const MONEY_DECIMALS: u32 = 2;

/// Round a fractional number of cents to whole cents, half away from zero.
///
/// The value is first snapped to a millionth of a cent so that products like
/// `0.1 * 3` land on the intended side of a `.5` boundary.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn round_cents(value: f64) -> i64 {
    let snapped = (value * 1_000_000.0).round() / 1_000_000.0;
    snapped.round() as i64
}

/// Convert a decimal amount (e.g. `12.34`) into cents.
#[must_use]
pub fn cents_from_amount(amount: f64) -> i64 {
    round_cents(amount * 100.0)
}

/// Convert cents back into a decimal amount.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn amount_from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Render cents with exactly two decimals (`10890` → `"108.90"`).
#[must_use]
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
