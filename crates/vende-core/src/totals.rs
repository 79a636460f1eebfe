//! Invoice line and invoice totals arithmetic.
//!
//! Each line is priced in a fixed order, rounding to whole cents at every
//! step, and the invoice totals are plain sums of the rounded line values:
//!
//! 1. `gross = quantity * unit_price`
//! 2. `subtotal = round(gross - gross * discount% / 100)`
//! 3. `tax = round(subtotal * tax% / 100)`
//! 4. `total = subtotal + tax`
//!
//! Stored invoices were priced in this order; summing unrounded values
//! instead moves multi-line invoices by a cent.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::ProductId;
use crate::money::round_cents;
use crate::product::{Product, TaxType, UnitType};

/// Highest accepted discount percentage.
pub const MAX_DISCOUNT_PERCENT: f64 = 100.0;

/// One billed line before pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemInput {
    /// Catalog product, if the line was seeded from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    /// Product or service name printed on the invoice.
    #[serde(default)]
    pub product_name: String,
    /// Optional extra description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Billed quantity (may be fractional, e.g. hours).
    pub quantity: f64,
    /// Unit price in cents before tax and discount.
    pub unit_price_cents: i64,
    /// Unit of measure.
    #[serde(default)]
    pub unit_type: UnitType,
    /// Tax regime.
    #[serde(default)]
    pub tax_type: TaxType,
    /// Tax rate percentage (21 = 21%).
    pub tax_rate_percent: f64,
    /// Discount percentage in `[0, 100]`; absent means no discount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<f64>,
}

impl LineItemInput {
    /// Create a bare line with no product reference and no discount.
    #[must_use]
    pub fn new(quantity: f64, unit_price_cents: i64, tax_rate_percent: f64) -> Self {
        Self {
            product_id: None,
            product_name: String::new(),
            description: None,
            quantity,
            unit_price_cents,
            unit_type: UnitType::default(),
            tax_type: TaxType::default(),
            tax_rate_percent,
            discount_percent: None,
        }
    }

    /// Seed a line from a catalog product.
    #[must_use]
    pub fn from_product(product: &Product, quantity: f64) -> Self {
        Self {
            product_id: Some(product.id.clone()),
            product_name: product.name.clone(),
            description: product.description.clone(),
            quantity,
            unit_price_cents: product.unit_price_cents(),
            unit_type: product.unit_type,
            tax_type: product.tax_type,
            tax_rate_percent: product.tax_rate,
            discount_percent: None,
        }
    }

    /// Set the discount percentage.
    #[must_use]
    pub fn with_discount(mut self, percent: f64) -> Self {
        self.discount_percent = Some(percent);
        self
    }

    /// Set the printed name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = name.into();
        self
    }

    /// Effective discount percentage.
    #[must_use]
    pub fn discount(&self) -> f64 {
        self.discount_percent.unwrap_or(0.0)
    }

    /// Check the numeric inputs.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if !self.quantity.is_finite() || self.quantity < 0.0 {
            return Err(CoreError::validation(
                "quantity",
                "must be a non-negative number",
            ));
        }
        if self.unit_price_cents < 0 {
            return Err(CoreError::validation("unit_price", "must not be negative"));
        }
        let discount = self.discount();
        if !discount.is_finite() || !(0.0..=MAX_DISCOUNT_PERCENT).contains(&discount) {
            return Err(CoreError::validation(
                "discount_percent",
                "must be between 0 and 100",
            ));
        }
        if !self.tax_rate_percent.is_finite() || self.tax_rate_percent < 0.0 {
            return Err(CoreError::validation(
                "tax_rate_percent",
                "must be a non-negative number",
            ));
        }
        Ok(())
    }
}

/// A line with its derived amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedLineItem {
    /// The line inputs.
    #[serde(flatten)]
    pub input: LineItemInput,
    /// Amount after discount, before tax, in cents.
    pub subtotal_cents: i64,
    /// Tax on the subtotal, in cents.
    pub tax_cents: i64,
    /// Subtotal plus tax, in cents.
    pub total_cents: i64,
    /// Discount granted on the line, in cents.
    pub discount_cents: i64,
}

/// Aggregate amounts of an invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    /// Sum of line subtotals.
    pub subtotal_cents: i64,
    /// Sum of line taxes.
    pub total_tax_cents: i64,
    /// Sum of line discounts.
    pub total_discount_cents: i64,
    /// Sum of line totals.
    pub total_cents: i64,
}

impl InvoiceTotals {
    /// Sum already-priced lines. No further rounding is applied.
    #[must_use]
    pub fn from_lines(lines: &[PricedLineItem]) -> Self {
        lines.iter().fold(Self::default(), |acc, line| Self {
            subtotal_cents: acc.subtotal_cents + line.subtotal_cents,
            total_tax_cents: acc.total_tax_cents + line.tax_cents,
            total_discount_cents: acc.total_discount_cents + line.discount_cents,
            total_cents: acc.total_cents + line.total_cents,
        })
    }
}

/// Price a single line.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] if the line inputs are out of range.
#[allow(clippy::cast_precision_loss)]
pub fn price_line(input: &LineItemInput) -> Result<PricedLineItem> {
    input.validate()?;

    let gross = input.quantity * input.unit_price_cents as f64;
    let discount = gross * input.discount() / 100.0;
    let subtotal_cents = round_cents(gross - discount);
    let tax_cents = round_cents(subtotal_cents as f64 * input.tax_rate_percent / 100.0);

    Ok(PricedLineItem {
        input: input.clone(),
        subtotal_cents,
        tax_cents,
        total_cents: subtotal_cents + tax_cents,
        discount_cents: round_cents(discount),
    })
}

/// Price every line. All lines are validated before any is priced.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] for the first invalid line, with the
/// field prefixed by its position (`line_items[2].quantity`).
pub fn price_lines(inputs: &[LineItemInput]) -> Result<Vec<PricedLineItem>> {
    for (index, input) in inputs.iter().enumerate() {
        input.validate().map_err(|err| match err {
            CoreError::Validation { field, message } => CoreError::Validation {
                field: format!("line_items[{index}].{field}"),
                message,
            },
            other => other,
        })?;
    }
    inputs.iter().map(price_line).collect()
}

/// Price every line and sum the invoice totals.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] if any line is invalid.
pub fn calculate(inputs: &[LineItemInput]) -> Result<(Vec<PricedLineItem>, InvoiceTotals)> {
    let lines = price_lines(inputs)?;
    let totals = InvoiceTotals::from_lines(&lines);
    Ok((lines, totals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::format_cents;

    fn sample_line() -> LineItemInput {
        LineItemInput::new(2.0, 5000, 21.0).with_discount(10.0)
    }

    #[test]
    fn prices_discounted_taxed_line() {
        let line = price_line(&sample_line()).unwrap();

        // 2 * 50.00 = 100.00, -10% = 90.00, +21% = 18.90
        assert_eq!(format_cents(line.subtotal_cents), "90.00");
        assert_eq!(format_cents(line.tax_cents), "18.90");
        assert_eq!(format_cents(line.total_cents), "108.90");
        assert_eq!(format_cents(line.discount_cents), "10.00");
    }

    #[test]
    fn sums_two_identical_lines() {
        let (lines, totals) = calculate(&[sample_line(), sample_line()]).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(format_cents(totals.subtotal_cents), "180.00");
        assert_eq!(format_cents(totals.total_tax_cents), "37.80");
        assert_eq!(format_cents(totals.total_cents), "217.80");
        assert_eq!(format_cents(totals.total_discount_cents), "20.00");
    }

    #[test]
    fn no_lines_means_zero_totals() {
        let (lines, totals) = calculate(&[]).unwrap();
        assert!(lines.is_empty());
        assert_eq!(totals, InvoiceTotals::default());
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let bad = LineItemInput::new(-1.0, 5000, 21.0);
        let err = calculate(&[sample_line(), bad]).unwrap_err();

        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.field(), Some("line_items[1].quantity"));
    }

    #[test]
    fn out_of_range_inputs_are_rejected() {
        let cases = [
            (LineItemInput::new(1.0, -1, 21.0), "unit_price"),
            (LineItemInput::new(1.0, 100, 21.0).with_discount(100.5), "discount_percent"),
            (LineItemInput::new(1.0, 100, 21.0).with_discount(-1.0), "discount_percent"),
            (LineItemInput::new(1.0, 100, -4.0), "tax_rate_percent"),
            (LineItemInput::new(f64::NAN, 100, 21.0), "quantity"),
        ];
        for (input, field) in cases {
            assert_eq!(price_line(&input).unwrap_err().field(), Some(field));
        }
    }

    #[test]
    fn missing_discount_defaults_to_zero() {
        let line = price_line(&LineItemInput::new(3.0, 1000, 10.0)).unwrap();
        assert_eq!(line.subtotal_cents, 3000);
        assert_eq!(line.tax_cents, 300);
        assert_eq!(line.discount_cents, 0);
    }

    #[test]
    fn full_discount_zeroes_line() {
        let line = price_line(&LineItemInput::new(4.0, 2500, 21.0).with_discount(100.0)).unwrap();
        assert_eq!(line.subtotal_cents, 0);
        assert_eq!(line.total_cents, 0);
        assert_eq!(line.discount_cents, 10_000);
    }

    #[test]
    fn fractional_quantities_round_per_line() {
        // 1.5 hours at 33.33 = 49.995 -> 50.00, tax 21% = 10.50
        let line = price_line(&LineItemInput::new(1.5, 3333, 21.0)).unwrap();
        assert_eq!(line.subtotal_cents, 5000);
        assert_eq!(line.tax_cents, 1050);
    }

    #[test]
    fn rounding_happens_before_summing() {
        // Each half-cent line rounds up on its own: 3 * 1 cent, not round(1.5) = 2.
        let half_cent = LineItemInput::new(0.5, 1, 0.0);
        let (_, totals) = calculate(&[half_cent.clone(), half_cent.clone(), half_cent]).unwrap();
        assert_eq!(totals.subtotal_cents, 3);
    }

    #[test]
    fn tax_is_computed_on_rounded_subtotal() {
        // gross 3 * 3.33 = 9.99, -15% = 8.4915 -> 8.49, tax 21% of 8.49 = 1.7829 -> 1.78
        let line = price_line(&LineItemInput::new(3.0, 333, 21.0).with_discount(15.0)).unwrap();
        assert_eq!(line.subtotal_cents, 849);
        assert_eq!(line.tax_cents, 178);
        assert_eq!(line.total_cents, 1027);
        assert_eq!(line.discount_cents, 150);
    }

    #[test]
    fn priced_line_serializes_flat() {
        let line = price_line(&sample_line().with_name("Widget")).unwrap();
        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(value["product_name"], "Widget");
        assert_eq!(value["subtotal_cents"], 9000);
        assert_eq!(value["quantity"], 2.0);
    }
}
