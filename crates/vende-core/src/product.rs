//! Product catalog types.
//!
//! These mirror the products service wire format (camelCase fields,
//! SCREAMING_SNAKE_CASE enum values). Unit prices travel as decimal numbers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::{CompanyId, ProductId};
use crate::money::cents_from_amount;

// ============================================================================
// Validation limits
// ============================================================================

/// Minimum product name length (characters).
pub const PRODUCT_NAME_MIN_LEN: usize = 2;

/// Maximum product name length (characters).
pub const PRODUCT_NAME_MAX_LEN: usize = 255;

/// Maximum product description length (characters).
pub const PRODUCT_DESCRIPTION_MAX_LEN: usize = 1000;

/// Maximum product code length (characters).
pub const PRODUCT_CODE_MAX_LEN: usize = 50;

/// Highest accepted unit price.
pub const UNIT_PRICE_MAX: f64 = 999_999.99;

/// Highest accepted tax rate percentage.
pub const TAX_RATE_MAX: f64 = 100.0;

/// Default currency for new products.
pub const DEFAULT_CURRENCY: &str = "USD";

/// A product or service in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Optional long description.
    #[serde(default)]
    pub description: Option<String>,
    /// Unit price before tax.
    pub unit_price: f64,
    /// ISO 4217 currency code.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Owning company.
    pub company_id: CompanyId,
    /// Lifecycle status.
    #[serde(default)]
    pub status: ProductStatus,
    /// Catalog category.
    #[serde(default)]
    pub category: ProductCategory,
    /// Unit of measure.
    #[serde(default)]
    pub unit_type: UnitType,
    /// Applicable tax.
    #[serde(default)]
    pub tax_type: TaxType,
    /// Tax rate percentage (21 = 21%).
    pub tax_rate: f64,
    /// Internal product code.
    pub code: String,
    /// Barcode for physical goods.
    #[serde(default)]
    pub barcode: Option<String>,
    /// Units in stock.
    #[serde(default)]
    pub stock_quantity: Option<i64>,
    /// Stock alert threshold.
    #[serde(default)]
    pub minimum_stock: Option<i64>,
    /// Whether stock is tracked for this product.
    #[serde(default)]
    pub track_stock: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Unit price in cents.
    #[must_use]
    pub fn unit_price_cents(&self) -> i64 {
        cents_from_amount(self.unit_price)
    }

    /// Whether tracked stock has fallen to or below the minimum.
    #[must_use]
    pub fn is_low_stock(&self) -> bool {
        if !self.track_stock {
            return false;
        }
        matches!(
            (self.stock_quantity, self.minimum_stock),
            (Some(stock), Some(minimum)) if stock <= minimum
        )
    }
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

/// Product lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    /// Created but not yet offered.
    #[default]
    Draft,
    /// Available for invoicing.
    Active,
    /// Temporarily unavailable.
    Inactive,
    /// No longer sold.
    Discontinued,
}

impl ProductStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Discontinued => "DISCONTINUED",
        }
    }
}

/// Product category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductCategory {
    /// Physical product.
    Product,
    /// Professional service.
    Service,
    /// Digital service.
    DigitalService,
    /// Consultation.
    Consultation,
    /// Rental.
    Rental,
    /// Anything else.
    #[default]
    Other,
}

/// Tax regime applied to a product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaxType {
    /// General VAT (21%).
    #[default]
    IvaGeneral,
    /// Reduced VAT (10%).
    IvaReduced,
    /// Super-reduced VAT (4%).
    IvaSuperReduced,
    /// VAT exempt (0%).
    IvaExempt,
    /// Special tax with a product-specific rate.
    SpecialTax,
}

impl TaxType {
    /// Statutory rate for the tax type, `None` for special taxes.
    #[must_use]
    pub const fn default_rate(self) -> Option<f64> {
        match self {
            Self::IvaGeneral => Some(21.0),
            Self::IvaReduced => Some(10.0),
            Self::IvaSuperReduced => Some(4.0),
            Self::IvaExempt => Some(0.0),
            Self::SpecialTax => None,
        }
    }
}

/// Unit of measure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitType {
    /// Units.
    #[default]
    Unit,
    /// Hours.
    Hour,
    /// Days.
    Day,
    /// Months.
    Month,
    /// Meters.
    Meter,
    /// Kilograms.
    Kilogram,
    /// Liters.
    Liter,
    /// Packages.
    Package,
}

/// Payload for creating a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unit price before tax.
    pub unit_price: f64,
    /// Owning company.
    pub company_id: CompanyId,
    /// Catalog category.
    pub category: ProductCategory,
    /// Unit of measure.
    pub unit_type: UnitType,
    /// Applicable tax.
    pub tax_type: TaxType,
    /// Tax rate percentage.
    pub tax_rate: f64,
    /// Internal product code.
    pub code: String,
    /// Barcode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    /// Units in stock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
    /// Stock alert threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_stock: Option<i64>,
    /// Whether stock is tracked.
    pub track_stock: bool,
    /// ISO 4217 currency code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl CreateProductRequest {
    /// Check the payload against the catalog rules.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for the first offending field.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        validate_unit_price(self.unit_price)?;
        validate_tax_rate(self.tax_rate)?;
        validate_code(&self.code)?;
        validate_stock("stockQuantity", self.stock_quantity)?;
        validate_stock("minimumStock", self.minimum_stock)?;
        if let Some(currency) = &self.currency {
            validate_currency(currency)?;
        }
        Ok(())
    }
}

/// Partial update of a product. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unit price before tax.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    /// Owning company.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<CompanyId>,
    /// Catalog category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ProductCategory>,
    /// Unit of measure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_type: Option<UnitType>,
    /// Applicable tax.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_type: Option<TaxType>,
    /// Tax rate percentage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<f64>,
    /// Internal product code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Barcode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    /// Units in stock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
    /// Stock alert threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_stock: Option<i64>,
    /// Whether stock is tracked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_stock: Option<bool>,
    /// ISO 4217 currency code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Lifecycle status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProductStatus>,
}

impl UpdateProductRequest {
    /// Check the fields that are present against the catalog rules.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for the first offending field.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(price) = self.unit_price {
            validate_unit_price(price)?;
        }
        if let Some(rate) = self.tax_rate {
            validate_tax_rate(rate)?;
        }
        if let Some(code) = &self.code {
            validate_code(code)?;
        }
        validate_stock("stockQuantity", self.stock_quantity)?;
        validate_stock("minimumStock", self.minimum_stock)?;
        if let Some(currency) = &self.currency {
            validate_currency(currency)?;
        }
        Ok(())
    }

    /// Whether the update carries no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Filters for listing products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductsQuery {
    /// Only products of this company.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<CompanyId>,
    /// Free-text filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Only products in this status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProductStatus>,
    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Page offset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl ProductsQuery {
    /// Query-string pairs for the set filters, sorted by key.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(company_id) = &self.company_id {
            pairs.push(("companyId".to_string(), company_id.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search".to_string(), search.clone()));
        }
        if let Some(status) = self.status {
            pairs.push(("status".to_string(), status.as_str().to_string()));
        }
        pairs
    }
}

// ============================================================================
// Field rules
// ============================================================================

fn validate_name(name: &str) -> Result<()> {
    let len = name.trim().chars().count();
    if !(PRODUCT_NAME_MIN_LEN..=PRODUCT_NAME_MAX_LEN).contains(&len) {
        return Err(CoreError::validation(
            "name",
            format!("must be between {PRODUCT_NAME_MIN_LEN} and {PRODUCT_NAME_MAX_LEN} characters"),
        ));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<()> {
    if description.chars().count() > PRODUCT_DESCRIPTION_MAX_LEN {
        return Err(CoreError::validation(
            "description",
            format!("must be at most {PRODUCT_DESCRIPTION_MAX_LEN} characters"),
        ));
    }
    Ok(())
}

fn validate_unit_price(price: f64) -> Result<()> {
    if !price.is_finite() || !(0.0..=UNIT_PRICE_MAX).contains(&price) {
        return Err(CoreError::validation(
            "unitPrice",
            format!("must be between 0 and {UNIT_PRICE_MAX}"),
        ));
    }
    Ok(())
}

fn validate_tax_rate(rate: f64) -> Result<()> {
    if !rate.is_finite() || !(0.0..=TAX_RATE_MAX).contains(&rate) {
        return Err(CoreError::validation(
            "taxRate",
            format!("must be between 0 and {TAX_RATE_MAX}"),
        ));
    }
    Ok(())
}

fn validate_code(code: &str) -> Result<()> {
    let len = code.chars().count();
    if len == 0 || len > PRODUCT_CODE_MAX_LEN {
        return Err(CoreError::validation(
            "code",
            format!("must be between 1 and {PRODUCT_CODE_MAX_LEN} characters"),
        ));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CoreError::validation(
            "code",
            "may only contain letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

fn validate_stock(field: &str, value: Option<i64>) -> Result<()> {
    match value {
        Some(v) if v < 0 => Err(CoreError::validation(field, "must not be negative")),
        _ => Ok(()),
    }
}

fn validate_currency(currency: &str) -> Result<()> {
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(CoreError::validation(
            "currency",
            "must be a three-letter ISO 4217 code",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_request() -> CreateProductRequest {
        CreateProductRequest {
            name: "Laptop Dell XPS 15".to_string(),
            description: Some("High performance laptop".to_string()),
            unit_price: 1299.99,
            company_id: "comp-1".parse().unwrap(),
            category: ProductCategory::Product,
            unit_type: UnitType::Unit,
            tax_type: TaxType::IvaGeneral,
            tax_rate: 21.0,
            code: "PROD-001".to_string(),
            barcode: None,
            stock_quantity: Some(100),
            minimum_stock: Some(5),
            track_stock: true,
            currency: Some("EUR".to_string()),
        }
    }

    #[test]
    fn valid_create_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn create_request_rules() {
        let mut req = valid_request();
        req.name = "X".to_string();
        assert_eq!(req.validate().unwrap_err().field(), Some("name"));

        let mut req = valid_request();
        req.unit_price = -0.01;
        assert_eq!(req.validate().unwrap_err().field(), Some("unitPrice"));

        let mut req = valid_request();
        req.unit_price = 1_000_000.0;
        assert_eq!(req.validate().unwrap_err().field(), Some("unitPrice"));

        let mut req = valid_request();
        req.tax_rate = 101.0;
        assert_eq!(req.validate().unwrap_err().field(), Some("taxRate"));

        let mut req = valid_request();
        req.code = "PROD 001".to_string();
        assert_eq!(req.validate().unwrap_err().field(), Some("code"));

        let mut req = valid_request();
        req.stock_quantity = Some(-1);
        assert_eq!(req.validate().unwrap_err().field(), Some("stockQuantity"));

        let mut req = valid_request();
        req.currency = Some("eur".to_string());
        assert_eq!(req.validate().unwrap_err().field(), Some("currency"));
    }

    #[test]
    fn free_products_are_allowed() {
        let mut req = valid_request();
        req.unit_price = 0.0;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn update_validates_only_present_fields() {
        assert!(UpdateProductRequest::default().validate().is_ok());
        assert!(UpdateProductRequest::default().is_empty());

        let update = UpdateProductRequest {
            tax_rate: Some(-5.0),
            ..UpdateProductRequest::default()
        };
        assert_eq!(update.validate().unwrap_err().field(), Some("taxRate"));
    }

    #[test]
    fn create_request_serializes_camel_case() {
        let value = serde_json::to_value(valid_request()).unwrap();
        assert_eq!(value["unitPrice"], json!(1299.99));
        assert_eq!(value["taxType"], json!("IVA_GENERAL"));
        assert_eq!(value["companyId"], json!("comp-1"));
        assert!(value.get("barcode").is_none());
    }

    #[test]
    fn product_deserializes_backend_payload() {
        let product: Product = serde_json::from_value(json!({
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "name": "Consulting hour",
            "description": null,
            "unitPrice": 80.5,
            "currency": "EUR",
            "companyId": "comp-550e8400",
            "status": "ACTIVE",
            "category": "CONSULTATION",
            "unitType": "HOUR",
            "taxType": "IVA_GENERAL",
            "taxRate": 21,
            "code": "CONS-01",
            "barcode": null,
            "stockQuantity": 0,
            "minimumStock": 0,
            "trackStock": false,
            "createdAt": "2023-10-01T12:00:00Z",
            "updatedAt": "2023-10-01T12:30:00Z"
        }))
        .unwrap();

        assert_eq!(product.unit_price_cents(), 8050);
        assert_eq!(product.unit_type, UnitType::Hour);
        assert!(!product.is_low_stock());
    }

    #[test]
    fn query_pairs_are_sorted() {
        let query = ProductsQuery {
            status: Some(ProductStatus::Active),
            company_id: Some("comp-1".parse().unwrap()),
            limit: Some(20),
            ..ProductsQuery::default()
        };
        let keys: Vec<_> = query.to_pairs().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["companyId", "limit", "status"]);
    }

    #[test]
    fn tax_type_rates() {
        assert_eq!(TaxType::IvaGeneral.default_rate(), Some(21.0));
        assert_eq!(TaxType::IvaSuperReduced.default_rate(), Some(4.0));
        assert_eq!(TaxType::SpecialTax.default_rate(), None);
    }
}
