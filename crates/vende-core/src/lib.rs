//! Core types and utilities for Vende.
//!
//! This crate provides the domain types shared by the Vende client and tools:
//!
//! - **Identifiers**: `ProductId`, `CompanyId`, `ClientId`, `InvoiceId`
//! - **Catalog**: `Product`, `Company`, product create/update requests and their validation
//! - **Invoices**: `Invoice`, `InvoiceStatus`, lifecycle transitions, statistics
//! - **Totals**: `LineItemInput`, `PricedLineItem`, `InvoiceTotals`
//!
//! # Money
//!
//! Amounts are stored as `i64` cents to avoid floating point drift. Line
//! items are rounded to whole cents at each pricing step, and invoice totals
//! are sums of the rounded line values.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod company;
pub mod error;
pub mod ids;
pub mod invoice;
pub mod money;
pub mod product;
pub mod totals;

pub use company::Company;
pub use error::{CoreError, Result, INVALID_TRANSITION_ERROR_CODE, VALIDATION_ERROR_CODE};
pub use ids::{ClientId, CompanyId, IdError, InvoiceId, ProductId};
pub use invoice::{
    generate_invoice_number, overdue_invoices, recent_invoices, CreateInvoiceRequest,
    DocumentType, Invoice, InvoiceStats, InvoiceStatus, DEFAULT_RECENT_LIMIT,
};
pub use money::{amount_from_cents, cents_from_amount, format_cents, round_cents};
pub use product::{
    CreateProductRequest, Product, ProductCategory, ProductStatus, ProductsQuery, TaxType,
    UnitType, UpdateProductRequest,
};
pub use totals::{calculate, price_line, price_lines, InvoiceTotals, LineItemInput, PricedLineItem};
