//! Invoice types and lifecycle.
//!
//! An invoice is created as a draft from a [`CreateInvoiceRequest`], priced
//! with [`crate::totals`], and then moves through its statuses:
//!
//! ```text
//! Draft ──send──▶ Sent ──mark_paid──▶ Paid
//!   │              │  ╲
//!   │              │   mark_overdue──▶ Overdue ──mark_paid──▶ Paid
//!   └──────────────┴──────┴──cancel──▶ Cancelled
//! ```

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::{ClientId, CompanyId, InvoiceId};
use crate::totals::{price_lines, InvoiceTotals, LineItemInput, PricedLineItem};

/// Number of invoices returned by [`recent_invoices`] by default.
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Invoice status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Being edited, not yet issued.
    #[default]
    Draft,
    /// Issued to the client.
    Sent,
    /// Settled.
    Paid,
    /// Issued and past its due date.
    Overdue,
    /// Voided.
    Cancelled,
}

impl InvoiceStatus {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }

    /// Whether the invoice still awaits payment.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Sent | Self::Overdue)
    }

    /// Whether moving from `self` to `to` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Draft, Self::Sent)
                | (Self::Sent, Self::Overdue)
                | (Self::Sent | Self::Overdue, Self::Paid)
                | (Self::Draft | Self::Sent | Self::Overdue, Self::Cancelled)
        )
    }
}

/// Kind of billing document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    /// Full invoice.
    #[default]
    Invoice,
    /// Simplified invoice (ticket).
    SimplifiedInvoice,
    /// Credit note.
    CreditNote,
    /// Debit note.
    DebitNote,
    /// Quote.
    Quote,
    /// Delivery note.
    DeliveryNote,
}

/// Request to create an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateInvoiceRequest {
    /// Billed client.
    pub client_id: ClientId,
    /// Kind of document.
    pub document_type: DocumentType,
    /// Numbering series (e.g. `"A"`).
    pub series: String,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Payment due date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Lines to bill.
    pub line_items: Vec<LineItemInput>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CreateInvoiceRequest {
    /// Check the header fields. Lines are checked when priced.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.series.trim().is_empty() {
            return Err(CoreError::validation("series", "must not be empty"));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(CoreError::validation(
                "currency",
                "must be a three-letter ISO 4217 code",
            ));
        }
        if let Some(due) = self.due_date {
            if due < self.issue_date {
                return Err(CoreError::validation(
                    "due_date",
                    "must not be before the issue date",
                ));
            }
        }
        Ok(())
    }
}

/// An invoice with priced lines and totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice ID.
    pub id: InvoiceId,
    /// Human-readable number (`A-2024-1234`).
    pub number: String,
    /// Numbering series.
    pub series: String,
    /// Kind of document.
    pub document_type: DocumentType,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Payment due date.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Issuing company.
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    /// Billed client.
    pub client_id: ClientId,
    /// Current status.
    pub status: InvoiceStatus,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Priced lines.
    pub line_items: Vec<PricedLineItem>,
    /// Aggregate amounts.
    #[serde(flatten)]
    pub totals: InvoiceTotals,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Create a draft invoice from a request, pricing its lines.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the header or any line is invalid.
    pub fn draft(request: CreateInvoiceRequest, number: String, now: DateTime<Utc>) -> Result<Self> {
        request.validate()?;
        let line_items = price_lines(&request.line_items)?;
        let totals = InvoiceTotals::from_lines(&line_items);

        Ok(Self {
            id: InvoiceId::generate(),
            number,
            series: request.series,
            document_type: request.document_type,
            issue_date: request.issue_date,
            due_date: request.due_date,
            company_id: None,
            client_id: request.client_id,
            status: InvoiceStatus::Draft,
            currency: request.currency,
            line_items,
            totals,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the lines and recompute the totals.
    ///
    /// Only drafts can be repriced.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the invoice is not a draft or a
    /// line is invalid. The invoice is left untouched on error.
    pub fn reprice(&mut self, lines: &[LineItemInput], now: DateTime<Utc>) -> Result<()> {
        if self.status != InvoiceStatus::Draft {
            return Err(CoreError::validation(
                "line_items",
                "only draft invoices can be modified",
            ));
        }
        let line_items = price_lines(lines)?;
        self.totals = InvoiceTotals::from_lines(&line_items);
        self.line_items = line_items;
        self.updated_at = now;
        Ok(())
    }

    /// Move the invoice to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] if the lifecycle forbids it.
    pub fn transition(&mut self, to: InvoiceStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// Issue a draft.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] unless the invoice is a draft.
    pub fn send(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(InvoiceStatus::Sent, now)
    }

    /// Record payment.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] unless the invoice is pending.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(InvoiceStatus::Paid, now)
    }

    /// Flag a sent invoice as overdue.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] unless the invoice was sent.
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(InvoiceStatus::Overdue, now)
    }

    /// Void the invoice.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] if already paid or cancelled.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(InvoiceStatus::Cancelled, now)
    }

    /// Whether a sent invoice is past its due date.
    #[must_use]
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == InvoiceStatus::Sent && self.due_date.is_some_and(|due| due < today)
    }

    /// Build a request that recreates this invoice, issued `today`.
    ///
    /// The due date keeps the original payment term, so a copy of a past-due
    /// invoice is due as many days after `today` as the original was after
    /// its own issue date.
    #[must_use]
    pub fn duplicate_request(&self, today: NaiveDate) -> CreateInvoiceRequest {
        let due_date = self
            .due_date
            .and_then(|due| today.checked_add_signed(due - self.issue_date));

        CreateInvoiceRequest {
            client_id: self.client_id.clone(),
            document_type: self.document_type,
            series: self.series.clone(),
            issue_date: today,
            due_date,
            currency: self.currency.clone(),
            line_items: self.line_items.iter().map(|l| l.input.clone()).collect(),
            notes: self.notes.clone(),
        }
    }
}

/// Build an invoice number: `{series}-{year}-{last four digits of the epoch millis}`.
#[must_use]
pub fn generate_invoice_number(series: &str, now: DateTime<Utc>) -> String {
    let suffix = now.timestamp_millis().rem_euclid(10_000);
    format!("{series}-{}-{suffix:04}", now.year())
}

/// Counts and amounts over a set of invoices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceStats {
    /// Number of invoices.
    pub total: usize,
    /// Drafts.
    pub draft: usize,
    /// Sent.
    pub sent: usize,
    /// Paid.
    pub paid: usize,
    /// Overdue.
    pub overdue: usize,
    /// Cancelled.
    pub cancelled: usize,
    /// Sum of all invoice totals.
    pub total_amount_cents: i64,
    /// Sum of paid invoice totals.
    pub paid_amount_cents: i64,
    /// Sum of sent and overdue invoice totals.
    pub pending_amount_cents: i64,
}

impl InvoiceStats {
    /// Tally `invoices`.
    #[must_use]
    pub fn from_invoices(invoices: &[Invoice]) -> Self {
        let mut stats = Self {
            total: invoices.len(),
            ..Self::default()
        };

        for invoice in invoices {
            let amount = invoice.totals.total_cents;
            stats.total_amount_cents += amount;

            match invoice.status {
                InvoiceStatus::Draft => stats.draft += 1,
                InvoiceStatus::Sent => stats.sent += 1,
                InvoiceStatus::Paid => stats.paid += 1,
                InvoiceStatus::Overdue => stats.overdue += 1,
                InvoiceStatus::Cancelled => stats.cancelled += 1,
            }

            if invoice.status == InvoiceStatus::Paid {
                stats.paid_amount_cents += amount;
            } else if invoice.status.is_pending() {
                stats.pending_amount_cents += amount;
            }
        }

        stats
    }
}

/// Sent invoices whose due date is before `today`.
#[must_use]
pub fn overdue_invoices(invoices: &[Invoice], today: NaiveDate) -> Vec<&Invoice> {
    invoices.iter().filter(|i| i.is_overdue(today)).collect()
}

/// The `limit` most recently created invoices, newest first.
#[must_use]
pub fn recent_invoices(invoices: &[Invoice], limit: usize) -> Vec<&Invoice> {
    let mut recent: Vec<&Invoice> = invoices.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(limit);
    recent
}
