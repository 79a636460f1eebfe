//! Error types for Vende domain operations.

use crate::ids::IdError;
use crate::invoice::InvoiceStatus;

/// Result type for Vende domain operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error code reported for rejected input.
pub const VALIDATION_ERROR_CODE: &str = "VALIDATION_ERROR";

/// Error code reported for a forbidden invoice status change.
pub const INVALID_TRANSITION_ERROR_CODE: &str = "INVALID_STATUS_TRANSITION";

/// Errors that can occur in Vende domain operations.
///
/// These are input errors: they are reported to the caller immediately and
/// are never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    /// A field failed validation.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Path of the offending field (e.g. `line_items[1].quantity`).
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Invalid invoice status transition.
    #[error("invalid status transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// The current status.
        from: InvoiceStatus,
        /// The requested status.
        to: InvoiceStatus,
    },
}

impl CoreError {
    /// Build a validation error for `field`.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } | Self::InvalidId(_) => VALIDATION_ERROR_CODE,
            Self::InvalidTransition { .. } => INVALID_TRANSITION_ERROR_CODE,
        }
    }

    /// Field name associated with the error, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            Self::InvalidId(_) => Some("id"),
            Self::InvalidTransition { .. } => Some("status"),
        }
    }
}
