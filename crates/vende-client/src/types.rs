//! Response shapes returned by the Vende API.

use serde::{Deserialize, Serialize};

/// A list response.
///
/// Endpoints answer either with a bare array or with an envelope such as
/// `{ "products": [...], "total": 12 }`. Both normalize to a `Vec`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    /// A bare JSON array.
    Bare(Vec<T>),
    /// An object wrapping the list.
    Envelope(Envelope<T>),
}

/// Envelope around a list. The list field may be `products`, `items` or `companies`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope<T> {
    /// The listed records. Missing means empty.
    #[serde(rename = "products", alias = "items", alias = "companies", default = "Vec::new")]
    pub records: Vec<T>,
    /// Total matching records on the server, if reported.
    #[serde(default)]
    pub total: Option<u64>,
}

impl<T> Listing<T> {
    /// The listed records.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(records) | Self::Envelope(Envelope { records, .. }) => records,
        }
    }

    /// Server-reported total, if any.
    #[must_use]
    pub fn total(&self) -> Option<u64> {
        match self {
            Self::Bare(_) => None,
            Self::Envelope(envelope) => envelope.total,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Service status, e.g. `"ok"`.
    pub status: String,
    /// Server time, as reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl HealthStatus {
    /// Whether the service reports itself healthy.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self.status.to_ascii_lowercase().as_str(), "ok" | "healthy" | "up")
    }
}
