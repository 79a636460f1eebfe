//! Client error types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vende_core::CoreError;

/// Machine-readable error code carried by [`NormalizedError`].
///
/// Renders as `HTTP_<status>_ERROR`, `HTTP_NETWORK_ERROR`, `UNKNOWN_ERROR`,
/// `VALIDATION_ERROR` or `INVALID_STATUS_TRANSITION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ErrorCode {
    /// The server answered with a non-2xx status.
    Http(u16),
    /// No response was received.
    Network,
    /// The failure could not be classified.
    Unknown,
    /// Input was rejected before it reached the network.
    Validation,
    /// An invoice status change is not allowed from the current status.
    InvalidTransition,
}

impl ErrorCode {
    /// HTTP status, if the server answered.
    #[must_use]
    pub const fn status(self) -> Option<u16> {
        match self {
            Self::Http(status) => Some(status),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(status) => write!(f, "HTTP_{status}_ERROR"),
            Self::Network => f.write_str("HTTP_NETWORK_ERROR"),
            Self::Unknown => f.write_str("UNKNOWN_ERROR"),
            Self::Validation => f.write_str(vende_core::VALIDATION_ERROR_CODE),
            Self::InvalidTransition => f.write_str(vende_core::INVALID_TRANSITION_ERROR_CODE),
        }
    }
}

impl FromStr for ErrorCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HTTP_NETWORK_ERROR" => Ok(Self::Network),
            "UNKNOWN_ERROR" => Ok(Self::Unknown),
            vende_core::VALIDATION_ERROR_CODE => Ok(Self::Validation),
            vende_core::INVALID_TRANSITION_ERROR_CODE => Ok(Self::InvalidTransition),
            other => other
                .strip_prefix("HTTP_")
                .and_then(|rest| rest.strip_suffix("_ERROR"))
                .and_then(|status| status.parse().ok())
                .map(Self::Http)
                .ok_or_else(|| format!("unrecognized error code: {other}")),
        }
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.to_string()
    }
}

/// The single error shape returned by every API operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct NormalizedError {
    /// Error code.
    pub code: ErrorCode,
    /// User-facing message.
    pub message: String,
    /// Structured details supplied by the server, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// When the error was produced.
    pub timestamp: DateTime<Utc>,
}

impl NormalizedError {
    /// Create an error stamped with the current time.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach structured details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// HTTP status, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.code.status()
    }

    /// Whether the resource was not found.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::Http(404)
    }
}

impl From<CoreError> for NormalizedError {
    fn from(err: CoreError) -> Self {
        let details = serde_json::json!({
            "field": err.field(),
            "reason": err.to_string(),
        });
        let code = match err {
            CoreError::Validation { .. } | CoreError::InvalidId(_) => ErrorCode::Validation,
            CoreError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
        };
        Self::new(code, err.to_string()).with_details(details)
    }
}

/// Errors raised while configuring a client.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The base URL is missing or empty.
    #[error("base URL is required (set VENDE_API_BASE_URL)")]
    MissingBaseUrl,

    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for [`crate::ClientConfig`].
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    /// An option is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use vende_core::InvoiceStatus;

    #[test]
    fn error_code_strings() {
        assert_eq!(ErrorCode::Http(404).to_string(), "HTTP_404_ERROR");
        assert_eq!(ErrorCode::Network.to_string(), "HTTP_NETWORK_ERROR");
        assert_eq!(ErrorCode::Unknown.to_string(), "UNKNOWN_ERROR");
        assert_eq!(ErrorCode::Validation.to_string(), "VALIDATION_ERROR");
    }

    #[test]
    fn error_code_parses_back() {
        for code in [
            ErrorCode::Http(503),
            ErrorCode::Network,
            ErrorCode::Unknown,
            ErrorCode::Validation,
            ErrorCode::InvalidTransition,
        ] {
            assert_eq!(code.to_string().parse::<ErrorCode>().unwrap(), code);
        }
        assert!("HTTP_abc_ERROR".parse::<ErrorCode>().is_err());
    }

    #[test]
    fn normalized_error_serializes_flat_code() {
        let err = NormalizedError::new(ErrorCode::Http(404), "not found");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], "HTTP_404_ERROR");
        assert!(value.get("details").is_none());
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
        assert!(err.is_not_found());
    }

    #[test]
    fn core_validation_maps_to_validation_code() {
        let err = NormalizedError::from(CoreError::validation("quantity", "must not be negative"));
        assert_eq!(err.code, ErrorCode::Validation);
        assert_eq!(err.details.unwrap()["field"], "quantity");
    }

    #[test]
    fn core_codes_survive_conversion() {
        let transition = CoreError::InvalidTransition {
            from: InvoiceStatus::Paid,
            to: InvoiceStatus::Draft,
        };
        let id = CoreError::from("bad id!".parse::<vende_core::ClientId>().unwrap_err());

        for core in [transition, id, CoreError::validation("series", "must not be empty")] {
            let expected = core.code();
            let err = NormalizedError::from(core);
            assert_eq!(err.code.to_string(), expected);
        }

        let err = NormalizedError::from(CoreError::InvalidTransition {
            from: InvoiceStatus::Draft,
            to: InvoiceStatus::Paid,
        });
        assert_eq!(err.code, ErrorCode::InvalidTransition);
        assert_eq!(err.details.unwrap()["field"], "status");
    }
}
