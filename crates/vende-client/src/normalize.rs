//! Failure classification and error normalization.
//!
//! Transport failures are first captured as a [`Failure`], which the retry
//! executor inspects, and are turned into a [`NormalizedError`] only once
//! they are about to reach the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorCode, NormalizedError};

/// A failed request attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// The server answered with a non-2xx status.
    Http {
        /// Status code.
        status: u16,
        /// Parsed JSON body, if the server sent one.
        body: Option<Value>,
    },
    /// No response was received (connect error, DNS, timeout).
    Network {
        /// Transport description, for logs only.
        reason: String,
    },
    /// A transport error that fits neither category.
    Unknown {
        /// Description, for logs only.
        reason: String,
    },
}

impl Failure {
    /// HTTP status, if the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http { status, .. } => write!(f, "HTTP {status}"),
            Self::Network { reason } => write!(f, "network error: {reason}"),
            Self::Unknown { reason } => write!(f, "unknown error: {reason}"),
        }
    }
}

impl From<reqwest::Error> for Failure {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::Http {
                status: status.as_u16(),
                body: None,
            };
        }
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            return Self::Network {
                reason: err.to_string(),
            };
        }
        Self::Unknown {
            reason: err.to_string(),
        }
    }
}

/// User-facing messages used by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessages {
    /// No response received.
    pub network: String,
    /// Request rejected as invalid (400).
    pub validation: String,
    /// Resource not found (404).
    pub not_found: String,
    /// Not authenticated or not allowed (401/403).
    pub unauthorized: String,
    /// Everything else.
    pub server: String,
}

impl Default for ErrorMessages {
    fn default() -> Self {
        Self::english()
    }
}

impl ErrorMessages {
    /// English catalog.
    #[must_use]
    pub fn english() -> Self {
        Self {
            network: "Connection error. Please try again.".into(),
            validation: "The submitted data is not valid.".into(),
            not_found: "The requested resource was not found.".into(),
            unauthorized: "You are not allowed to perform this action.".into(),
            server: "Server error. Please contact support.".into(),
        }
    }

    /// Spanish catalog.
    #[must_use]
    pub fn spanish() -> Self {
        Self {
            network: "Error de conexión. Por favor, inténtalo de nuevo.".into(),
            validation: "Los datos ingresados no son válidos.".into(),
            not_found: "El recurso solicitado no fue encontrado.".into(),
            unauthorized: "No tienes permisos para realizar esta acción.".into(),
            server: "Error del servidor. Por favor, contacta al soporte.".into(),
        }
    }

    /// Catalog for a locale tag (`"es"`, `"es-ES"`, ...). Unknown tags get English.
    #[must_use]
    pub fn for_locale(locale: &str) -> Self {
        let lang = locale.split(['-', '_']).next().unwrap_or_default();
        if lang.eq_ignore_ascii_case("es") {
            Self::spanish()
        } else {
            Self::english()
        }
    }
}

/// Turn a failure into the error shape surfaced to callers.
#[must_use]
pub fn normalize(failure: &Failure, messages: &ErrorMessages) -> NormalizedError {
    match failure {
        Failure::Http { status, body } => {
            let server_message = body.as_ref().and_then(server_message);
            let message = match status {
                400 => server_message.unwrap_or_else(|| messages.validation.clone()),
                404 => messages.not_found.clone(),
                401 | 403 => messages.unauthorized.clone(),
                _ => server_message.unwrap_or_else(|| messages.server.clone()),
            };
            let error = NormalizedError::new(ErrorCode::Http(*status), message);
            match body.as_ref().and_then(|b| b.get("details")) {
                Some(details) if !details.is_null() => error.with_details(details.clone()),
                _ => error,
            }
        }
        Failure::Network { .. } => NormalizedError::new(ErrorCode::Network, messages.network.clone()),
        Failure::Unknown { .. } => NormalizedError::new(ErrorCode::Unknown, messages.server.clone()),
    }
}

/// Extract `message` from an error body. Validation errors send an array of strings.
fn server_message(body: &Value) -> Option<String> {
    match body.get("message")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}
