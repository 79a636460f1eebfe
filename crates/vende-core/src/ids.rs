//! Identifier types for Vende.
//!
//! The products service issues UUIDs for most records, but some identifiers
//! carry a prefix (companies are seeded as `comp-<uuid>`), so identifiers are
//! kept as validated strings rather than parsed UUIDs.
//!
//! # Macro-based ID Types
//!
//! The `string_id_type!` macro generates the newtype, its serde wiring and the
//! parsing/display traits so every identifier behaves the same way.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum accepted identifier length.
pub const MAX_ID_LEN: usize = 64;

/// Macro to define a string identifier type with standard trait implementations.
///
/// This macro generates a newtype wrapper around `String` with implementations for:
/// - `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `Serialize`, `Deserialize` (validated on the way in)
/// - `FromStr`, `Display`, `Debug`
/// - `TryFrom<String>`, `Into<String>`
/// - `AsRef<str>`
///
/// # Example
///
/// ```ignore
/// string_id_type!(MyId, "A custom identifier type.");
/// let id = MyId::generate();
/// let parsed: MyId = id.to_string().parse().unwrap();
/// ```
macro_rules! string_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Generate a new random identifier (UUID v4).
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Return the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                validate_id(s).map(|()| Self(s.to_string()))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                validate_id(&value).map(|()| Self(value))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id_type!(ProductId, "A product or service identifier.");
string_id_type!(CompanyId, "An issuing company identifier.\n\nSeeded companies use a `comp-` prefix in front of a UUID.");
string_id_type!(ClientId, "A billed client (customer) identifier.");
string_id_type!(InvoiceId, "An invoice identifier.");

/// Identifiers end up in URL paths, so only path-safe characters are allowed.
fn validate_id(value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty);
    }
    if value.len() > MAX_ID_LEN {
        return Err(IdError::TooLong(value.len()));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(IdError::InvalidCharacter(c));
    }
    Ok(())
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is empty.
    #[error("identifier is empty")]
    Empty,

    /// The input exceeds [`MAX_ID_LEN`].
    #[error("identifier is too long ({0} bytes)")]
    TooLong(usize),

    /// The input contains a character that is not allowed.
    #[error("identifier contains invalid character {0:?}")]
    InvalidCharacter(char),
}
