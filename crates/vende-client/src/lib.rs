//! Vende Client SDK.
//!
//! This crate provides a resilient client for the Vende products API:
//!
//! - **Deduplication**: identical reads issued while one is in flight share its result
//! - **Retry**: exponential backoff with jitter; 4xx responses other than 408/429 are final
//! - **Normalization**: every failure surfaces as a [`NormalizedError`] with a stable code
//!
//! # Example
//!
//! ```no_run
//! use vende_client::{ClientConfig, VendeClient};
//! use vende_core::ProductsQuery;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = VendeClient::with_config(
//!     ClientConfig::new("http://localhost:3001/api").with_locale("es"),
//! )?;
//! client.set_auth_token("user-jwt");
//!
//! let products = client.list_products(&ProductsQuery::default()).await?;
//! for product in products {
//!     println!("{}: {}", product.code, product.name);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
pub mod config;
pub mod dedup;
mod error;
pub mod normalize;
pub mod retry;
mod types;

pub use client::VendeClient;
pub use config::ClientConfig;
pub use dedup::{request_key, DedupCache};
pub use error::{ConfigError, ErrorCode, NormalizedError};
pub use normalize::{normalize, ErrorMessages, Failure};
pub use retry::{execute_with_retry, is_retryable, RetryPolicy};
pub use types::*;
