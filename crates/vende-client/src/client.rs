//! Vende HTTP client implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, field, instrument, warn, Span};

use vende_core::{
    Company, CompanyId, CreateProductRequest, Product, ProductId, ProductsQuery,
    UpdateProductRequest,
};

use crate::config::ClientConfig;
use crate::dedup::{request_key, DedupCache};
use crate::error::{ConfigError, ErrorCode, NormalizedError};
use crate::normalize::{normalize, ErrorMessages, Failure};
use crate::retry::{execute_with_retry, RetryPolicy};
use crate::types::{HealthStatus, Listing};

type Outcome = Result<Value, NormalizedError>;

/// Vende API client.
///
/// Reads are deduplicated while in flight; every request is retried with
/// backoff; every failure comes back as a [`NormalizedError`]. Clones share
/// the connection pool, the dedup cache and the auth token.
#[derive(Debug, Clone)]
pub struct VendeClient {
    http: Client,
    base_url: String,
    policy: RetryPolicy,
    dedup: DedupCache<Outcome>,
    messages: Arc<ErrorMessages>,
    auth_token: Arc<RwLock<Option<String>>>,
    request_seq: Arc<AtomicU64>,
}

impl VendeClient {
    /// Create a client with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_config(ClientConfig::new(base_url))
    }

    /// Create a client configured from `VENDE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `VENDE_API_BASE_URL` is missing or the client cannot be built.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::with_config(ClientConfig::from_env()?)
    }

    /// Create a client from a full configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, a header is malformed,
    /// or the HTTP client cannot be built.
    pub fn with_config(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("x-client-version", header_value(&config.client_version)?);
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ConfigError::Invalid(format!("invalid header name: {name}")))?;
            headers.insert(name, header_value(value)?);
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            policy: config.retry_policy(),
            dedup: DedupCache::new(config.dedup_window),
            messages: Arc::new(config.messages),
            auth_token: Arc::new(RwLock::new(config.auth_token)),
            request_seq: Arc::new(AtomicU64::new(0)),
            base_url: config.base_url,
        })
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ------------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------------

    /// Attach `token` as a bearer token to subsequent requests.
    pub fn set_auth_token(&self, token: impl Into<String>) {
        *self.auth_token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    /// Stop sending a bearer token.
    pub fn clear_auth_token(&self) {
        *self.auth_token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// The current bearer token.
    #[must_use]
    pub fn auth_token(&self) -> Option<String> {
        self.auth_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget all in-flight reads. Requests already sent keep running.
    pub fn clear_cache(&self) {
        self.dedup.clear();
    }

    // ------------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------------

    /// List products matching `query`.
    ///
    /// # Errors
    ///
    /// Returns the normalized failure of the request.
    pub async fn list_products(&self, query: &ProductsQuery) -> Result<Vec<Product>, NormalizedError> {
        let listing: Listing<Product> = self.read("/products", query.to_pairs()).await?;
        Ok(listing.into_vec())
    }

    /// Fetch a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `HTTP_404_ERROR` if the product does not exist, or the
    /// normalized failure of the request.
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, NormalizedError> {
        self.read(&format!("/products/{id}"), Vec::new()).await
    }

    /// Full-text product search.
    ///
    /// # Errors
    ///
    /// Returns the normalized failure of the request.
    pub async fn search_products(&self, term: &str) -> Result<Vec<Product>, NormalizedError> {
        let params = vec![("q".to_string(), term.to_string())];
        let listing: Listing<Product> = self.read("/products/search", params).await?;
        Ok(listing.into_vec())
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `VALIDATION_ERROR` without sending anything if the payload is
    /// invalid, or the normalized failure of the request.
    pub async fn create_product(&self, request: &CreateProductRequest) -> Result<Product, NormalizedError> {
        request.validate()?;
        self.write(Method::POST, "/products", Some(request)).await
    }

    /// Apply a partial update to a product.
    ///
    /// # Errors
    ///
    /// Returns `VALIDATION_ERROR` without sending anything if the payload is
    /// invalid, or the normalized failure of the request.
    pub async fn update_product(
        &self,
        id: &ProductId,
        request: &UpdateProductRequest,
    ) -> Result<Product, NormalizedError> {
        request.validate()?;
        self.write(Method::PATCH, &format!("/products/{id}"), Some(request))
            .await
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns the normalized failure of the request.
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), NormalizedError> {
        self.write::<(), IgnoredAny>(Method::DELETE, &format!("/products/{id}"), None)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Companies
    // ------------------------------------------------------------------------

    /// List companies.
    ///
    /// # Errors
    ///
    /// Returns the normalized failure of the request.
    pub async fn list_companies(&self) -> Result<Vec<Company>, NormalizedError> {
        let listing: Listing<Company> = self.read("/companies", Vec::new()).await?;
        Ok(listing.into_vec())
    }

    /// Fetch a company by ID.
    ///
    /// # Errors
    ///
    /// Returns `HTTP_404_ERROR` if the company does not exist, or the
    /// normalized failure of the request.
    pub async fn get_company(&self, id: &CompanyId) -> Result<Company, NormalizedError> {
        self.read(&format!("/companies/{id}"), Vec::new()).await
    }

    // ------------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------------

    /// Check service health. Not deduplicated.
    ///
    /// # Errors
    ///
    /// Returns the normalized failure of the request.
    pub async fn health_check(&self) -> Result<HealthStatus, NormalizedError> {
        self.write::<(), _>(Method::GET, "/health", None).await
    }

    // ------------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------------

    /// GET with dedup and retry.
    async fn read<T: DeserializeOwned>(
        &self,
        path: &str,
        params: Vec<(String, String)>,
    ) -> Result<T, NormalizedError> {
        let key = request_key(Method::GET.as_str(), path, &params);
        let client = self.clone();
        let path = path.to_string();

        let outcome = self
            .dedup
            .run(key, async move {
                client.execute(Method::GET, &path, &params, None).await
            })
            .await
            .unwrap_or_else(|| Err(self.unknown_error()))?;

        self.decode(outcome)
    }

    /// Request with retry, never deduplicated.
    async fn write<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, NormalizedError> {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|err| {
                warn!(error = %err, "failed to encode request body");
                self.unknown_error()
            })?;

        let value = self.execute(method, path, &[], body.as_ref()).await?;
        self.decode(value)
    }

    /// Send with retry and normalize the outcome. An empty success body is `null`.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> Outcome {
        let bytes = execute_with_retry(&self.policy, || self.send(method.clone(), path, params, body))
            .await
            .map_err(|failure| normalize(&failure, &self.messages))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|err| {
            warn!(error = %err, path, "response body is not valid JSON");
            self.unknown_error()
        })
    }

    /// A single attempt. Non-2xx answers become [`Failure::Http`] with the
    /// parsed body, if any.
    #[instrument(
        name = "vende_request",
        skip_all,
        fields(
            request_id = field::Empty,
            method = %method,
            url = field::Empty,
            status = field::Empty,
            elapsed_ms = field::Empty,
        )
    )]
    async fn send(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Vec<u8>, Failure> {
        let request_id = self.request_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let url = format!("{}{}", self.base_url, path);
        let span = Span::current();
        span.record("request_id", request_id);
        span.record("url", url.as_str());

        let mut request = self.http.request(method, &url);
        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some(token) = self.auth_token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let result = request.send().await;
        span.record(
            "elapsed_ms",
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        );

        let response = result?;
        let status = response.status();
        span.record("status", status.as_u16());
        let bytes = response.bytes().await?;

        if status.is_success() {
            debug!("request succeeded");
            return Ok(bytes.to_vec());
        }

        debug!("request failed");
        Err(Failure::Http {
            status: status.as_u16(),
            body: serde_json::from_slice(&bytes).ok(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, value: Value) -> Result<T, NormalizedError> {
        serde_json::from_value(value).map_err(|err| {
            warn!(error = %err, "response body has an unexpected shape");
            self.unknown_error()
        })
    }

    fn unknown_error(&self) -> NormalizedError {
        NormalizedError::new(ErrorCode::Unknown, self.messages.server.clone())
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value)
        .map_err(|_| ConfigError::Invalid(format!("invalid header value: {value}")))
}
