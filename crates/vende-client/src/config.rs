//! Client configuration.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::dedup::DEFAULT_DEDUP_WINDOW;
use crate::error::ConfigError;
use crate::normalize::ErrorMessages;
use crate::retry::{RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Version sent in the `X-Client-Version` header.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// API base URL, without trailing slash.
    pub base_url: String,

    /// Per-request timeout (default: 10s).
    pub timeout: Duration,

    /// Retries after the first attempt (default: 3).
    pub max_retries: u32,

    /// Backoff base delay (default: 1s).
    pub retry_base_delay: Duration,

    /// How long a pending read may be joined by identical reads (default: 5s).
    pub dedup_window: Duration,

    /// Initial bearer token.
    pub auth_token: Option<String>,

    /// User-facing error messages.
    pub messages: ErrorMessages,

    /// Value of the `X-Client-Version` header.
    pub client_version: String,

    /// Extra headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

/// On-disk config file layout.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: String,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    max_retries: Option<u32>,
    #[serde(default)]
    retry_delay_ms: Option<u64>,
    #[serde(default)]
    dedup_window_ms: Option<u64>,
    #[serde(default)]
    auth_token: Option<String>,
    #[serde(default)]
    locale: Option<String>,
    #[serde(default)]
    client_version: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base_url(&base_url.into()),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            dedup_window: DEFAULT_DEDUP_WINDOW,
            auth_token: None,
            messages: ErrorMessages::default(),
            client_version: CLIENT_VERSION.to_string(),
            headers: BTreeMap::new(),
        }
    }

    /// Load configuration from `VENDE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingBaseUrl`] if `VENDE_API_BASE_URL` is unset or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Numeric values that fail to parse fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingBaseUrl`] if `VENDE_API_BASE_URL` is missing or empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("VENDE_API_BASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?;

        let millis = |name: &str, default: Duration| {
            lookup(name)
                .and_then(|s| s.trim().parse().ok())
                .map_or(default, Duration::from_millis)
        };

        let mut config = Self::new(base_url);
        config.timeout = millis("VENDE_API_TIMEOUT_MS", DEFAULT_TIMEOUT);
        config.max_retries = lookup("VENDE_API_MAX_RETRIES")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_MAX_RETRIES);
        config.retry_base_delay = millis("VENDE_API_RETRY_DELAY_MS", DEFAULT_RETRY_BASE_DELAY);
        config.dedup_window = millis("VENDE_API_DEDUP_WINDOW_MS", DEFAULT_DEDUP_WINDOW);
        config.auth_token = lookup("VENDE_AUTH_TOKEN").filter(|token| !token.is_empty());
        if let Some(locale) = lookup("VENDE_LOCALE") {
            config.messages = ErrorMessages::for_locale(&locale);
        }
        Ok(config)
    }

    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, carries
    /// unknown fields, or has an empty `base_url`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&contents)?;
        tracing::debug!(path = %path.display(), "loaded client config file");

        if file.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }

        let mut config = Self::new(file.base_url);
        if let Some(ms) = file.timeout_ms {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = file.max_retries {
            config.max_retries = retries;
        }
        if let Some(ms) = file.retry_delay_ms {
            config.retry_base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.dedup_window_ms {
            config.dedup_window = Duration::from_millis(ms);
        }
        config.auth_token = file.auth_token;
        if let Some(locale) = file.locale {
            config.messages = ErrorMessages::for_locale(&locale);
        }
        if let Some(version) = file.client_version {
            config.client_version = version;
        }
        config.headers = file.headers;
        Ok(config)
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry count and base delay.
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self
    }

    /// Set the dedup window.
    #[must_use]
    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    /// Set the initial bearer token.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Select the error message catalog for a locale tag.
    #[must_use]
    pub fn with_locale(mut self, locale: &str) -> Self {
        self.messages = ErrorMessages::for_locale(locale);
        self
    }

    /// Add a header sent with every request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Retry policy derived from this configuration.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_base_delay)
    }

    /// Check that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty or non-HTTP base URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base URL must start with http:// or https://: {}",
                self.base_url
            )));
        }
        Ok(())
    }
}

fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::new("http://localhost:3001/api/");
        assert_eq!(config.base_url, "http://localhost:3001/api");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_secs(1));
        assert_eq!(config.dedup_window, Duration::from_secs(5));
        assert_eq!(config.messages, ErrorMessages::english());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn env_requires_base_url() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[])),
            Err(ConfigError::MissingBaseUrl)
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("VENDE_API_BASE_URL", "  ")])),
            Err(ConfigError::MissingBaseUrl)
        ));
    }

    #[test]
    fn env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("VENDE_API_BASE_URL", "https://api.vende.test/"),
            ("VENDE_API_TIMEOUT_MS", "2500"),
            ("VENDE_API_MAX_RETRIES", "5"),
            ("VENDE_API_RETRY_DELAY_MS", "200"),
            ("VENDE_API_DEDUP_WINDOW_MS", "0"),
            ("VENDE_AUTH_TOKEN", "secret"),
            ("VENDE_LOCALE", "es"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://api.vende.test");
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_base_delay, Duration::from_millis(200));
        assert_eq!(config.dedup_window, Duration::ZERO);
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.messages, ErrorMessages::spanish());
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("VENDE_API_BASE_URL", "http://localhost"),
            ("VENDE_API_TIMEOUT_MS", "soon"),
            ("VENDE_API_MAX_RETRIES", "-1"),
        ]))
        .unwrap();

        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn file_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "base_url": "http://localhost:3001/",
                "timeout_ms": 500,
                "max_retries": 1,
                "locale": "es-ES",
                "headers": {{"X-Company": "acme"}}
            }}"#
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.base_url, "http://localhost:3001");
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.retry_base_delay, DEFAULT_RETRY_BASE_DELAY);
        assert_eq!(config.messages, ErrorMessages::spanish());
        assert_eq!(config.headers.get("X-Company").map(String::as_str), Some("acme"));
    }

    #[test]
    fn file_rejects_unknown_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"base_url": "http://localhost", "retries": 4}}"#).unwrap();

        assert!(matches!(
            ClientConfig::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ClientConfig::from_file(dir.path().join("absent.json")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn validate_base_url_scheme() {
        assert!(ClientConfig::new("http://localhost").validate().is_ok());
        assert!(matches!(
            ClientConfig::new("localhost:3001").validate(),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ClientConfig::new("/").validate(),
            Err(ConfigError::MissingBaseUrl)
        ));
    }
}
