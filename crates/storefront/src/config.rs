//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_API_URL` - Base URL of the backend REST API (e.g. `https://shop.example.com/api`)
//!
//! ## Optional
//! - `SHOPFRONT_API_TOKEN` - Bearer token of the signed-in shopper
//! - `SHOPFRONT_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `SHOPFRONT_CATALOG_CACHE_TTL_SECS` - Product/category cache TTL (default: 300)
//! - `SHOPFRONT_PAYMENT_POLL_INTERVAL_SECS` - Payment status check interval (default: 3)
//! - `SHOPFRONT_PAYMENT_MAX_POLL_ATTEMPTS` - Status checks before giving up (default: 100)
//! - `SHOPFRONT_PAYMENT_CLOSE_DELAY_MS` - Delay before closing a paid payment view (default: 2000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
const DEFAULT_CATALOG_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
const MAX_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 100;
const DEFAULT_CLOSE_DELAY_MS: u64 = 2000;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend API connection settings
    pub api: ApiConfig,
    /// Payment confirmation polling settings
    pub payment: PaymentSettings,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production", "staging")
    pub sentry_environment: Option<String>,
}

/// Backend API configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to
    pub base_url: Url,
    /// Bearer token of the signed-in shopper, if any
    pub token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
    /// How long catalog reads stay cached
    pub catalog_cache_ttl: Duration,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("catalog_cache_ttl", &self.catalog_cache_ttl)
            .finish()
    }
}

impl ApiConfig {
    /// Configuration for a base URL with default timeouts and no token.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL does not parse or is not http(s).
    pub fn for_base_url(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("SHOPFRONT_API_URL", base_url)?,
            token: None,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CATALOG_CACHE_TTL_SECS),
        })
    }

    fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_base_url(
            "SHOPFRONT_API_URL",
            &get_required_env("SHOPFRONT_API_URL")?,
        )?;
        let token = get_optional_env("SHOPFRONT_API_TOKEN")
            .map(|value| {
                validate_secret_strength(&value, "SHOPFRONT_API_TOKEN")?;
                Ok(SecretString::from(value))
            })
            .transpose()?;
        let timeout = Duration::from_secs(get_parsed_or_default(
            "SHOPFRONT_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?);
        let catalog_cache_ttl = Duration::from_secs(get_parsed_or_default(
            "SHOPFRONT_CATALOG_CACHE_TTL_SECS",
            DEFAULT_CATALOG_CACHE_TTL_SECS,
        )?);

        Ok(Self {
            base_url,
            token,
            timeout,
            catalog_cache_ttl,
        })
    }
}

/// Payment confirmation polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentSettings {
    /// Time between two status checks
    pub poll_interval: Duration,
    /// Status checks issued before the payment is reported as not confirmed
    pub max_poll_attempts: u32,
    /// Delay between observing `paid` and closing the payment view
    pub close_delay: Duration,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            close_delay: Duration::from_millis(DEFAULT_CLOSE_DELAY_MS),
        }
    }
}

impl PaymentSettings {
    /// Upper bound on how long a payment is polled.
    #[must_use]
    pub fn max_poll_duration(&self) -> Duration {
        self.poll_interval * self.max_poll_attempts
    }

    fn from_env() -> Result<Self, ConfigError> {
        let interval_secs = get_parsed_or_default(
            "SHOPFRONT_PAYMENT_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        if !(1..=MAX_POLL_INTERVAL_SECS).contains(&interval_secs) {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_PAYMENT_POLL_INTERVAL_SECS".to_string(),
                format!("must be between 1 and {MAX_POLL_INTERVAL_SECS} (got {interval_secs})"),
            ));
        }

        let max_poll_attempts = get_parsed_or_default(
            "SHOPFRONT_PAYMENT_MAX_POLL_ATTEMPTS",
            DEFAULT_MAX_POLL_ATTEMPTS,
        )?;
        if max_poll_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_PAYMENT_MAX_POLL_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let close_delay_ms =
            get_parsed_or_default("SHOPFRONT_PAYMENT_CLOSE_DELAY_MS", DEFAULT_CLOSE_DELAY_MS)?;

        Ok(Self {
            poll_interval: Duration::from_secs(interval_secs),
            max_poll_attempts,
            close_delay: Duration::from_millis(close_delay_ms),
        })
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API token fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            api: ApiConfig::from_env()?,
            payment: PaymentSettings::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to a default when unset.
fn get_parsed_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse the API base URL. Only http(s) URLs are accepted.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the token issued at login."
            ),
        ));
    }

    Ok(())
}
