//! Odoo connection configuration.
//!
//! The host settings store may be partially filled in, so every connection
//! setting is optional here. Completeness is checked by
//! [`OdooConfig::credentials`] right before a sync session is opened, which
//! lets a batch fail fast with [`SyncError::ConfigIncomplete`] without any
//! RPC traffic.
//!
//! # Environment Variables
//!
//! ## Connection (all needed before a sync can run)
//! - `ODOO_URL` - Instance URL, must be `https://` and end with `/`
//! - `ODOO_USERNAME` - Login of the integration user
//! - `ODOO_API_KEY` - API key of the integration user (min 20 chars)
//! - `ODOO_DATABASE` - Database name (see `discovery::list_databases`)
//!
//! ## Optional
//! - `ODOO_RPC_PREFIX` - Path of the XML-RPC endpoints (default: `xmlrpc/2`)
//! - `ODOO_TIMEOUT_SECS` - Per-call timeout in seconds (default: 30)

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::error::SyncError;

/// Minimum API key length accepted by the settings page.
pub const MIN_API_KEY_LENGTH: usize = 20;
/// Default per-call timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default path of the XML-RPC endpoints below the instance URL.
pub const DEFAULT_RPC_PREFIX: &str = "xmlrpc/2";

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading or validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid setting {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Odoo connection settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct OdooConfig {
    /// Instance URL (validated: https, trailing `/`)
    pub base_url: Option<Url>,
    /// Integration user login
    pub username: Option<String>,
    /// Integration user API key
    pub api_key: Option<SecretString>,
    /// Database name
    pub database: Option<String>,
    /// Path of the XML-RPC endpoints below `base_url`
    pub rpc_prefix: String,
    /// Upper bound on the duration of a single call
    pub timeout: Duration,
}

impl Default for OdooConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            username: None,
            api_key: None,
            database: None,
            rpc_prefix: DEFAULT_RPC_PREFIX.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl std::fmt::Debug for OdooConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdooConfig")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("username", &self.username)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("database", &self.database)
            .field("rpc_prefix", &self.rpc_prefix)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A complete set of connection credentials.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct Credentials {
    pub base_url: Url,
    pub username: String,
    pub api_key: SecretString,
    pub database: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("api_key", &"[REDACTED]")
            .field("database", &self.database)
            .finish()
    }
}

impl OdooConfig {
    /// Build a validated configuration from settings-page values.
    ///
    /// Empty strings are treated as "not set".
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL is not https or does
    /// not end with `/`, or if the API key is shorter than 20 characters.
    pub fn new(
        base_url: &str,
        username: &str,
        api_key: &str,
        database: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: non_empty(base_url)
                .map(|raw| validate_base_url(&raw, "base_url"))
                .transpose()?,
            username: non_empty(username),
            api_key: non_empty(api_key)
                .map(|raw| validate_api_key(raw, "api_key"))
                .transpose()?,
            database: non_empty(database),
            ..Self::default()
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present. Missing
    /// connection settings are left unset; present ones are validated.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a present value fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = get_optional_env("ODOO_URL")
            .map(|raw| validate_base_url(&raw, "ODOO_URL"))
            .transpose()?;
        let api_key = get_optional_env("ODOO_API_KEY")
            .map(|raw| validate_api_key(raw, "ODOO_API_KEY"))
            .transpose()?;
        let timeout_secs = get_env_or_default("ODOO_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar("ODOO_TIMEOUT_SECS".to_string(), e.to_string()))?;
        let rpc_prefix = get_env_or_default("ODOO_RPC_PREFIX", DEFAULT_RPC_PREFIX)
            .trim_matches('/')
            .to_string();

        Ok(Self {
            base_url,
            username: get_optional_env("ODOO_USERNAME"),
            api_key,
            database: get_optional_env("ODOO_DATABASE"),
            rpc_prefix,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Return complete credentials, or name every missing setting.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::ConfigIncomplete` if the URL, username, API key
    /// or database is not set.
    pub fn credentials(&self) -> Result<Credentials, SyncError> {
        let mut missing = Vec::new();
        if self.base_url.is_none() {
            missing.push("url");
        }
        if self.username.is_none() {
            missing.push("username");
        }
        if self.api_key.is_none() {
            missing.push("api key");
        }
        if self.database.is_none() {
            missing.push("database");
        }

        match (&self.base_url, &self.username, &self.api_key, &self.database) {
            (Some(base_url), Some(username), Some(api_key), Some(database)) => Ok(Credentials {
                base_url: base_url.clone(),
                username: username.clone(),
                api_key: api_key.clone(),
                database: database.clone(),
            }),
            _ => Err(SyncError::ConfigIncomplete(format!(
                "missing {}",
                missing.join(", ")
            ))),
        }
    }

    /// Whether the instance is hosted on odoo.com (database = subdomain).
    #[must_use]
    pub fn is_saas(&self) -> bool {
        self.base_url
            .as_ref()
            .and_then(Url::host_str)
            .is_some_and(|host| host.ends_with(".odoo.com"))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| non_empty(&v))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Validate the instance URL: https scheme, a host, and a trailing `/`.
fn validate_base_url(raw: &str, var_name: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidEnvVar(var_name.to_string(), reason.to_string());

    if !raw.ends_with('/') {
        return Err(invalid("must end with a forward slash (/)"));
    }
    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "https" {
        return Err(invalid("must start with https://"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("must include a host"));
    }
    Ok(url)
}

/// Validate the API key length; warn (only) about weak-looking keys.
fn validate_api_key(raw: String, var_name: &str) -> Result<SecretString, ConfigError> {
    if raw.len() < MIN_API_KEY_LENGTH {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!(
                "must be at least {MIN_API_KEY_LENGTH} characters (got {})",
                raw.len()
            ),
        ));
    }
    if let Err(e) = validate_secret_strength(&raw, var_name) {
        tracing::warn!("{var_name} validation warning: {e}");
    }
    Ok(SecretString::from(raw))
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

/// Check that a secret is not a placeholder and has plausible entropy.
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

/// Expose the API key for the one place that must send it.
pub(crate) fn api_key_str(credentials: &Credentials) -> &str {
    credentials.api_key.expose_secret()
}
