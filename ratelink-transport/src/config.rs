//! Connection configuration
//!
//! A [`ConnectionConfig`] describes how to reach one vendor system. It is
//! consumed from configuration or secret storage and is immutable for the
//! lifetime of the client built from it; rotating credentials means building
//! a new client.

use ratelink_core::{IntegrationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

/// Default header used for API key authentication
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Supported outbound authentication schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum AuthMethod {
    ApiKey,
    OauthClientCredentials,
    Basic,
    Bearer,
    None,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::ApiKey => "api_key",
            AuthMethod::OauthClientCredentials => "oauth_client_credentials",
            AuthMethod::Basic => "basic",
            AuthMethod::Bearer => "bearer",
            AuthMethod::None => "none",
        }
    }

    /// Credential keys that must be present for this method
    pub fn required_credentials(&self) -> &'static [&'static str] {
        match self {
            AuthMethod::ApiKey => &["api_key"],
            AuthMethod::OauthClientCredentials => &["token_url", "client_id", "client_secret"],
            AuthMethod::Basic => &["username", "password"],
            AuthMethod::Bearer => &["token"],
            AuthMethod::None => &[],
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = IntegrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api_key" | "apikey" => Ok(AuthMethod::ApiKey),
            "oauth_client_credentials" | "oauth2" | "oauth" => Ok(AuthMethod::OauthClientCredentials),
            "basic" => Ok(AuthMethod::Basic),
            "bearer" => Ok(AuthMethod::Bearer),
            "none" | "" => Ok(AuthMethod::None),
            other => Err(IntegrationError::Configuration(format!(
                "Unsupported auth method '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for AuthMethod {
    type Error = IntegrationError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Configuration for one vendor connection
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct ConnectionConfig {
    /// Base URL for the vendor API
    #[validate(url)]
    pub base_url: String,

    /// Authentication method
    pub auth_method: AuthMethod,

    /// Secrets for the auth method; shape depends on the method
    #[serde(default)]
    pub auth_credentials: BTreeMap<String, String>,

    /// Headers added to every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Per-request timeout
    #[serde(default = "default_timeout_seconds")]
    #[validate(range(min = 1))]
    pub timeout_seconds: u64,

    /// Retries after the first attempt for retryable failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Verify the server certificate chain
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,

    /// Base delay for exponential backoff
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound for any single backoff wait
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// User agent override
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_verify_tls() -> bool {
    true
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let credential_keys: Vec<&String> = self.auth_credentials.keys().collect();
        f.debug_struct("ConnectionConfig")
            .field("base_url", &self.base_url)
            .field("auth_method", &self.auth_method)
            .field("auth_credentials", &credential_keys)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_retries", &self.max_retries)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

impl ConnectionConfig {
    /// Create a configuration with defaults for everything but URL and auth
    pub fn new(base_url: impl Into<String>, auth_method: AuthMethod) -> Self {
        Self {
            base_url: base_url.into(),
            auth_method,
            auth_credentials: BTreeMap::new(),
            headers: BTreeMap::new(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            verify_tls: default_verify_tls(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            user_agent: None,
        }
    }

    /// Parse from JSON, surfacing any problem as a configuration error
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| IntegrationError::Configuration(format!("Invalid connection config: {}", e)))?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Parse from an already-decoded JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| IntegrationError::Configuration(format!("Invalid connection config: {}", e)))?;
        config.ensure_valid()?;
        Ok(config)
    }

    pub fn with_credential(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth_credentials.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.retry_base_delay_ms = base.as_millis() as u64;
        self.retry_max_delay_ms = max.as_millis() as u64;
        self
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn credential(&self, key: &str) -> Option<&str> {
        self.auth_credentials
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Validate the configuration before any network activity
    pub fn ensure_valid(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(IntegrationError::configuration("Base URL cannot be empty"));
        }

        self.validate()
            .map_err(|e| IntegrationError::Configuration(format!("Invalid connection config: {}", e)))?;

        let missing: Vec<&str> = self
            .auth_method
            .required_credentials()
            .iter()
            .copied()
            .filter(|key| self.credential(key).is_none())
            .collect();

        if !missing.is_empty() {
            return Err(IntegrationError::Configuration(format!(
                "Auth method '{}' requires credentials: {}",
                self.auth_method,
                missing.join(", ")
            )));
        }

        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(IntegrationError::configuration(
                "retry_base_delay_ms cannot exceed retry_max_delay_ms",
            ));
        }

        Ok(())
    }
}
