//! Outbound authentication
//!
//! Static schemes (API key, basic, bearer) resolve straight from the
//! connection credentials. OAuth client-credentials tokens are fetched from
//! the configured token endpoint and kept in an injected [`TokenCache`] until
//! they expire or a request is rejected with 401/403.
//!
//! Refreshes are single-flight: concurrent callers that find no usable token
//! queue on one refresh lock, and only the first of them talks to the token
//! endpoint. The rest pick the fresh token out of the cache.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use ratelink_core::{IntegrationError, Result};
use reqwest::{header, Client, RequestBuilder};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{AuthMethod, ConnectionConfig, DEFAULT_API_KEY_HEADER};

/// Tokens are treated as expired this long before their real expiry
pub const TOKEN_EXPIRY_SKEW_SECONDS: i64 = 30;

/// Lifetime assumed when the token endpoint omits `expires_in`
pub const DEFAULT_TOKEN_LIFETIME_SECONDS: i64 = 3600;

/// Where an API key is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeyPlacement {
    Header(String),
    Query(String),
}

/// Credential material ready to be attached to a request
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    None,
    ApiKey { placement: ApiKeyPlacement, key: String },
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::None => f.write_str("Credential::None"),
            Credential::ApiKey { placement, .. } => f
                .debug_struct("Credential::ApiKey")
                .field("placement", placement)
                .finish_non_exhaustive(),
            Credential::Basic { username, .. } => f
                .debug_struct("Credential::Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Credential::Bearer { .. } => f.write_str("Credential::Bearer { .. }"),
        }
    }
}

impl Credential {
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credential::None => request,
            Credential::ApiKey {
                placement: ApiKeyPlacement::Header(name),
                key,
            } => request.header(name.as_str(), key.as_str()),
            Credential::ApiKey {
                placement: ApiKeyPlacement::Query(param),
                key,
            } => request.query(&[(param.as_str(), key.as_str())]),
            Credential::Basic { username, password } => request.basic_auth(username, Some(password)),
            Credential::Bearer { token } => {
                request.header(header::AUTHORIZATION, format!("Bearer {}", token))
            }
        }
    }

    fn bearer_token(&self) -> Option<&str> {
        match self {
            Credential::Bearer { token } => Some(token),
            _ => None,
        }
    }
}

/// An access token and its expiry
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl CachedToken {
    pub fn new(access_token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// Usable at `now`, keeping the expiry skew in reserve
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - ChronoDuration::seconds(TOKEN_EXPIRY_SKEW_SECONDS) > now,
            None => true,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}

/// Shared store for OAuth tokens, injected at client construction
#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<CachedToken>;
    async fn put(&self, key: &str, token: CachedToken);
    async fn invalidate(&self, key: &str);
}

/// Process-local token cache
#[derive(Debug, Default)]
pub struct InMemoryTokenCache {
    tokens: DashMap<String, CachedToken>,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenCache for InMemoryTokenCache {
    async fn get(&self, key: &str) -> Option<CachedToken> {
        self.tokens.get(key).map(|entry| entry.value().clone())
    }

    async fn put(&self, key: &str, token: CachedToken) {
        self.tokens.insert(key.to_string(), token);
    }

    async fn invalidate(&self, key: &str) {
        self.tokens.remove(key);
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

/// Resolves credentials for one connection
pub struct Authenticator {
    config: Arc<ConnectionConfig>,
    http: Client,
    cache: Arc<dyn TokenCache>,
    cache_key: String,
    refresh_lock: Mutex<()>,
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("auth_method", &self.config.auth_method)
            .field("cache_key", &self.cache_key)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(config: Arc<ConnectionConfig>, http: Client, cache: Arc<dyn TokenCache>) -> Self {
        let cache_key = format!(
            "{}|{}",
            config.base_url.trim_end_matches('/'),
            config.credential("client_id").unwrap_or_default()
        );

        Self {
            config,
            http,
            cache,
            cache_key,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn method(&self) -> AuthMethod {
        self.config.auth_method
    }

    /// Credential material for the next request
    pub async fn credential(&self) -> Result<Credential> {
        match self.config.auth_method {
            AuthMethod::None => Ok(Credential::None),
            AuthMethod::ApiKey => self.api_key_credential(),
            AuthMethod::Basic => Ok(Credential::Basic {
                username: self.required("username")?.to_string(),
                password: self.required("password")?.to_string(),
            }),
            AuthMethod::Bearer => Ok(Credential::Bearer {
                token: self.required("token")?.to_string(),
            }),
            AuthMethod::OauthClientCredentials => self.oauth_credential().await,
        }
    }

    /// Drop the cached token, if it is still the one that was rejected.
    ///
    /// A concurrent caller may already have refreshed; that newer token is
    /// kept.
    pub async fn invalidate(&self, rejected: Option<&Credential>) {
        if self.config.auth_method != AuthMethod::OauthClientCredentials {
            return;
        }

        let _guard = self.refresh_lock.lock().await;
        let current = self.cache.get(&self.cache_key).await;
        let stale = match (current, rejected.and_then(Credential::bearer_token)) {
            (Some(current), Some(rejected)) => current.access_token == rejected,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if stale {
            debug!(cache_key = %self.cache_key, "Invalidating cached access token");
            self.cache.invalidate(&self.cache_key).await;
        }
    }

    fn required(&self, key: &str) -> Result<&str> {
        self.config.credential(key).ok_or_else(|| {
            IntegrationError::Configuration(format!(
                "Auth method '{}' requires credential '{}'",
                self.config.auth_method, key
            ))
        })
    }

    fn api_key_credential(&self) -> Result<Credential> {
        let key = self.required("api_key")?.to_string();
        let placement = match self.config.credential("api_key_param") {
            Some(param) => ApiKeyPlacement::Query(param.to_string()),
            None => ApiKeyPlacement::Header(
                self.config
                    .credential("api_key_header")
                    .unwrap_or(DEFAULT_API_KEY_HEADER)
                    .to_string(),
            ),
        };
        Ok(Credential::ApiKey { placement, key })
    }

    async fn oauth_credential(&self) -> Result<Credential> {
        if let Some(token) = self.cached_token().await {
            return Ok(Credential::Bearer { token });
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(token) = self.cached_token().await {
            return Ok(Credential::Bearer { token });
        }

        let token = self.fetch_token().await?;
        let access_token = token.access_token.clone();
        self.cache.put(&self.cache_key, token).await;
        Ok(Credential::Bearer { token: access_token })
    }

    async fn cached_token(&self) -> Option<String> {
        self.cache
            .get(&self.cache_key)
            .await
            .filter(CachedToken::is_fresh)
            .map(|t| t.access_token)
    }

    fn token_url(&self) -> Result<String> {
        let token_url = self.required("token_url")?;
        if token_url.starts_with("http://") || token_url.starts_with("https://") {
            return Ok(token_url.to_string());
        }
        Ok(format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            token_url.trim_start_matches('/')
        ))
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        let token_url = self.token_url()?;
        let client_id = self.required("client_id")?;
        let client_secret = self.required("client_secret")?;

        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];
        if let Some(scope) = self.config.credential("scope") {
            form.push(("scope", scope));
        }

        info!(token_url = %token_url, "Requesting OAuth access token");

        let response = self
            .http
            .post(&token_url)
            .timeout(self.config.timeout())
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Token endpoint unreachable");
                IntegrationError::authentication(format!("Token endpoint unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Token endpoint rejected client credentials");
            return Err(IntegrationError::Authentication {
                status: Some(status.as_u16()),
                message: format!("Token endpoint rejected credentials ({})", status),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            IntegrationError::authentication(format!("Malformed token response: {}", e))
        })?;

        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| IntegrationError::authentication("Token response has no access_token"))?;

        let lifetime = body
            .expires_in
            .as_ref()
            .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECONDS);

        Ok(CachedToken::new(
            access_token,
            Some(Utc::now() + ChronoDuration::seconds(lifetime)),
        ))
    }
}
