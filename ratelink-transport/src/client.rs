//! HTTP transport client
//!
//! [`TransportClient`] performs one logical vendor call: it resolves
//! credentials, sends the request, classifies the outcome and retries the
//! retryable classes with backoff. Each attempt is reported to the injected
//! [`RequestLogger`] with query parameters and headers redacted.
//!
//! The client is cheap to clone. Clones share the reqwest connection pool,
//! the authenticator and its token cache, so one instance may be used from
//! many tasks at once; the only mutable state is the token cache, which is
//! guarded by a single-refresh lock.

use ratelink_core::{ConnectionTestResult, IntegrationError, Result};
use reqwest::{header, Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::auth::{Authenticator, Credential, InMemoryTokenCache, TokenCache};
use crate::config::ConnectionConfig;
use crate::logging::{AttemptOutcome, RequestAttempt, RequestLogger, TracingRequestLogger};
use crate::redact::Redactor;
use crate::retry::RetryPolicy;

/// Longest slice of an error body carried into error messages
const ERROR_BODY_LIMIT: usize = 512;

/// Default user agent
pub const DEFAULT_USER_AGENT: &str = concat!("ratelink/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    fn as_reqwest(&self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Patch => Method::PATCH,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = IntegrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            other => Err(IntegrationError::Validation(format!(
                "Unsupported HTTP method '{}'",
                other
            ))),
        }
    }
}

impl serde::Serialize for HttpMethod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for HttpMethod {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-call options for [`TransportClient::request`]
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
    /// Overrides the connection timeout; must be greater than zero
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn with_query_pairs<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Successful response: the parsed JSON body, or the raw text as a string
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    pub is_json: bool,
}

impl ApiResponse {
    fn from_text(status: u16, text: String) -> Self {
        if text.trim().is_empty() {
            return Self {
                status,
                body: Value::Null,
                is_json: false,
            };
        }
        match serde_json::from_str(&text) {
            Ok(body) => Self {
                status,
                body,
                is_json: true,
            },
            Err(_) => Self {
                status,
                body: Value::String(text),
                is_json: false,
            },
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone()).map_err(IntegrationError::from)
    }
}

/// Builder for [`TransportClient`]
pub struct TransportClientBuilder {
    config: ConnectionConfig,
    token_cache: Option<Arc<dyn TokenCache>>,
    logger: Option<Arc<dyn RequestLogger>>,
    retry_policy: Option<RetryPolicy>,
    redactor: Option<Redactor>,
}

impl TransportClientBuilder {
    pub fn token_cache(mut self, cache: Arc<dyn TokenCache>) -> Self {
        self.token_cache = Some(cache);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn RequestLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = Some(redactor);
        self
    }

    pub fn build(self) -> Result<TransportClient> {
        let config = self.config;
        config.ensure_valid()?;

        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        for (name, value) in &config.headers {
            let name = header::HeaderName::try_from(name.as_str()).map_err(|_| {
                IntegrationError::Configuration(format!("Invalid header name '{}'", name))
            })?;
            let value = header::HeaderValue::try_from(value.as_str()).map_err(|_| {
                IntegrationError::Configuration(format!("Invalid value for header '{}'", name))
            })?;
            headers.insert(name, value);
        }

        let user_agent = config.user_agent.clone().unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(user_agent)
            .default_headers(headers)
            .danger_accept_invalid_certs(!config.verify_tls)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| IntegrationError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        let retry = self
            .retry_policy
            .unwrap_or_else(|| RetryPolicy::from_config(&config));
        let config = Arc::new(config);
        let cache = self
            .token_cache
            .unwrap_or_else(|| Arc::new(InMemoryTokenCache::new()));
        let auth = Authenticator::new(config.clone(), http.clone(), cache);

        Ok(TransportClient {
            http,
            config,
            auth: Arc::new(auth),
            retry,
            logger: self
                .logger
                .unwrap_or_else(|| Arc::new(TracingRequestLogger::new())),
            redactor: Arc::new(self.redactor.unwrap_or_default()),
        })
    }
}

/// Client for one vendor connection
#[derive(Clone)]
pub struct TransportClient {
    http: Client,
    config: Arc<ConnectionConfig>,
    auth: Arc<Authenticator>,
    retry: RetryPolicy,
    logger: Arc<dyn RequestLogger>,
    redactor: Arc<Redactor>,
}

impl fmt::Debug for TransportClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportClient")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl TransportClient {
    /// Create a client with the default logger, token cache and retry policy
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: ConnectionConfig) -> TransportClientBuilder {
        TransportClientBuilder {
            config,
            token_cache: None,
            logger: None,
            retry_policy: None,
            redactor: None,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Full URL for a path; absolute URLs are used as given
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return base.to_string();
        }
        format!("{}/{}", base, path)
    }

    /// Resolve credentials, fetching an OAuth token if none is cached
    pub async fn authenticate(&self) -> Result<Credential> {
        self.auth.credential().await
    }

    /// Forget any cached token
    pub async fn invalidate_credentials(&self) {
        self.auth.invalidate(None).await;
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<ApiResponse> {
        self.request(HttpMethod::Get, path, options).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<ApiResponse> {
        self.request(HttpMethod::Post, path, RequestOptions::new().with_body(body))
            .await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<ApiResponse> {
        self.request(HttpMethod::Put, path, RequestOptions::new().with_body(body))
            .await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<ApiResponse> {
        self.request(HttpMethod::Patch, path, RequestOptions::new().with_body(body))
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.request(HttpMethod::Delete, path, RequestOptions::new()).await
    }

    /// Execute one logical call with retry.
    ///
    /// Transport, server and rate-limit failures are retried up to
    /// `max_retries` times; everything else is returned after the first
    /// attempt. An authentication failure also drops the cached token so the
    /// next call re-authenticates.
    pub async fn request(&self, method: HttpMethod, path: &str, options: RequestOptions) -> Result<ApiResponse> {
        let timeout = options.timeout.unwrap_or_else(|| self.config.timeout());
        if timeout.is_zero() {
            return Err(IntegrationError::Validation(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        let url = self.url(path);
        let logged_endpoint = self.redactor.redact_url(&url);
        let logged_query = self.redactor.pairs_to_json(&options.query);
        let logged_headers = {
            let mut merged: BTreeMap<String, String> = self.config.headers.clone();
            merged.extend(options.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
            let pairs: Vec<(String, String)> = merged.into_iter().collect();
            self.redactor.pairs_to_json(&pairs)
        };

        let mut attempt: u32 = 0;
        loop {
            let started = Instant::now();
            let (result, credential) = self.execute_once(method, &url, path, &options, timeout).await;
            let latency = started.elapsed();

            let mut entry = RequestAttempt {
                method,
                endpoint: logged_endpoint.clone(),
                attempt,
                outcome: AttemptOutcome::Success,
                status: None,
                latency,
                query: logged_query.clone(),
                headers: logged_headers.clone(),
                detail: None,
            };

            match result {
                Ok(response) => {
                    entry.status = Some(response.status);
                    self.logger.log_attempt(&entry);
                    return Ok(response);
                }
                Err(err) => {
                    entry.status = err.status_code();
                    entry.detail = Some(self.redactor.redact_text(&err.to_string()));

                    if matches!(err, IntegrationError::Authentication { .. }) {
                        self.auth.invalidate(credential.as_ref()).await;
                    }

                    if err.is_retryable() && self.retry.should_retry(attempt) {
                        let delay = self.retry.delay_for(attempt, err.retry_after());
                        entry.outcome = AttemptOutcome::Retrying {
                            kind: err.kind(),
                            delay,
                        };
                        self.logger.log_attempt(&entry);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    entry.outcome = AttemptOutcome::Failed { kind: err.kind() };
                    self.logger.log_attempt(&entry);
                    return Err(err);
                }
            }
        }
    }

    async fn execute_once(
        &self,
        method: HttpMethod,
        url: &str,
        path: &str,
        options: &RequestOptions,
        timeout: Duration,
    ) -> (Result<ApiResponse>, Option<Credential>) {
        let credential = match self.auth.credential().await {
            Ok(credential) => credential,
            Err(err) => return (Err(err), None),
        };

        let mut request = self
            .http
            .request(method.as_reqwest(), url)
            .timeout(timeout);

        if !options.query.is_empty() {
            request = request.query(&options.query);
        }

        for (name, value) in &options.headers {
            let parsed = header::HeaderName::try_from(name.as_str())
                .ok()
                .zip(header::HeaderValue::try_from(value.as_str()).ok());
            match parsed {
                Some((name, value)) => request = request.header(name, value),
                None => {
                    return (
                        Err(IntegrationError::Validation(format!("Invalid request header '{}'", name))),
                        Some(credential),
                    )
                }
            }
        }

        if let Some(body) = &options.body {
            request = request.json(body);
        }

        request = credential.apply(request);

        let result = self.send(request, method, path).await;
        (result, Some(credential))
    }

    async fn send(&self, request: reqwest::RequestBuilder, method: HttpMethod, path: &str) -> Result<ApiResponse> {
        let response = request.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let text = response.text().await.map_err(classify_reqwest_error)?;

        if status.is_success() {
            return Ok(ApiResponse::from_text(status.as_u16(), text));
        }

        let message = if status.as_u16() == 404 {
            format!("{} {}", method, path)
        } else {
            error_message(status, &text, &self.redactor)
        };

        Err(IntegrationError::from_status(status.as_u16(), message, retry_after))
    }

    /// Lightweight authenticated request; never returns an error
    pub async fn test_connection(&self, check_path: Option<&str>) -> ConnectionTestResult {
        let path = check_path.unwrap_or("/");

        match self.authenticate().await {
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "Connection test failed during authentication");
                return ConnectionTestResult::failed(err.to_string());
            }
        }

        match self.request(HttpMethod::Get, path, RequestOptions::new()).await {
            Ok(response) => {
                info!(status = response.status, "Connection test succeeded");
                ConnectionTestResult::ok(format!("Connected to {} ({})", self.config.base_url, response.status))
            }
            Err(err) => {
                warn!(error = %err, kind = %err.kind(), "Connection test failed");
                ConnectionTestResult::failed(err.to_string())
            }
        }
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> IntegrationError {
    if err.is_timeout() {
        IntegrationError::timeout(format!("Request timed out: {}", err))
    } else if err.is_builder() {
        IntegrationError::Validation(format!("Invalid request: {}", err))
    } else {
        IntegrationError::transport(err.to_string())
    }
}

fn error_message(status: reqwest::StatusCode, body: &str, redactor: &Redactor) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("Unexpected status")
            .to_string();
    }

    let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    redactor.redact_text(&snippet)
}

/// `Retry-After` as delta-seconds or an HTTP date
fn parse_retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    let raw = headers.get(header::RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = chrono::DateTime::parse_from_rfc2822(raw).ok()?;
    let wait = at.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}
