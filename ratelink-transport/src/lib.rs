//! Ratelink transport
//!
//! Outbound HTTP for vendor integrations. A [`TransportClient`] executes one
//! logical call against a vendor API with:
//!
//! - **Auth injection**: API key, basic, bearer or OAuth client credentials
//! - **Bounded retry**: exponential backoff with jitter for transport, server
//!   and rate-limit failures, honouring `Retry-After`
//! - **Fixed failure taxonomy**: every failure surfaces as a classified
//!   [`IntegrationError`](ratelink_core::IntegrationError)
//! - **Redacted attempt logs**: one entry per attempt through an injected
//!   [`RequestLogger`]
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ratelink_transport::{AuthMethod, ConnectionConfig, HttpMethod, RequestOptions, TransportClient};
//!
//! # async fn run() -> ratelink_core::Result<()> {
//! let config = ConnectionConfig::new("https://billing.example.com/api", AuthMethod::ApiKey)
//!     .with_credential("api_key", "secret")
//!     .with_max_retries(3);
//!
//! let client = TransportClient::new(config)?;
//! let response = client
//!     .request(HttpMethod::Get, "/timekeepers", RequestOptions::new().with_query("limit", 100))
//!     .await?;
//! println!("{}", response.body);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod logging;
pub mod redact;
pub mod retry;

pub use auth::{ApiKeyPlacement, Authenticator, CachedToken, Credential, InMemoryTokenCache, TokenCache};
pub use client::{ApiResponse, HttpMethod, RequestOptions, TransportClient, TransportClientBuilder};
pub use config::{AuthMethod, ConnectionConfig, DEFAULT_API_KEY_HEADER};
pub use logging::{AttemptOutcome, MemoryRequestLogger, RequestAttempt, RequestLogger, TracingRequestLogger};
pub use redact::{Redactor, REDACTED};
pub use retry::{JitterStrategy, RetryPolicy};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
