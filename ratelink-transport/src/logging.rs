//! Per-attempt structured logging.
//!
//! Every HTTP attempt produces one [`RequestAttempt`]. It is handed to the
//! [`RequestLogger`] injected at client construction and dropped when the call
//! returns; nothing is persisted. Query parameters and headers on the attempt
//! are already redacted by the client.

use ratelink_core::ErrorKind;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::client::HttpMethod;

/// What happened to one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success,
    Retrying { kind: ErrorKind, delay: Duration },
    Failed { kind: ErrorKind },
}

impl AttemptOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Retrying { .. } => "retrying",
            AttemptOutcome::Failed { .. } => "failed",
        }
    }
}

/// One HTTP attempt, as seen by the retry loop
#[derive(Debug, Clone)]
pub struct RequestAttempt {
    pub method: HttpMethod,
    pub endpoint: String,
    /// 0-based attempt index
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub status: Option<u16>,
    pub latency: Duration,
    pub query: Value,
    pub headers: Value,
    pub detail: Option<String>,
}

/// Sink for per-attempt log entries
pub trait RequestLogger: Send + Sync {
    fn log_attempt(&self, attempt: &RequestAttempt);
}

/// Default logger emitting one `tracing` event per attempt
#[derive(Debug, Clone, Default)]
pub struct TracingRequestLogger {
    vendor: Option<String>,
}

impl TracingRequestLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_vendor(vendor: impl Into<String>) -> Self {
        Self {
            vendor: Some(vendor.into()),
        }
    }
}

impl RequestLogger for TracingRequestLogger {
    fn log_attempt(&self, attempt: &RequestAttempt) {
        let vendor = self.vendor.as_deref().unwrap_or("-");
        let latency_ms = attempt.latency.as_millis() as u64;
        let detail = attempt.detail.as_deref().unwrap_or("");

        match &attempt.outcome {
            AttemptOutcome::Success => info!(
                vendor,
                method = %attempt.method,
                endpoint = %attempt.endpoint,
                attempt = attempt.attempt,
                status = attempt.status,
                latency_ms,
                query = %attempt.query,
                headers = %attempt.headers,
                outcome = "success",
                "Vendor request completed"
            ),
            AttemptOutcome::Retrying { kind, delay } => warn!(
                vendor,
                method = %attempt.method,
                endpoint = %attempt.endpoint,
                attempt = attempt.attempt,
                status = attempt.status,
                latency_ms,
                query = %attempt.query,
                headers = %attempt.headers,
                error_kind = %kind,
                wait_ms = delay.as_millis() as u64,
                detail,
                outcome = "retrying",
                "Vendor request failed, retrying with backoff"
            ),
            AttemptOutcome::Failed { kind } => error!(
                vendor,
                method = %attempt.method,
                endpoint = %attempt.endpoint,
                attempt = attempt.attempt,
                status = attempt.status,
                latency_ms,
                query = %attempt.query,
                headers = %attempt.headers,
                error_kind = %kind,
                detail,
                outcome = "failed",
                "Vendor request failed"
            ),
        }
    }
}

/// Logger that keeps attempts in memory, for diagnostics and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryRequestLogger {
    attempts: Arc<Mutex<Vec<RequestAttempt>>>,
}

impl MemoryRequestLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> Vec<RequestAttempt> {
        self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.attempts.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.clear();
        }
    }
}

impl RequestLogger for MemoryRequestLogger {
    fn log_attempt(&self, attempt: &RequestAttempt) {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(attempt.clone());
        }
    }
}
