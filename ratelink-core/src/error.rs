use std::time::Duration;
use thiserror::Error;

/// Failure taxonomy shared by every integration component.
///
/// Transport-level variants keep the classification they were raised with all
/// the way out of `get_data`/`send_data`, so callers can decide whether to
/// retry at a higher level.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrationError {
    #[error("Transport error: {message}")]
    Transport { message: String, timed_out: bool },

    #[error("Authentication failed: {message}")]
    Authentication { status: Option<u16>, message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Client error ({status}): {message}")]
    Client { status: u16, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, IntegrationError>;

/// Coarse classification used for per-attempt logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Authentication,
    NotFound,
    RateLimited,
    Server,
    Client,
    Validation,
    Configuration,
    Serialization,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Authentication => "authentication",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Server => "server",
            ErrorKind::Client => "client",
            ErrorKind::Validation => "validation",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IntegrationError {
    pub fn configuration(message: impl Into<String>) -> Self {
        IntegrationError::Configuration(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        IntegrationError::Transport {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        IntegrationError::Transport {
            message: message.into(),
            timed_out: true,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        IntegrationError::Authentication {
            status: None,
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP status.
    ///
    /// 401/403 are authentication failures, 404 is not-found, 429 is a rate
    /// limit carrying the server hint, 5xx is a server error and every other
    /// 4xx is a plain client error.
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => IntegrationError::Authentication {
                status: Some(status),
                message,
            },
            404 => IntegrationError::NotFound { resource: message },
            429 => IntegrationError::RateLimited {
                retry_after,
                message,
            },
            500..=599 => IntegrationError::Server { status, message },
            _ => IntegrationError::Client { status, message },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IntegrationError::Transport { .. } => ErrorKind::Transport,
            IntegrationError::Authentication { .. } => ErrorKind::Authentication,
            IntegrationError::NotFound { .. } => ErrorKind::NotFound,
            IntegrationError::RateLimited { .. } => ErrorKind::RateLimited,
            IntegrationError::Server { .. } => ErrorKind::Server,
            IntegrationError::Client { .. } => ErrorKind::Client,
            IntegrationError::Validation(_) => ErrorKind::Validation,
            IntegrationError::Configuration(_) => ErrorKind::Configuration,
            IntegrationError::Serialization(_) => ErrorKind::Serialization,
            IntegrationError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Only transport, server and rate-limit failures are safe to repeat.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IntegrationError::Transport { .. }
                | IntegrationError::Server { .. }
                | IntegrationError::RateLimited { .. }
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            IntegrationError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            IntegrationError::Authentication { status, .. } => *status,
            IntegrationError::NotFound { .. } => Some(404),
            IntegrationError::RateLimited { .. } => Some(429),
            IntegrationError::Server { status, .. } => Some(*status),
            IntegrationError::Client { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for IntegrationError {
    fn from(err: serde_json::Error) -> Self {
        IntegrationError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(IntegrationError::from_status(401, "x", None).kind(), ErrorKind::Authentication);
        assert_eq!(IntegrationError::from_status(403, "x", None).kind(), ErrorKind::Authentication);
        assert_eq!(IntegrationError::from_status(404, "x", None).kind(), ErrorKind::NotFound);
        assert_eq!(IntegrationError::from_status(429, "x", None).kind(), ErrorKind::RateLimited);
        assert_eq!(IntegrationError::from_status(503, "x", None).kind(), ErrorKind::Server);
        assert_eq!(IntegrationError::from_status(422, "x", None).kind(), ErrorKind::Client);
    }

    #[test]
    fn test_retryable_set() {
        assert!(IntegrationError::transport("reset").is_retryable());
        assert!(IntegrationError::timeout("slow").is_retryable());
        assert!(IntegrationError::from_status(502, "bad gateway", None).is_retryable());
        assert!(IntegrationError::from_status(429, "slow down", None).is_retryable());

        assert!(!IntegrationError::from_status(401, "nope", None).is_retryable());
        assert!(!IntegrationError::from_status(404, "gone", None).is_retryable());
        assert!(!IntegrationError::from_status(400, "bad", None).is_retryable());
        assert!(!IntegrationError::configuration("bad").is_retryable());
    }

    #[test]
    fn test_rate_limit_hint_is_preserved() {
        let err = IntegrationError::from_status(429, "slow down", Some(Duration::from_secs(7)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(err.status_code(), Some(429));
    }
}
