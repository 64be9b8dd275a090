//! Error types shared by the analyzer, the LLM adapter and the comparator.
//!
//! Configuration problems surface when an analyzer is built, never per call.
//! Input problems are recoverable and, inside a batch, stay attached to the
//! failing item.

use serde::Serialize;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, SentimentError>;

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SentimentError {
    /// The value handed in is not text (non-string JSON, invalid UTF-8, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Thresholds, windows or multipliers out of range.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failure at the LLM boundary.
    #[error("external service error: {0}")]
    ExternalService(#[from] ExternalServiceError),
}

/// Distinguished failure kinds of the remote classifier.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExternalServiceError {
    #[error("request timed out")]
    Timeout,

    #[error("authentication failed: {message}")]
    AuthFailure { message: String },

    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("service unreachable: {message}")]
    Unreachable { message: String },

    #[error("malformed response: {message}")]
    MalformedResponse { message: String },
}

impl SentimentError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// True for errors coming from the LLM boundary.
    pub fn is_external(&self) -> bool {
        matches!(self, Self::ExternalService(_))
    }
}

impl ExternalServiceError {
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::AuthFailure {
            message: msg.into(),
        }
    }

    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::Unreachable {
            message: msg.into(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: msg.into(),
        }
    }

    /// Only timeouts and rate limits are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::RateLimited { .. })
    }

    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::AuthFailure { .. } => "auth_failure",
            Self::RateLimited { .. } => "rate_limited",
            Self::Unreachable { .. } => "unreachable",
            Self::MalformedResponse { .. } => "malformed_response",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_matches_error_kind() {
        assert!(ExternalServiceError::Timeout.is_retryable());
        assert!(ExternalServiceError::RateLimited {
            retry_after_secs: Some(2)
        }
        .is_retryable());
        assert!(!ExternalServiceError::auth("bad key").is_retryable());
        assert!(!ExternalServiceError::unreachable("dns").is_retryable());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let e = SentimentError::invalid_input("expected text, got number");
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["kind"], "invalid_input");
        assert_eq!(v["detail"], "expected text, got number");

        let e: SentimentError = ExternalServiceError::Timeout.into();
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["kind"], "external_service");
        assert_eq!(v["detail"]["kind"], "timeout");
    }
}
