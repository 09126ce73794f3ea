//! API-specific error types
//!
//! Provides error classification for calls to the cluster management API
//! and the timeseries endpoint.

use std::time::Duration;

use cockroach_mcp_common::resilience::{AttemptTimeout, ResilienceError, RetryError};
use cockroach_mcp_domain::constants::ERROR_BODY_SNIPPET_LEN;
use cockroach_mcp_domain::{CockroachMcpError, QuerySpecError};
use reqwest::StatusCode;
use thiserror::Error;

use crate::decode::DecodeError;

/// Categories of API errors for logging and retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Login rejected or session could not be re-established
    Authentication,
    /// Network/connection errors and timeouts - retryable
    Transport,
    /// Rate limiting errors (429) - retryable
    RateLimit,
    /// Server errors (5xx) - retryable
    Server,
    /// Client errors (4xx except auth) - non-retryable
    Client,
    /// Dependency is shielded by an open circuit breaker
    Unavailable,
    /// Response body did not have the expected shape
    Decode,
    /// Configuration or request construction errors - non-retryable
    Config,
    /// Caller aborted the call
    Cancelled,
}

impl ApiErrorCategory {
    /// Short label for structured log fields
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Transport => "transport",
            Self::RateLimit => "rate_limit",
            Self::Server => "server",
            Self::Client => "client",
            Self::Unavailable => "unavailable",
            Self::Decode => "decode",
            Self::Config => "config",
            Self::Cancelled => "cancelled",
        }
    }
}

/// API operation errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("login rejected with status {status}: {body}")]
    Auth { status: u16, body: String },

    #[error("login succeeded but the response carried no session cookie")]
    MissingToken,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request still unauthorized after re-authentication: {body}")]
    UnauthorizedRetryExhausted { body: String },

    #[error("request failed with status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] DecodeError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Build an [`ApiError::HttpStatus`] with a truncated body
    pub fn http_status(status: StatusCode, body: &str) -> Self {
        Self::HttpStatus { status: status.as_u16(), body: body_snippet(body) }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Auth { .. } | Self::MissingToken | Self::UnauthorizedRetryExhausted { .. } => {
                ApiErrorCategory::Authentication
            }
            Self::Transport(_) | Self::Timeout(_) => ApiErrorCategory::Transport,
            Self::HttpStatus { status, .. } => match *status {
                429 => ApiErrorCategory::RateLimit,
                500..=599 => ApiErrorCategory::Server,
                _ => ApiErrorCategory::Client,
            },
            Self::CircuitOpen { .. } => ApiErrorCategory::Unavailable,
            Self::Decode(_) => ApiErrorCategory::Decode,
            Self::Config(_) | Self::InvalidRequest(_) => ApiErrorCategory::Config,
            Self::Cancelled => ApiErrorCategory::Cancelled,
        }
    }

    /// Check if a transient retry could succeed
    pub fn should_retry(&self) -> bool {
        matches!(
            self.category(),
            ApiErrorCategory::Transport | ApiErrorCategory::RateLimit | ApiErrorCategory::Server
        )
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::HttpStatus { status, .. } => Some(*status),
            Self::UnauthorizedRetryExhausted { .. } => Some(StatusCode::UNAUTHORIZED.as_u16()),
            _ => None,
        }
    }
}

/// Truncate a response body for inclusion in an error message
pub fn body_snippet(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(ERROR_BODY_SNIPPET_LEN) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

impl From<AttemptTimeout> for ApiError {
    fn from(timeout: AttemptTimeout) -> Self {
        Self::Timeout(timeout.0)
    }
}

impl From<RetryError<ApiError>> for ApiError {
    fn from(err: RetryError<ApiError>) -> Self {
        match err {
            RetryError::AttemptsExhausted { source, .. } | RetryError::NonRetryable { source, .. } => {
                source
            }
            RetryError::Cancelled { .. } => Self::Cancelled,
            RetryError::TimeoutExceeded { budget, .. } => Self::Timeout(budget),
        }
    }
}

impl From<ResilienceError<ApiError>> for ApiError {
    fn from(err: ResilienceError<ApiError>) -> Self {
        match err {
            ResilienceError::CircuitOpen { name } => Self::CircuitOpen { name },
            ResilienceError::OperationFailed { source } => source,
        }
    }
}

/// Convert from CockroachMcpError to ApiError
impl From<CockroachMcpError> for ApiError {
    fn from(err: CockroachMcpError) -> Self {
        match err {
            CockroachMcpError::Config(message) | CockroachMcpError::Internal(message) => {
                Self::Config(message)
            }
            CockroachMcpError::InvalidInput(message) => Self::InvalidRequest(message),
        }
    }
}

impl From<QuerySpecError> for ApiError {
    fn from(err: QuerySpecError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}
