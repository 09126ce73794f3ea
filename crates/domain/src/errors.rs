//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level error for configuration and tool input problems
///
/// HTTP failures have their own taxonomy in the infra crate; this type
/// covers what happens before a request is ever sent.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CockroachMcpError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<crate::timeseries::QuerySpecError> for CockroachMcpError {
    fn from(error: crate::timeseries::QuerySpecError) -> Self {
        Self::InvalidInput(error.to_string())
    }
}

/// Result type alias for cockroach-mcp operations
pub type Result<T> = std::result::Result<T, CockroachMcpError>;
