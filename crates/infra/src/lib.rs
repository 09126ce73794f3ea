//! # Cockroach MCP Infrastructure
//!
//! Outbound clients for a CockroachDB cluster.
//!
//! This crate contains:
//! - The cluster management API client (session login, cookie auth,
//!   single re-login on 401)
//! - The timeseries client, wrapped in retry and a circuit breaker
//! - The shared response decoder for both wire formats
//! - Configuration loading from the environment and config files
//!
//! ## Architecture
//! - Builds on the resilience primitives in `cockroach-mcp-common`
//! - Uses the configuration and timeseries types from `cockroach-mcp-domain`
//! - Contains all "impure" code (network and file I/O)

pub mod clusterapi;
pub mod config;
pub mod decode;
pub mod errors;
pub mod http;
pub mod tsdb;

// Re-export commonly used items
pub use clusterapi::{
    Authenticator, ClusterApiClient, PasswordAuthenticator, Session, SessionSnapshot,
    SessionStore,
};
pub use decode::{decode, DecodeError, Wire};
pub use errors::{ApiError, ApiErrorCategory};
pub use http::HttpClient;
pub use tsdb::{TransientErrors, TsdbClient, TsdbClientConfig};
