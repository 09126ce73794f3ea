//! Configuration structures
//!
//! Loading from the environment or a file lives in the infra crate; these
//! types only describe the shape and defaults.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CLUSTER_API_URL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TSDB_URL};
use crate::errors::{CockroachMcpError, Result};

/// Username and password for the cluster management API
///
/// `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authentication applied to the timeseries endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TsdbAuth {
    /// Requests are sent without credentials
    #[default]
    None,
    /// HTTP basic auth with the cluster API credential
    Basic,
}

impl FromStr for TsdbAuth {
    type Err = CockroachMcpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "basic" => Ok(Self::Basic),
            other => Err(CockroachMcpError::Config(format!(
                "unknown timeseries auth mode '{other}' (expected 'none' or 'basic')"
            ))),
        }
    }
}

/// Cluster management API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterApiConfig {
    #[serde(default = "default_cluster_api_url")]
    pub base_url: String,
    pub credential: Credential,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Accept self-signed certificates
    #[serde(default)]
    pub insecure_tls: bool,
}

impl ClusterApiConfig {
    pub fn new(base_url: impl Into<String>, credential: Credential) -> Self {
        Self {
            base_url: base_url.into(),
            credential,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            insecure_tls: false,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Timeseries endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TsdbConfig {
    #[serde(default = "default_tsdb_url")]
    pub url: String,
    #[serde(default)]
    pub auth: TsdbAuth,
}

impl Default for TsdbConfig {
    fn default() -> Self {
        Self { url: default_tsdb_url(), auth: TsdbAuth::None }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub cluster_api: ClusterApiConfig,
    #[serde(default)]
    pub tsdb: TsdbConfig,
}

impl AppConfig {
    /// Check values that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.cluster_api.base_url.trim().is_empty() {
            return Err(CockroachMcpError::Config("cluster API URL must not be empty".into()));
        }
        if self.cluster_api.credential.username.is_empty() {
            return Err(CockroachMcpError::Config("cluster API username must not be empty".into()));
        }
        if self.cluster_api.timeout_secs == 0 {
            return Err(CockroachMcpError::Config("request timeout must be greater than 0".into()));
        }
        if self.tsdb.url.trim().is_empty() {
            return Err(CockroachMcpError::Config("timeseries URL must not be empty".into()));
        }
        Ok(())
    }
}

fn default_cluster_api_url() -> String {
    DEFAULT_CLUSTER_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_tsdb_url() -> String {
    DEFAULT_TSDB_URL.to_string()
}
