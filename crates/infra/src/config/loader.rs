//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. If both credential variables are set, loads from the environment;
//!    an invalid value there is an error, not a reason to try files
//! 2. Otherwise falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `COCKROACH_API_URL`: Cluster management API base URL (default `http://localhost:8080`)
//! - `COCKROACH_API_USERNAME`: Login username (required)
//! - `COCKROACH_API_PASSWORD`: Login password (required)
//! - `COCKROACH_API_TIMEOUT_SECS`: Per-request timeout in seconds (default 10)
//! - `COCKROACH_API_INSECURE_TLS`: Accept self-signed certificates (default false)
//! - `COCKROACH_TSDB_URL`: Timeseries query endpoint (default `http://127.0.0.1:8080/ts/query`)
//! - `COCKROACH_TSDB_AUTH`: `none` or `basic` (default `none`)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./cockroach-mcp.toml` or `./cockroach-mcp.json` (current working directory)
//! 2. `~/.cockroach-mcp.toml` or `~/.cockroach-mcp.json`

use std::path::{Path, PathBuf};

use cockroach_mcp_domain::constants::{
    DEFAULT_CLUSTER_API_URL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TSDB_URL,
};
use cockroach_mcp_domain::{
    AppConfig, ClusterApiConfig, CockroachMcpError, Credential, Result, TsdbAuth, TsdbConfig,
};

const USERNAME_VAR: &str = "COCKROACH_API_USERNAME";
const PASSWORD_VAR: &str = "COCKROACH_API_PASSWORD";

/// Load configuration with automatic fallback strategy
///
/// Uses the environment when the credential variables are set, otherwise
/// falls back to a config file.
///
/// # Errors
/// Returns `CockroachMcpError::Config` if:
/// - An environment value cannot be parsed
/// - No config file is found when the credentials are not in the environment
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<AppConfig> {
    if !env_credentials_present() {
        tracing::debug!("Credential environment variables not set, trying file");
        return load_from_file(None);
    }

    let config = load_from_env()?;
    tracing::info!("Configuration loaded from environment variables");
    Ok(config)
}

fn env_credentials_present() -> bool {
    [USERNAME_VAR, PASSWORD_VAR].iter().all(|key| non_empty_env(key).is_some())
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `CockroachMcpError::Config` if the credential variables are
/// missing or a value cannot be parsed.
pub fn load_from_env() -> Result<AppConfig> {
    let base_url = env_var_or("COCKROACH_API_URL", DEFAULT_CLUSTER_API_URL);
    let username = env_var(USERNAME_VAR)?;
    let password = env_var(PASSWORD_VAR)?;

    let timeout_secs = match non_empty_env("COCKROACH_API_TIMEOUT_SECS") {
        Some(raw) => raw.parse::<u64>().map_err(|e| {
            CockroachMcpError::Config(format!("Invalid COCKROACH_API_TIMEOUT_SECS: {e}"))
        })?,
        None => DEFAULT_REQUEST_TIMEOUT_SECS,
    };
    let insecure_tls = env_bool("COCKROACH_API_INSECURE_TLS", false);

    let tsdb_url = env_var_or("COCKROACH_TSDB_URL", DEFAULT_TSDB_URL);
    let tsdb_auth = non_empty_env("COCKROACH_TSDB_AUTH")
        .map(|raw| raw.parse::<TsdbAuth>())
        .transpose()?
        .unwrap_or_default();

    let config = AppConfig {
        cluster_api: ClusterApiConfig {
            base_url,
            credential: Credential::new(username, password),
            timeout_secs,
            insecure_tls,
        },
        tsdb: TsdbConfig { url: tsdb_url, auth: tsdb_auth },
    };
    config.validate()?;

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `CockroachMcpError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CockroachMcpError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CockroachMcpError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CockroachMcpError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CockroachMcpError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CockroachMcpError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CockroachMcpError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("cockroach-mcp.toml"));
        candidates.push(cwd.join("cockroach-mcp.json"));
    }

    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        candidates.push(home.join(".cockroach-mcp.toml"));
        candidates.push(home.join(".cockroach-mcp.json"));
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable
///
/// Empty values count as missing.
///
/// # Errors
/// Returns `CockroachMcpError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    non_empty_env(key).ok_or_else(|| {
        CockroachMcpError::Config(format!("Missing required environment variable: {key}"))
    })
}

fn env_var_or(key: &str, default: &str) -> String {
    non_empty_env(key).unwrap_or_else(|| default.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
