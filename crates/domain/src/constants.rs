//! Domain constants
//!
//! Defaults shared by configuration loading and the query clients.

// Cluster management API
pub const DEFAULT_CLUSTER_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const SESSION_COOKIE: &str = "session";
pub const TENANT_COOKIE: &str = "tenant";

// Timeseries endpoint
pub const DEFAULT_TSDB_URL: &str = "http://127.0.0.1:8080/ts/query";
pub const DEFAULT_SAMPLE_NANOS: i64 = 10_000_000_000; // 10s

// Circuit breaker and retry schedule for the timeseries endpoint
pub const TSDB_BREAKER_NAME: &str = "Query TSDB";
pub const TSDB_MAX_CONSECUTIVE_FAILURES: u64 = 3;
pub const TSDB_BREAKER_TIMEOUT_SECS: u64 = 30;
pub const TSDB_HALF_OPEN_MAX_CALLS: u64 = 5;
pub const TSDB_BREAKER_INTERVAL_SECS: u64 = 60;
pub const TSDB_RETRY_ATTEMPTS: u32 = 3;
pub const TSDB_RETRY_WAIT_SECS: u64 = 2;
pub const TSDB_RETRY_MAX_WAIT_SECS: u64 = 10;

// Error bodies are truncated to this many characters in error messages
pub const ERROR_BODY_SNIPPET_LEN: usize = 512;
