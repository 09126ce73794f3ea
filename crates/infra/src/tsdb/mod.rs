//! Timeseries endpoint client gated by a circuit breaker
//!
//! Each query runs a bounded retry loop (3 attempts, 2s/4s backoff, 10s
//! per attempt) inside a circuit breaker named "Query TSDB". Only the final
//! outcome of the retry loop is reported to the breaker.

pub mod client;
pub mod models;

pub use client::{TransientErrors, TsdbClient, TsdbClientConfig};
pub use models::{TsdbQuery, TsdbQueryRequest};
