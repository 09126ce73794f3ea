//! # cockroach-mcp Domain
//!
//! Domain types shared by the HTTP clients and the tool layer.
//!
//! This crate contains:
//! - Timeseries query specs and normalized results
//! - Configuration structures
//! - Application error type and Result definition
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other cockroach-mcp crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod timeseries;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use timeseries::*;
