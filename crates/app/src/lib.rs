//! # Cockroach MCP App
//!
//! Application layer - tool commands and main entry point.
//!
//! This crate contains:
//! - Tool commands (`cluster_ts_query`, `tsdb_query`)
//! - Application context (dependency injection)
//! - Logging setup and result formatting
//!
//! ## Architecture
//! - Depends on `domain` and `infra`
//! - Wires the clients to one shared session store
//! - Serves newline-delimited JSON tool calls over stdio, one task per call

pub mod commands;
pub mod context;
pub mod server;
pub mod utils;

// Re-export for convenience
pub use commands::{dispatch, handle_line, ToolCall, ToolOutput, ToolResponse};
pub use context::AppContext;
pub use server::serve;
