//! Tool commands
//!
//! A [`ToolCall`] names a tool and carries its JSON arguments. Every call
//! produces exactly one [`ToolResponse`]; validation and client failures are
//! reported as `is_error: true` results, never as panics or dropped lines.

pub mod args;
pub mod timeseries;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub use timeseries::{cluster_ts_query, tsdb_query, CLUSTER_TS_QUERY, TSDB_QUERY};

use crate::context::AppContext;
use crate::utils::logging::log_tool_execution;

/// Incoming request, one per input line
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: Value,
    pub tool: String,
    #[serde(default)]
    pub arguments: args::Arguments,
}

/// Textual tool result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub is_error: bool,
    pub text: String,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self { is_error: false, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { is_error: true, text: text.into() }
    }
}

/// Outgoing response line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse {
    pub id: Value,
    pub is_error: bool,
    pub text: String,
}

impl ToolResponse {
    pub fn new(id: Value, output: ToolOutput) -> Self {
        Self { id, is_error: output.is_error, text: output.text }
    }
}

/// Route a call to its tool
pub async fn dispatch(
    ctx: &AppContext,
    call: ToolCall,
    cancel: &CancellationToken,
) -> ToolResponse {
    let started = Instant::now();

    let output = match call.tool.as_str() {
        CLUSTER_TS_QUERY => cluster_ts_query(ctx, &call.arguments, cancel).await,
        TSDB_QUERY => tsdb_query(ctx, &call.arguments, cancel).await,
        other => ToolOutput::error(format!("Unknown tool: {other}")),
    };

    log_tool_execution(&call.tool, started.elapsed(), !output.is_error);
    ToolResponse::new(call.id, output)
}

/// Parse one input line and dispatch it
///
/// Blank lines yield `None`. A line that is not a valid call yields an
/// error response with a `null` id.
pub async fn handle_line(
    ctx: &AppContext,
    line: &str,
    cancel: &CancellationToken,
) -> Option<ToolResponse> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<ToolCall>(line) {
        Ok(call) => Some(dispatch(ctx, call, cancel).await),
        Err(err) => Some(ToolResponse::new(
            Value::Null,
            ToolOutput::error(format!("Invalid tool call: {err}")),
        )),
    }
}
