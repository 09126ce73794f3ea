//! Tracing setup and structured logging helpers.
//!
//! Logs go to stderr (stdout carries tool responses) and, when a log file is
//! given, to that file through a non-blocking writer. Format defaults to
//! compact text and can be switched to JSON via
//! `COCKROACH_MCP_LOG_FORMAT=json`. Filter defaults to `info` if `RUST_LOG`
//! is unset.

use std::path::Path;
use std::time::Duration;

use cockroach_mcp_infra::ApiError;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

/// Environment variable selecting the output format
pub const LOG_FORMAT_ENV: &str = "COCKROACH_MCP_LOG_FORMAT";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON; anything else is compact
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Compact
        }
    }

    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV).map(|v| Self::parse(&v)).unwrap_or(Self::Compact)
    }
}

/// Install the global subscriber.
///
/// Returns the file writer's guard, which must be held until shutdown so
/// buffered lines are flushed. Installing twice is a no-op.
pub fn init_logging(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let format = LogFormat::from_env();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<BoxedLayer> = vec![stderr_layer(format)];

    let guard = log_file.and_then(|path| {
        let directory = path.parent()?;
        let file_name = path.file_name()?;
        let appender = tracing_appender::rolling::never(directory, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(file_layer(format, writer));
        Some(guard)
    });

    if let Err(err) = tracing_subscriber::registry().with(layers).with(env_filter).try_init() {
        eprintln!("tracing init skipped: {err}");
    }

    guard
}

/// Log the outcome of a tool call with structured fields.
///
/// `tool` must be a stable identifier without argument values.
#[inline]
pub fn log_tool_execution(tool: &str, elapsed: Duration, success: bool) {
    let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    if success {
        info!(tool, duration_ms, "tool_execution_success");
    } else {
        warn!(tool, duration_ms, "tool_execution_failure");
    }
}

/// Stable label for an [`ApiError`], suitable for log fields
#[inline]
pub fn error_label(error: &ApiError) -> &'static str {
    error.category().as_str()
}

fn stderr_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
    }
}

fn file_layer(format: LogFormat, writer: tracing_appender::non_blocking::NonBlocking) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        LogFormat::Compact => fmt::layer().with_ansi(false).with_writer(writer).boxed(),
    }
}
