//! cockroach-mcp - CockroachDB timeseries tools over stdio
//!
//! Reads one JSON tool call per stdin line and writes one JSON response per
//! stdout line. Logs go to stderr and `~/.cockroach-mcp.log`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cockroach_mcp_lib::utils::logging::init_logging;
use cockroach_mcp_lib::{serve, AppContext};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const ENV_FILE: &str = ".mcp-env";
const LOG_FILE: &str = ".cockroach-mcp.log";

#[tokio::main]
async fn main() -> Result<()> {
    let home = std::env::var_os("HOME").map(PathBuf::from);

    // Initialize logging FIRST so we can see env file loading
    let _log_guard = init_logging(home.as_ref().map(|h| h.join(LOG_FILE)).as_deref());

    match home.as_ref().map(|h| h.join(ENV_FILE)) {
        Some(path) => match dotenvy::from_path(&path) {
            Ok(()) => info!(path = %path.display(), "Loaded environment file"),
            Err(e) => warn!(path = %path.display(), error = %e, "Could not load environment file"),
        },
        None => warn!("HOME is not set, skipping environment file"),
    }

    info!("Starting cockroach-mcp...");

    let ctx = AppContext::new().context("failed to initialize application context")?;

    let shutdown = CancellationToken::new();
    ctx.login(&shutdown).await.context("initial login to the cluster management API failed")?;

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            trigger.cancel();
        }
    });

    serve(Arc::new(ctx), BufReader::new(tokio::io::stdin()), tokio::io::stdout(), shutdown)
        .await
        .context("tool server failed")?;

    info!("cockroach-mcp stopped");
    Ok(())
}
