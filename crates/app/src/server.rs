//! Line-oriented tool server
//!
//! Every input line is handled on its own task so a slow call (a query in
//! retry backoff, say) never holds up the lines behind it. Responses are
//! written by a single task in completion order, one JSON object per line.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::commands::handle_line;
use crate::context::AppContext;

/// Encoded responses waiting for the writer
const RESPONSE_BUFFER: usize = 64;

/// Answer tool calls until `input` ends or `shutdown` fires
///
/// In-flight calls get a child of `shutdown`, so they are cancelled with it
/// and still produce their (cancelled) response before this returns. The
/// output is handed back once every response has been written.
///
/// # Errors
///
/// Returns the first I/O error from reading `input` or writing `output`
pub async fn serve<R, W>(
    ctx: Arc<AppContext>,
    input: R,
    output: W,
    shutdown: CancellationToken,
) -> io::Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<String>(RESPONSE_BUFFER);
    let writer = tokio::spawn(write_responses(rx, output));
    let mut lines = input.lines();

    let read_result = loop {
        let line = tokio::select! {
            biased;
            () = shutdown.cancelled() => break Ok(()),
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => spawn_call(&ctx, line, tx.clone(), shutdown.child_token()),
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    // The writer finishes once every in-flight call has dropped its sender.
    drop(tx);
    debug!("Input closed, waiting for in-flight tool calls");

    let output = writer.await.map_err(io::Error::other)??;
    read_result.map(|()| output)
}

fn spawn_call(
    ctx: &Arc<AppContext>,
    line: String,
    responses: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        let Some(response) = handle_line(&ctx, &line, &cancel).await else { return };

        match serde_json::to_string(&response) {
            Ok(encoded) => {
                if responses.send(encoded).await.is_err() {
                    warn!("Response writer stopped, dropping tool response");
                }
            }
            Err(e) => error!(error = %e, "Failed to encode tool response"),
        }
    });
}

async fn write_responses<W>(mut responses: mpsc::Receiver<String>, mut output: W) -> io::Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut encoded) = responses.recv().await {
        encoded.push('\n');
        output.write_all(encoded.as_bytes()).await?;
        output.flush().await?;
    }
    Ok(output)
}
