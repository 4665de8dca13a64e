use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use lookout_core::log_line::{LogLine, Stream};
use lookout_core::Result;

use super::parser::parse_line;

/// Entries batched before a forced flush, per tailer.
const BATCH_SIZE: usize = 100;
/// Upper bound on how long a partial batch waits before flushing anyway.
const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Produces demuxed stdout/stderr lines for one container's log stream. A concrete
/// implementation shells out to the container runtime; this crate depends only on the trait,
/// since speaking the runtime's log API directly is an external collaborator.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Opens the stream for `container_id`. When `since` is known the stream starts there;
    /// otherwise it starts at `tail=0` (no backlog) to avoid refetching history on restart.
    async fn open(&self, container_id: &str, since: Option<DateTime<Utc>>) -> Result<mpsc::Receiver<(Stream, String)>>;
}

/// Receives batches of parsed lines for durable persistence. A fresh, non-cancelled sink is
/// used for the final flush on cancellation so in-flight entries are not lost mid-shutdown.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn write_batch(&self, lines: &[LogLine]) -> Result<()>;
}

/// Runs one container's tail loop: read demuxed lines, batch them, flush on size or timeout,
/// and on cancellation attempt one final flush through a fresh sink before exiting.
pub async fn run(
    container_id: String,
    since: Option<DateTime<Utc>>,
    source: Arc<dyn LogSource>,
    sink: Arc<dyn LogSink>,
    final_sink: Arc<dyn LogSink>,
    cancel: CancellationToken,
) {
    let mut lines = match source.open(&container_id, since).await {
        Ok(rx) => rx,
        Err(error) => {
            tracing::warn!(container_id, %error, "failed to open log source");
            return;
        }
    };

    let mut batch: Vec<LogLine> = Vec::with_capacity(BATCH_SIZE);
    let mut interval = tokio::time::interval(FLUSH_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break;
            }
            maybe_line = lines.recv() => {
                match maybe_line {
                    Some((stream, raw)) => {
                        let line = parse_line(&raw, &container_id, stream, Utc::now());
                        batch.push(line);
                        if batch.len() >= BATCH_SIZE {
                            flush(&sink, &container_id, &mut batch).await;
                        }
                    }
                    None => break,
                }
            }
            _ = interval.tick() => {
                if !batch.is_empty() {
                    flush(&sink, &container_id, &mut batch).await;
                }
            }
        }
    }

    if !batch.is_empty() {
        flush(&final_sink, &container_id, &mut batch).await;
    }
}

async fn flush(sink: &Arc<dyn LogSink>, container_id: &str, batch: &mut Vec<LogLine>) {
    if let Err(error) = sink.write_batch(batch).await {
        tracing::warn!(container_id, %error, batch_len = batch.len(), "failed to persist log batch");
    }
    batch.clear();
}
