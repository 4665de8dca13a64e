use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use lookout_core::log_line::Stream;
use lookout_core::{LookoutError, Result};

use crate::log_supervisor::LogSource;

const LINE_CHANNEL_CAPACITY: usize = 256;

/// Opens a container's log stream by shelling out to `docker logs -f`, demuxing its stdout and
/// stderr into a single bounded channel the tailer drains. The same "no Engine API client in
/// this dependency stack" reasoning as the container event source applies here.
pub struct CliLogSource {
    socket: String,
}

impl CliLogSource {
    pub fn new(socket: impl Into<String>) -> Self {
        Self { socket: socket.into() }
    }
}

#[async_trait]
impl LogSource for CliLogSource {
    async fn open(&self, container_id: &str, since: Option<DateTime<Utc>>) -> Result<mpsc::Receiver<(Stream, String)>> {
        let mut command = Command::new("docker");
        command
            .arg("-H")
            .arg(format!("unix://{}", self.socket))
            .args(["logs", "-f", "-t"]);
        match since {
            Some(ts) => {
                command.arg("--since").arg(ts.to_rfc3339());
            }
            None => {
                command.arg("--tail").arg("0");
            }
        }
        command.arg(container_id);
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| LookoutError::Internal(format!("failed to spawn docker logs: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LookoutError::Internal("docker logs: missing stdout handle".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| LookoutError::Internal("docker logs: missing stderr handle".into()))?;

        let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);

        let tx_out = tx.clone();
        tokio::spawn(pump(stdout, Stream::Stdout, tx_out));
        tokio::spawn(pump(stderr, Stream::Stderr, tx));
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        Ok(rx)
    }
}

async fn pump(reader: impl tokio::io::AsyncRead + Unpin, stream: Stream, tx: mpsc::Sender<(Stream, String)>) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send((stream, line)).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(error) => {
                tracing::warn!(%error, "error reading docker logs stream");
                break;
            }
        }
    }
}
