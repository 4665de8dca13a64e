mod parser;
mod tailer;

pub use tailer::{LogSink, LogSource};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use lookout_core::snapshot::ContainerMetrics;

struct Tailed {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the `containerID → cancellation handle` map of in-flight log tailers. `sync` is driven
/// by each observed change to the container list: new running containers get a tailer, vanished
/// ones are cancelled and forgotten. `stop` cancels everything and waits for the wait-group
/// (here, the join handles) to drain.
pub struct LogSupervisor {
    source: Arc<dyn LogSource>,
    sink: Arc<dyn LogSink>,
    final_sink: Arc<dyn LogSink>,
    root_cancel: CancellationToken,
    tailers: RwLock<HashMap<String, Tailed>>,
}

impl LogSupervisor {
    pub fn new(source: Arc<dyn LogSource>, sink: Arc<dyn LogSink>, final_sink: Arc<dyn LogSink>) -> Self {
        Self {
            source,
            sink,
            final_sink,
            root_cancel: CancellationToken::new(),
            tailers: RwLock::new(HashMap::new()),
        }
    }

    /// Reconciles the tailer table against the currently running container set: starts tailers
    /// for containers not yet tailed and cancels tailers for containers no longer running.
    pub async fn sync(&self, containers: &[ContainerMetrics]) {
        let running: HashSet<&str> = containers
            .iter()
            .filter(|c| c.state == "running")
            .map(|c| c.container_id.as_str())
            .collect();

        let mut tailers = self.tailers.write().await;

        let stale: Vec<String> = tailers
            .keys()
            .filter(|id| !running.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            if let Some(tailed) = tailers.remove(&id) {
                tailed.cancel.cancel();
                let _ = tailed.handle.await;
            }
        }

        for container in containers {
            if container.state != "running" {
                continue;
            }
            if tailers.contains_key(&container.container_id) {
                continue;
            }
            let cancel = self.root_cancel.child_token();
            let handle = tokio::spawn(tailer::run(
                container.container_id.clone(),
                container.started_at,
                self.source.clone(),
                self.sink.clone(),
                self.final_sink.clone(),
                cancel.clone(),
            ));
            tailers.insert(container.container_id.clone(), Tailed { cancel, handle });
        }
    }

    /// Cancels every tailer and blocks until all have exited (their final flush included).
    pub async fn stop(&self) {
        self.root_cancel.cancel();
        let mut tailers = self.tailers.write().await;
        for (_, tailed) in tailers.drain() {
            let _ = tailed.handle.await;
        }
    }
}
