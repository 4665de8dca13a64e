use async_trait::async_trait;

use lookout_core::snapshot::ContainerMetrics;
use lookout_core::Result;

/// The interface the Alerter and the log supervisor consume for container lifecycle.
/// Container runtime event source and stats sampling are external collaborators; only the
/// interface is specified here, not a production Docker Engine API client.
#[async_trait]
pub trait ContainerEventSource: Send + Sync {
    /// Returns every currently running (or include/exclude-filtered) container's metrics,
    /// used to build a tick's `MetricSnapshot.containers`.
    async fn list(&self) -> Result<Vec<ContainerMetrics>>;

    /// Blocks until the next single-container state-change event is available.
    async fn next_event(&self) -> Result<ContainerMetrics>;
}

/// A thin event source that shells out to the Docker CLI rather than speaking the Engine API
/// directly — there is no HTTP/Engine-API client in this dependency stack, and the container
/// event source is explicitly an external collaborator, not core scope. `docker events` and
/// `docker ps` are used as the minimal real implementation of the trait above.
pub struct CliContainerEventSource {
    socket: String,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl CliContainerEventSource {
    pub fn new(socket: impl Into<String>, include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            socket: socket.into(),
            include,
            exclude,
        }
    }

    fn included(&self, name: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|p| name.contains(p.as_str())) {
            return false;
        }
        !self.exclude.iter().any(|p| name.contains(p.as_str()))
    }
}

#[async_trait]
impl ContainerEventSource for CliContainerEventSource {
    async fn list(&self) -> Result<Vec<ContainerMetrics>> {
        let output = tokio::process::Command::new("docker")
            .arg("-H")
            .arg(format!("unix://{}", self.socket))
            .args(["ps", "--format", "{{json .}}"])
            .output()
            .await
            .map_err(|e| lookout_core::LookoutError::Internal(format!("docker ps failed: {e}")))?;

        let text = String::from_utf8_lossy(&output.stdout);
        let mut containers = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(raw) = serde_json::from_str::<RawContainer>(line) {
                if self.included(&raw.names) {
                    containers.push(raw.into_metrics());
                }
            }
        }
        Ok(containers)
    }

    async fn next_event(&self) -> Result<ContainerMetrics> {
        // A production implementation would hold a long-lived `docker events` child process
        // and stream its stdout line by line; left unimplemented here since concrete container
        // event sourcing is an external collaborator, not core scope.
        Err(lookout_core::LookoutError::Internal(
            "CliContainerEventSource::next_event is not implemented".into(),
        ))
    }
}

#[derive(serde::Deserialize)]
struct RawContainer {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "State")]
    state: String,
    #[serde(rename = "Status")]
    #[allow(dead_code)]
    status: String,
}

impl RawContainer {
    fn into_metrics(self) -> ContainerMetrics {
        ContainerMetrics {
            container_id: self.id,
            name: self.names,
            state: self.state,
            health: None,
            cpu_percent: None,
            mem_percent: None,
            restart_count: None,
            started_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_exclude_filters_apply() {
        let source = CliContainerEventSource::new("/var/run/docker.sock", vec!["web".into()], vec!["web-test".into()]);
        assert!(source.included("web-prod"));
        assert!(!source.included("web-test"));
        assert!(!source.included("db"));
    }

    #[test]
    fn empty_include_list_admits_everything_not_excluded() {
        let source = CliContainerEventSource::new("/var/run/docker.sock", vec![], vec!["sidecar".into()]);
        assert!(source.included("anything"));
        assert!(!source.included("sidecar-proxy"));
    }
}
