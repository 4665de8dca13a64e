/// Host-wide metrics for one collection tick. `None` fields mean "not observed this tick"
/// (a transient collection failure), never "the host has no such metric."
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostMetrics {
    pub cpu_percent: Option<f64>,
    pub mem_percent: Option<f64>,
    pub load1: Option<f64>,
}

/// One mounted filesystem's usage at the mountpoint named.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskMetrics {
    pub mountpoint: String,
    pub percent: f64,
}

/// One container's observed metrics/state at a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerMetrics {
    pub container_id: String,
    pub name: String,
    pub state: String,
    pub health: Option<String>,
    pub cpu_percent: Option<f64>,
    pub mem_percent: Option<f64>,
    pub restart_count: Option<f64>,
    /// When the container started, if known; used by the log supervisor to decide
    /// whether a tailer can open its stream `since` that instant or must fall back to
    /// `tail=0`.
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A single tick's worth of observations, fed to the alerter by the collector.
///
/// A `None` scope here means "the collector failed to gather this scope this tick" and must
/// not be confused with an empty, successfully-gathered list: the presence of a scope's list
/// is the authoritative existence signal; absence of the scope is a collection-health signal.
#[derive(Debug, Clone, Default)]
pub struct MetricSnapshot {
    pub host: Option<HostMetrics>,
    pub disks: Option<Vec<DiskMetrics>>,
    pub containers: Option<Vec<ContainerMetrics>>,
}

/// A low-latency, single-container state-change notification fed directly to the alerter by
/// the event source, bypassing the tick cadence.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerEvent {
    pub metrics: ContainerMetrics,
}
