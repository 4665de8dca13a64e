use std::path::PathBuf;

use sysinfo::{Disks, System};

use lookout_core::snapshot::{DiskMetrics, HostMetrics};
use lookout_core::config::HostConfig;

/// Produces the host-scoped portion of a `MetricSnapshot` each tick. A concrete
/// container-metrics source is a separate collaborator (see `docker`); this one only reads
/// `/proc` and `/sys` via `sysinfo`, which is itself out of scope for the spec this repeats
/// but is the idiomatic way to read them without re-implementing a procfs parser by hand.
pub struct HostCollector {
    system: System,
    disks: Disks,
    #[allow(dead_code)]
    proc_root: PathBuf,
}

impl HostCollector {
    pub fn new(config: &HostConfig) -> Self {
        Self {
            system: System::new(),
            disks: Disks::new(),
            proc_root: PathBuf::from(&config.proc),
        }
    }

    /// Refreshes and samples host CPU/memory/load. Returns `None` fields (not an error) when a
    /// given measurement is not yet available (e.g. CPU usage requires two refreshes spaced
    /// apart to be meaningful) — this is the "transient collection failure" signal the Alerter
    /// treats as "not observed this tick".
    pub fn collect_host(&mut self) -> HostMetrics {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let cpu_percent = if self.system.cpus().is_empty() {
            None
        } else {
            Some(self.system.global_cpu_usage() as f64)
        };

        let mem_percent = if self.system.total_memory() == 0 {
            None
        } else {
            Some(self.system.used_memory() as f64 / self.system.total_memory() as f64 * 100.0)
        };

        let load1 = load1_as_option(System::load_average().one);

        HostMetrics {
            cpu_percent,
            mem_percent,
            load1,
        }
    }

    pub fn collect_disks(&mut self) -> Vec<DiskMetrics> {
        self.disks.refresh(true);
        self.disks
            .iter()
            .filter(|d| d.total_space() > 0)
            .map(|d| {
                let used = d.total_space().saturating_sub(d.available_space());
                let percent = used as f64 / d.total_space() as f64 * 100.0;
                DiskMetrics {
                    mountpoint: d.mount_point().to_string_lossy().to_string(),
                    percent,
                }
            })
            .collect()
    }
}

fn load1_as_option(value: f64) -> Option<f64> {
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}
