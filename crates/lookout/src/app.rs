use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use lookout_core::clock::SystemClock;
use lookout_core::config::Config;
use lookout_core::snapshot::MetricSnapshot;
use lookout_core::AlertEvent;
use lookout_runtime::{
    Alerter, AlertStore, ChangeCallback, CliContainerEventSource, CliLogSource, ContainerEventSource,
    HostCollector, Hub, LogSupervisor, Notifier,
};

/// Everything the running agent needs, built once from `Config` and driven by `run`.
pub struct Lookout {
    config: Config,
    alerter: Arc<Alerter>,
    notifier: Arc<Notifier>,
    hub: Arc<Hub<AlertEvent>>,
    collector: tokio::sync::Mutex<HostCollector>,
    event_source: Arc<dyn ContainerEventSource>,
    log_supervisor: Arc<LogSupervisor>,
    store: AlertStore,
    cancel: CancellationToken,
}

impl Lookout {
    /// Loads the database, starts the notifier's channel tasks, and adopts any still-firing
    /// rows left over from a previous run — all before the first collection tick.
    pub async fn build(config: Config) -> Result<Self> {
        let rules = config.compile_rules().context("invalid alert rule configuration")?;

        let store = AlertStore::connect(&config.storage.path)
            .await
            .context("failed to open alert database")?;

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;
        let notifier = Arc::new(Notifier::start(&config.notify, http));

        let hub: Arc<Hub<AlertEvent>> = Arc::new(Hub::new());
        let hub_for_callback = hub.clone();
        let on_change: ChangeCallback = Arc::new(move |event| hub_for_callback.publish("alerts", event));

        let alerter = Arc::new(Alerter::new(
            rules,
            store.clone(),
            notifier.clone(),
            Arc::new(SystemClock),
            Some(on_change),
        ));
        alerter.adopt_firing().await.context("failed to adopt firing alerts")?;

        let event_source: Arc<dyn ContainerEventSource> = Arc::new(CliContainerEventSource::new(
            config.docker.socket.clone(),
            config.docker.include.clone(),
            config.docker.exclude.clone(),
        ));

        let log_source = Arc::new(CliLogSource::new(config.docker.socket.clone()));
        let log_supervisor = Arc::new(LogSupervisor::new(log_source, Arc::new(store.clone()), Arc::new(store.clone())));

        Ok(Self {
            collector: tokio::sync::Mutex::new(HostCollector::new(&config.host)),
            config,
            alerter,
            notifier,
            hub,
            event_source,
            log_supervisor,
            store,
            cancel: CancellationToken::new(),
        })
    }

    pub fn hub(&self) -> Arc<Hub<AlertEvent>> {
        self.hub.clone()
    }

    /// Runs the collection tick loop until cancelled. This is the collector producer described
    /// by the design: it samples the host, disks, and container list once per `collect.interval`
    /// and feeds the resulting snapshot to the Alerter, then reconciles the log supervisor
    /// against the observed container list.
    pub async fn run(&self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.collect.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn tick(&self) {
        let containers = match self.event_source.list().await {
            Ok(containers) => Some(containers),
            Err(error) => {
                tracing::warn!(%error, "container list collection failed this tick");
                None
            }
        };

        let (host, disks) = {
            let mut collector = self.collector.lock().await;
            (Some(collector.collect_host()), Some(collector.collect_disks()))
        };

        let snapshot = MetricSnapshot { host, disks, containers: containers.clone() };
        self.alerter.evaluate(&snapshot).await;

        if let Some(containers) = containers {
            self.log_supervisor.sync(&containers).await;
        }

        if let Err(error) = self.store.prune(self.config.storage.retention_days, chrono::Utc::now()).await {
            tracing::warn!(%error, "alert retention prune failed");
        }
    }

    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel root → log supervisor drains with a fresh flush context → hub closes → notifier
    /// stops accepting new sends last, mirroring the shutdown order the design specifies.
    async fn shutdown(&self) {
        self.log_supervisor.stop().await;
        self.hub.close();
        self.notifier.shutdown();
    }
}
