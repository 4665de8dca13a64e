pub mod alerter;
pub mod collector;
pub mod docker;
pub mod docker_log_source;
pub mod hub;
pub mod log_supervisor;
pub mod notifier;
pub mod silence;
pub mod store;

pub use alerter::{Alerter, ChangeCallback};
pub use collector::HostCollector;
pub use docker::{CliContainerEventSource, ContainerEventSource};
pub use docker_log_source::CliLogSource;
pub use hub::Hub;
pub use log_supervisor::{LogSink, LogSource, LogSupervisor};
pub use notifier::{EmailChannel, NotifyJob, Notifier, WebhookChannel};
pub use silence::SilenceMap;
pub use store::AlertStore;
