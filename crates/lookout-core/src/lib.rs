pub mod alert;
pub mod clock;
pub mod condition;
pub mod config;
pub mod error;
pub mod instance;
pub mod log_line;
pub mod rule;
pub mod snapshot;

pub use alert::{AlertEvent, AlertEventStatus, AlertRecord};
pub use clock::{Clock, SystemClock, TestClock};
pub use condition::{Condition, ConditionValue, Field, Op, Scope};
pub use config::Config;
pub use error::{LookoutError, Result};
pub use instance::{Instance, InstanceState};
pub use log_line::{LogLevel, LogLine, Stream};
pub use rule::{Action, Rule, Severity};
pub use snapshot::{ContainerEvent, ContainerMetrics, DiskMetrics, HostMetrics, MetricSnapshot};
