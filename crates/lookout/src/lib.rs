//! Host-resident observability agent: samples host and container telemetry, tails container
//! logs, evaluates declarative alert rules, persists alert history, and notifies out-of-band
//! channels on state changes.

mod app;

pub use app::Lookout;

pub use lookout_core as core;
pub use lookout_runtime as runtime;
