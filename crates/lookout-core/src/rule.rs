use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::condition::Condition;
use crate::error::{LookoutError, Result};

/// Severity attached to a rule and carried onto every alert it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for Severity {
    type Err = LookoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            other => Err(LookoutError::Config(format!(
                "unknown severity {other:?}, expected warning or critical"
            ))),
        }
    }
}

/// An action a rule can take on fire. Currently only `notify` exists, but the type stays an
/// enum so a future action doesn't force a config format break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Notify,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Notify => write!(f, "notify"),
        }
    }
}

impl FromStr for Action {
    type Err = LookoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "notify" => Ok(Action::Notify),
            other => Err(LookoutError::Config(format!("unknown action {other:?}"))),
        }
    }
}

/// An immutable, compiled alert rule. Built once at config load and never mutated afterward;
/// the alerter holds rules sorted by name for deterministic evaluation order.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub condition: Condition,
    pub for_duration: Duration,
    pub severity: Severity,
    pub actions: Vec<Action>,
    pub cooldown: Duration,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        condition: Condition,
        for_duration: Duration,
        severity: Severity,
        actions: Vec<Action>,
        cooldown: Duration,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(LookoutError::Config("rule name must not be empty".into()));
        }
        if actions.is_empty() {
            return Err(LookoutError::Config(format!(
                "rule {name:?} must list at least one action"
            )));
        }
        Ok(Self {
            name,
            condition,
            for_duration,
            severity,
            actions,
            cooldown,
        })
    }

    pub fn scope(&self) -> crate::condition::Scope {
        self.condition.scope
    }

    pub fn is_disk_percent(&self) -> bool {
        matches!(self.condition.field, crate::condition::Field::DiskPercent)
    }
}
