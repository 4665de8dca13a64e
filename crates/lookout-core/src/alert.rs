use chrono::{DateTime, Utc};

use crate::rule::Severity;

/// A persisted alert row. Column names are part of the on-disk compatibility surface consumed
/// by adoption across versions; do not rename them casually.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub id: i64,
    pub rule_name: String,
    pub severity: Severity,
    /// The condition rendered back to canonical `scope.field OP value` text.
    pub condition: String,
    pub instance_key: String,
    pub fired_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub message: String,
    pub acknowledged: bool,
}

/// The lifecycle status carried on a state-change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertEventStatus {
    Firing,
    Resolved,
}

impl AlertEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertEventStatus::Firing => "firing",
            AlertEventStatus::Resolved => "resolved",
        }
    }
}

/// The view of a transition handed to the state-change callback (and from there, typically,
/// to the Hub). Carries enough rule metadata for a live subscriber to render it without a
/// round trip to the Store.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub status: AlertEventStatus,
    pub id: i64,
    pub rule_name: String,
    pub severity: Severity,
    pub condition: String,
    pub instance_key: String,
    pub fired_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub message: String,
}

impl AlertEvent {
    pub fn firing(record: &AlertRecord) -> Self {
        Self {
            status: AlertEventStatus::Firing,
            id: record.id,
            rule_name: record.rule_name.clone(),
            severity: record.severity,
            condition: record.condition.clone(),
            instance_key: record.instance_key.clone(),
            fired_at: record.fired_at,
            resolved_at: record.resolved_at,
            message: record.message.clone(),
        }
    }

    pub fn resolved(record: &AlertRecord) -> Self {
        Self {
            status: AlertEventStatus::Resolved,
            id: record.id,
            rule_name: record.rule_name.clone(),
            severity: record.severity,
            condition: record.condition.clone(),
            instance_key: record.instance_key.clone(),
            fired_at: record.fired_at,
            resolved_at: record.resolved_at,
            message: record.message.clone(),
        }
    }
}
