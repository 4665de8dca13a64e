use chrono::{DateTime, Utc};

/// The three-state machine each (rule, target) pair moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Inactive,
    Pending,
    Firing,
}

/// A live evaluation slot for one `(rule, instanceKey)` pair.
///
/// `pending_since` is only meaningful in `Pending`; `fired_at` only in `Firing`; `resolved_at`
/// only immediately after a `Firing -> Inactive` transition (and is consulted for cooldown until
/// the instance is garbage-collected, at which point it is lost and cooldown resets).
#[derive(Debug, Clone)]
pub struct Instance {
    pub key: String,
    pub state: InstanceState,
    pub pending_since: Option<DateTime<Utc>>,
    pub fired_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Identifies the Store row for a Firing instance. Zero means "no row".
    pub db_id: i64,
}

impl Instance {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: InstanceState::Inactive,
            pending_since: None,
            fired_at: None,
            resolved_at: None,
            db_id: 0,
        }
    }

    pub fn in_cooldown(&self, cooldown: chrono::Duration, now: DateTime<Utc>) -> bool {
        match self.resolved_at {
            Some(resolved_at) if cooldown > chrono::Duration::zero() => {
                now < resolved_at + cooldown
            }
            _ => false,
        }
    }
}

/// Computes the deterministic instance key for a host, non-disk rule.
pub fn host_key(rule_name: &str) -> String {
    rule_name.to_string()
}

/// Computes the deterministic instance key for a host disk_percent rule at one mountpoint.
pub fn disk_key(rule_name: &str, mountpoint: &str) -> String {
    format!("{rule_name}:{mountpoint}")
}

/// Computes the deterministic instance key for a container-scoped rule on one container.
pub fn container_key(rule_name: &str, container_id: &str) -> String {
    format!("{rule_name}:{container_id}")
}

/// The per-rule key prefix used for stale handling: every instance key under a rule shares this
/// prefix (`ruleName` for host, `ruleName:` for disk/container keys).
pub fn key_prefix(rule_name: &str) -> String {
    format!("{rule_name}:")
}

/// Resolves the rule that owns a persisted `instance_key`, per the adoption matching rule:
/// the instance key either equals the rule name exactly, or starts with `rule_name + ":"`.
///
/// When multiple rule names are prefixes of the key's `rule_name:` segment (one rule name a
/// prefix of another), the longest matching rule name wins, which is why rule names that are
/// prefixes of one another separated by `:` should be avoided at config time.
pub fn owning_rule_name<'a>(instance_key: &str, rule_names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut best: Option<&str> = None;
    for name in rule_names {
        let matches = instance_key == name
            || instance_key
                .strip_prefix(name)
                .map(|rest| rest.starts_with(':'))
                .unwrap_or(false);
        if matches && best.map(|b| name.len() > b.len()).unwrap_or(true) {
            best = Some(name);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_expected_key_shapes() {
        assert_eq!(host_key("high_cpu"), "high_cpu");
        assert_eq!(disk_key("disk_full", "/"), "disk_full:/");
        assert_eq!(container_key("oom", "abc123"), "oom:abc123");
    }

    #[test]
    fn owning_rule_prefers_exact_match_then_longest_prefix() {
        let names = vec!["high_cpu", "high_cpu_warn"];
        assert_eq!(
            owning_rule_name("high_cpu", names.iter().copied()),
            Some("high_cpu")
        );
        assert_eq!(
            owning_rule_name("high_cpu_warn:abc", names.iter().copied()),
            Some("high_cpu_warn")
        );
        assert_eq!(owning_rule_name("unrelated", names.iter().copied()), None);
    }
}
