use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

/// A process-local map from rule name to a silence expiry time.
///
/// Guarded by its own lock, independent from the Alerter's evaluation lock, so a silence can be
/// set or cleared while an evaluation is in flight. Only consulted in the fire path; it never
/// affects state transitions, only whether a notification is enqueued.
#[derive(Default)]
pub struct SilenceMap {
    expiries: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl SilenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress notifications for `rule_name` until `now + duration`.
    pub fn silence(&self, rule_name: &str, until: DateTime<Utc>) {
        self.expiries
            .write()
            .unwrap()
            .insert(rule_name.to_string(), until);
    }

    /// Whether `rule_name` is currently silenced. Lazily evicts the entry if it has expired.
    pub fn is_silenced(&self, rule_name: &str, now: DateTime<Utc>) -> bool {
        let expired = {
            let guard = self.expiries.read().unwrap();
            match guard.get(rule_name) {
                Some(expiry) => *expiry <= now,
                None => return false,
            }
        };
        if expired {
            self.expiries.write().unwrap().remove(rule_name);
            false
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silences_until_expiry_then_lazily_evicts() {
        let map = SilenceMap::new();
        let base = DateTime::from_timestamp(1_000, 0).unwrap();
        map.silence("high_cpu", base + chrono::Duration::seconds(10));

        assert!(map.is_silenced("high_cpu", base));
        assert!(map.is_silenced("high_cpu", base + chrono::Duration::seconds(5)));
        assert!(!map.is_silenced("high_cpu", base + chrono::Duration::seconds(10)));
        // second read after expiry confirms eviction, not just a boundary fluke
        assert!(!map.is_silenced("high_cpu", base + chrono::Duration::seconds(20)));
    }

    #[test]
    fn unknown_rule_is_never_silenced() {
        let map = SilenceMap::new();
        assert!(!map.is_silenced("unknown", Utc::now()));
    }
}
