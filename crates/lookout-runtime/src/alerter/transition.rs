use chrono::{DateTime, Utc};

use lookout_core::instance::{Instance, InstanceState};
use lookout_core::rule::Rule;

/// What the caller must do as a consequence of a transition. The transition function itself
/// never touches the Store, the Notifier, or the Hub — it is pure state-machine logic so it
/// can be exercised directly in tests without any I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    Fire,
    Resolve,
}

/// Applies one evaluation's outcome (`matched`) to an instance at time `now`, mutating it in
/// place and returning the side effect the caller owes it.
///
/// Mirrors the state machine:
/// ```text
/// Inactive --matched, no cooldown, for=0-->   Firing   (Fire)
/// Inactive --matched, no cooldown, for>0-->   Pending
/// Inactive --matched, in cooldown-->          Inactive (no-op)
/// Pending  --not matched-->                   Inactive
/// Pending  --matched, elapsed>=for-->          Firing   (Fire)
/// Firing   --not matched-->                    Inactive (Resolve)
/// ```
pub fn apply(instance: &mut Instance, rule: &Rule, matched: bool, now: DateTime<Utc>) -> Effect {
    let cooldown = chrono::Duration::from_std(rule.cooldown).unwrap_or(chrono::Duration::zero());
    let for_duration =
        chrono::Duration::from_std(rule.for_duration).unwrap_or(chrono::Duration::zero());

    match instance.state {
        InstanceState::Inactive => {
            if !matched {
                Effect::None
            } else if instance.in_cooldown(cooldown, now) {
                Effect::None
            } else if rule.for_duration.is_zero() {
                instance.state = InstanceState::Firing;
                instance.fired_at = Some(now);
                Effect::Fire
            } else {
                instance.state = InstanceState::Pending;
                instance.pending_since = Some(now);
                Effect::None
            }
        }
        InstanceState::Pending => {
            if !matched {
                instance.state = InstanceState::Inactive;
                instance.pending_since = None;
                Effect::None
            } else {
                let pending_since = instance
                    .pending_since
                    .expect("Pending instance must carry pending_since");
                if now - pending_since >= for_duration {
                    instance.state = InstanceState::Firing;
                    instance.fired_at = Some(now);
                    Effect::Fire
                } else {
                    Effect::None
                }
            }
        }
        InstanceState::Firing => {
            if matched {
                Effect::None
            } else {
                instance.state = InstanceState::Inactive;
                instance.resolved_at = Some(now);
                Effect::Resolve
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookout_core::condition::Condition;
    use lookout_core::rule::Severity;
    use std::time::Duration;

    fn rule(for_duration: Duration, cooldown: Duration) -> Rule {
        Rule::new(
            "r",
            Condition::parse("host.cpu_percent > 90").unwrap(),
            for_duration,
            Severity::Warning,
            vec![lookout_core::rule::Action::Notify],
            cooldown,
        )
        .unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn zero_for_duration_fires_immediately() {
        let r = rule(Duration::ZERO, Duration::ZERO);
        let mut i = Instance::new("r");
        let effect = apply(&mut i, &r, true, at(0));
        assert_eq!(effect, Effect::Fire);
        assert_eq!(i.state, InstanceState::Firing);
        assert_eq!(i.fired_at, Some(at(0)));
    }

    #[test]
    fn positive_for_duration_debounces_then_fires() {
        let r = rule(Duration::from_secs(10), Duration::ZERO);
        let mut i = Instance::new("r");
        assert_eq!(apply(&mut i, &r, true, at(0)), Effect::None);
        assert_eq!(i.state, InstanceState::Pending);
        assert_eq!(apply(&mut i, &r, true, at(5)), Effect::None);
        assert_eq!(i.state, InstanceState::Pending);
        assert_eq!(apply(&mut i, &r, true, at(10)), Effect::Fire);
        assert_eq!(i.state, InstanceState::Firing);
    }

    #[test]
    fn pending_reverts_to_inactive_without_persistence_if_unmatched() {
        let r = rule(Duration::from_secs(10), Duration::ZERO);
        let mut i = Instance::new("r");
        apply(&mut i, &r, true, at(0));
        let effect = apply(&mut i, &r, false, at(3));
        assert_eq!(effect, Effect::None);
        assert_eq!(i.state, InstanceState::Inactive);
        assert!(i.pending_since.is_none());
    }

    #[test]
    fn firing_resolves_on_unmatched() {
        let r = rule(Duration::ZERO, Duration::ZERO);
        let mut i = Instance::new("r");
        apply(&mut i, &r, true, at(0));
        let effect = apply(&mut i, &r, false, at(10));
        assert_eq!(effect, Effect::Resolve);
        assert_eq!(i.state, InstanceState::Inactive);
        assert_eq!(i.resolved_at, Some(at(10)));
    }

    #[test]
    fn cooldown_suppresses_refire_until_elapsed() {
        let r = rule(Duration::ZERO, Duration::from_secs(300));
        let mut i = Instance::new("r");
        apply(&mut i, &r, true, at(0));
        apply(&mut i, &r, false, at(10));
        assert_eq!(i.state, InstanceState::Inactive);

        // re-matches mid-cooldown: suppressed
        assert_eq!(apply(&mut i, &r, true, at(70)), Effect::None);
        assert_eq!(i.state, InstanceState::Inactive);

        // re-matches after cooldown elapses: fires
        assert_eq!(apply(&mut i, &r, true, at(370)), Effect::Fire);
        assert_eq!(i.state, InstanceState::Firing);
    }

    #[test]
    fn zero_cooldown_allows_immediate_refire() {
        let r = rule(Duration::ZERO, Duration::ZERO);
        let mut i = Instance::new("r");
        apply(&mut i, &r, true, at(0));
        apply(&mut i, &r, false, at(10));
        assert_eq!(apply(&mut i, &r, true, at(11)), Effect::Fire);
    }

    #[test]
    fn matched_while_firing_is_a_no_op() {
        let r = rule(Duration::ZERO, Duration::ZERO);
        let mut i = Instance::new("r");
        apply(&mut i, &r, true, at(0));
        assert_eq!(apply(&mut i, &r, true, at(5)), Effect::None);
        assert_eq!(i.state, InstanceState::Firing);
    }
}
