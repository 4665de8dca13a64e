pub mod transition;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use lookout_core::alert::{AlertEvent, AlertEventStatus, AlertRecord};
use lookout_core::clock::Clock;
use lookout_core::condition::{Field, Scope};
use lookout_core::instance::{self, Instance, InstanceState};
use lookout_core::rule::{Action, Rule};
use lookout_core::snapshot::{ContainerEvent, ContainerMetrics, MetricSnapshot};
use lookout_core::Result;

use crate::notifier::{NotifyJob, Notifier};
use crate::silence::SilenceMap;
use crate::store::AlertStore;

/// Invoked under the Alerter lock on every fire/resolve transition. Must never block —
/// implementations route it to the Hub (non-blocking publish) or leave it unset.
pub type ChangeCallback = Arc<dyn Fn(AlertEvent) + Send + Sync>;

struct Inner {
    instances: HashMap<String, Instance>,
}

/// The center of the system: a per-instance rule evaluator reachable concurrently from the
/// periodic collector (`evaluate`) and the event source (`evaluate_container_event`).
///
/// Holds one mutex across the whole public contract, matching the single-critical-section
/// requirement: all reads and writes to the instances map happen under that lock, Store writes
/// happen inside it (so a Firing instance's `db_id` always corresponds to a real row), and
/// Notifier sends are captured as a deferred list and executed only after the lock is released.
pub struct Alerter {
    rules: Vec<Rule>,
    store: AlertStore,
    notifier: Arc<Notifier>,
    clock: Arc<dyn Clock>,
    silence: SilenceMap,
    on_change: Option<ChangeCallback>,
    inner: Mutex<Inner>,
}

impl Alerter {
    /// `rules` must already be parsed/validated (see `Config::compile_rules`); this sorts them
    /// by name to fix the deterministic evaluation order the spec requires.
    pub fn new(
        mut rules: Vec<Rule>,
        store: AlertStore,
        notifier: Arc<Notifier>,
        clock: Arc<dyn Clock>,
        on_change: Option<ChangeCallback>,
    ) -> Self {
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            rules,
            store,
            notifier,
            clock,
            silence: SilenceMap::new(),
            on_change,
            inner: Mutex::new(Inner {
                instances: HashMap::new(),
            }),
        }
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r.name == name)
    }

    fn rule_by_name(&self, name: &str) -> Option<&Rule> {
        self.rules.binary_search_by(|r| r.name.as_str().cmp(name)).ok().map(|i| &self.rules[i])
    }

    /// Suppresses notifications only (not firings) for `rule_name` until `now + duration`.
    pub fn silence(&self, rule_name: &str, duration: chrono::Duration) {
        let now = self.clock.now();
        self.silence.silence(rule_name, now + duration);
    }

    /// Loads unresolved rows from the Store and reconstructs Firing instances. Must run once
    /// before the first tick. Emits no notification for the adoption itself; orphaned rows
    /// (rule no longer configured) are resolved immediately.
    pub async fn adopt_firing(&self) -> Result<()> {
        let rows = self.store.query_firing_alerts().await?;
        let now = self.clock.now();
        let mut guard = self.inner.lock().await;

        for row in rows {
            let rule_names = self.rules.iter().map(|r| r.name.as_str());
            match instance::owning_rule_name(&row.instance_key, rule_names) {
                Some(_) => {
                    let mut inst = Instance::new(row.instance_key.clone());
                    inst.state = InstanceState::Firing;
                    inst.fired_at = Some(row.fired_at);
                    inst.db_id = row.id;
                    guard.instances.insert(row.instance_key.clone(), inst);
                }
                None => {
                    if let Err(e) = self.store.resolve_alert(row.id, now).await {
                        tracing::warn!(error = %e, id = row.id, "failed to resolve orphaned alert row on adoption");
                    }
                }
            }
        }

        Ok(())
    }

    /// Transitions every Firing instance to Inactive with a persisted `resolved_at`. Called
    /// before replacing this Alerter on config reload.
    pub async fn resolve_all(&self) {
        let now = self.clock.now();
        let mut guard = self.inner.lock().await;
        let keys: Vec<String> = guard
            .instances
            .iter()
            .filter(|(_, i)| i.state == InstanceState::Firing)
            .map(|(k, _)| k.clone())
            .collect();

        for key in keys {
            if let Some(rule_name) = self.owning_rule_name_for(&key) {
                if let Some(rule) = self.rule_by_name(rule_name) {
                    let instance = guard.instances.get_mut(&key).unwrap();
                    self.resolve(instance, rule, now).await;
                }
            }
        }
    }

    fn owning_rule_name_for(&self, key: &str) -> Option<&str> {
        instance::owning_rule_name(key, self.rules.iter().map(|r| r.name.as_str()))
    }

    /// Evaluates every rule against one tick's snapshot, in rule-sorted then snapshot order,
    /// then garbage-collects/resolves instances whose target went unobserved this tick.
    pub async fn evaluate(&self, snapshot: &MetricSnapshot) {
        let now = self.clock.now();
        let mut seen = std::collections::HashSet::new();
        let mut deferred = Vec::new();

        {
            let mut guard = self.inner.lock().await;

            for rule in &self.rules {
                match rule.scope() {
                    Scope::Host if rule.is_disk_percent() => {
                        self.evaluate_disk_rule(&mut guard, rule, snapshot, now, &mut seen, &mut deferred)
                            .await;
                    }
                    Scope::Host => {
                        self.evaluate_host_rule(&mut guard, rule, snapshot, now, &mut seen, &mut deferred)
                            .await;
                    }
                    Scope::Container => {
                        self.evaluate_container_rule(
                            &mut guard, rule, snapshot, now, &mut seen, &mut deferred,
                        )
                        .await;
                    }
                }
            }

            self.handle_stale(&mut guard, &seen, now, &mut deferred).await;
        }

        for job in deferred {
            self.notifier.send(job);
        }
    }

    async fn evaluate_host_rule(
        &self,
        guard: &mut tokio::sync::MutexGuard<'_, Inner>,
        rule: &Rule,
        snapshot: &MetricSnapshot,
        now: DateTime<Utc>,
        seen: &mut std::collections::HashSet<String>,
        deferred: &mut Vec<NotifyJob>,
    ) {
        let key = instance::host_key(&rule.name);
        let Some(host) = &snapshot.host else {
            seen.insert(key);
            return;
        };

        let value = match rule.condition.field {
            Field::CpuPercent => host.cpu_percent,
            Field::MemPercent => host.mem_percent,
            Field::LoadAvg1 => host.load1,
            _ => None,
        };

        seen.insert(key.clone());
        let Some(value) = value else {
            // field-level collection failure: treat like a transient miss, no transition.
            return;
        };

        let matched = rule.condition.evaluate_num(value);
        self.transition_and_act(guard, rule, &key, matched, now, deferred).await;
    }

    async fn evaluate_disk_rule(
        &self,
        guard: &mut tokio::sync::MutexGuard<'_, Inner>,
        rule: &Rule,
        snapshot: &MetricSnapshot,
        now: DateTime<Utc>,
        seen: &mut std::collections::HashSet<String>,
        deferred: &mut Vec<NotifyJob>,
    ) {
        let Some(disks) = &snapshot.disks else {
            self.mark_prefix_seen(guard, &rule.name, seen);
            return;
        };

        for disk in disks {
            let key = instance::disk_key(&rule.name, &disk.mountpoint);
            seen.insert(key.clone());
            let matched = rule.condition.evaluate_num(disk.percent);
            self.transition_and_act(guard, rule, &key, matched, now, deferred).await;
        }
    }

    async fn evaluate_container_rule(
        &self,
        guard: &mut tokio::sync::MutexGuard<'_, Inner>,
        rule: &Rule,
        snapshot: &MetricSnapshot,
        now: DateTime<Utc>,
        seen: &mut std::collections::HashSet<String>,
        deferred: &mut Vec<NotifyJob>,
    ) {
        let Some(containers) = &snapshot.containers else {
            self.mark_prefix_seen(guard, &rule.name, seen);
            return;
        };

        for container in containers {
            let key = instance::container_key(&rule.name, &container.container_id);
            seen.insert(key.clone());

            let Some(matched) = evaluate_container_field(rule, container) else {
                continue;
            };
            self.transition_and_act(guard, rule, &key, matched, now, deferred).await;
        }
    }

    /// Evaluates only container-scoped, string-field rules against a single container's
    /// state-change event, bypassing the tick cadence for low latency. Numeric fields are
    /// skipped (events carry no metric samples; treating an absent numeric as zero would
    /// falsely resolve active numeric alerts). No stale handling runs here.
    pub async fn evaluate_container_event(&self, event: &ContainerEvent) {
        let now = self.clock.now();
        let mut deferred = Vec::new();

        {
            let mut guard = self.inner.lock().await;
            for rule in &self.rules {
                if rule.scope() != Scope::Container || !rule.condition.field.is_string_field() {
                    continue;
                }
                let key = instance::container_key(&rule.name, &event.metrics.container_id);
                let Some(matched) = evaluate_container_field(rule, &event.metrics) else {
                    continue;
                };
                self.transition_and_act(&mut guard, rule, &key, matched, now, &mut deferred)
                    .await;
            }
        }

        for job in deferred {
            self.notifier.send(job);
        }
    }

    fn mark_prefix_seen(
        &self,
        guard: &tokio::sync::MutexGuard<'_, Inner>,
        rule_name: &str,
        seen: &mut std::collections::HashSet<String>,
    ) {
        let prefix = instance::key_prefix(rule_name);
        for key in guard.instances.keys() {
            if key.starts_with(&prefix) {
                seen.insert(key.clone());
            }
        }
    }

    async fn transition_and_act(
        &self,
        guard: &mut tokio::sync::MutexGuard<'_, Inner>,
        rule: &Rule,
        key: &str,
        matched: bool,
        now: DateTime<Utc>,
        deferred: &mut Vec<NotifyJob>,
    ) {
        let instance = guard
            .instances
            .entry(key.to_string())
            .or_insert_with(|| Instance::new(key.to_string()));

        let effect = transition::apply(instance, rule, matched, now);
        match effect {
            transition::Effect::None => {}
            transition::Effect::Fire => {
                let instance = guard.instances.get_mut(key).unwrap();
                self.fire(instance, rule, now, deferred).await;
            }
            transition::Effect::Resolve => {
                let instance = guard.instances.get_mut(key).unwrap();
                self.resolve(instance, rule, now).await;
            }
        }
    }

    /// Persists the new row, stores its id on the instance, emits the `"firing"` state-change
    /// callback, and — for each `notify` action, if the rule is not silenced right now —
    /// appends a `NotifyJob` to `deferred`. Silence is decided at fire time, not when the
    /// deferred job is later executed.
    async fn fire(&self, instance: &mut Instance, rule: &Rule, now: DateTime<Utc>, deferred: &mut Vec<NotifyJob>) {
        let condition_text = rule.condition.render();
        let message = format!("{} matched ({})", rule.name, condition_text);

        match self
            .store
            .insert_alert(
                &rule.name,
                rule.severity,
                &condition_text,
                &instance.key,
                now,
                &message,
            )
            .await
        {
            Ok(id) => instance.db_id = id,
            Err(e) => {
                tracing::error!(error = %e, rule = %rule.name, "failed to persist fired alert; state still advances");
            }
        }

        let record = AlertRecord {
            id: instance.db_id,
            rule_name: rule.name.clone(),
            severity: rule.severity,
            condition: condition_text.clone(),
            instance_key: instance.key.clone(),
            fired_at: now,
            resolved_at: None,
            message: message.clone(),
            acknowledged: false,
        };

        if let Some(callback) = &self.on_change {
            callback(AlertEvent::firing(&record));
        }

        let silenced = self.silence.is_silenced(&rule.name, now);
        for action in &rule.actions {
            if *action == Action::Notify && !silenced {
                deferred.push(NotifyJob {
                    subject: format!("{} firing", rule.name),
                    body: message.clone(),
                    severity: rule.severity,
                    status: AlertEventStatus::Firing,
                });
            }
        }
    }

    /// Sets `resolved_at`, updates the Store row if one exists, and emits the `"resolved"`
    /// callback carrying the rule's original metadata. If `db_id == 0` (defensive: should not
    /// happen given invariant 2) this logs and does nothing further.
    async fn resolve(&self, instance: &mut Instance, rule: &Rule, now: DateTime<Utc>) {
        instance.state = InstanceState::Inactive;
        instance.resolved_at = Some(now);

        if instance.db_id == 0 {
            tracing::warn!(key = %instance.key, "resolving instance with no db_id; nothing to update");
            return;
        }

        if let Err(e) = self.store.resolve_alert(instance.db_id, now).await {
            tracing::error!(error = %e, key = %instance.key, "failed to persist resolve");
        }

        let record = AlertRecord {
            id: instance.db_id,
            rule_name: rule.name.clone(),
            severity: rule.severity,
            condition: rule.condition.render(),
            instance_key: instance.key.clone(),
            fired_at: instance.fired_at.unwrap_or(now),
            resolved_at: Some(now),
            message: String::new(),
            acknowledged: false,
        };

        if let Some(callback) = &self.on_change {
            callback(AlertEvent::resolved(&record));
        }

        instance.db_id = 0;
    }

    /// Resolves stale Firing instances, reverts stale Pending to Inactive, and GCs stale
    /// Inactive instances. "Stale" means the key was not observed in this tick's snapshot.
    async fn handle_stale(
        &self,
        guard: &mut tokio::sync::MutexGuard<'_, Inner>,
        seen: &std::collections::HashSet<String>,
        now: DateTime<Utc>,
        deferred: &mut Vec<NotifyJob>,
    ) {
        let _ = deferred; // stale resolution never enqueues a notification by itself
        let stale_keys: Vec<String> = guard
            .instances
            .keys()
            .filter(|k| !seen.contains(*k))
            .cloned()
            .collect();

        for key in stale_keys {
            let state = guard.instances.get(&key).map(|i| i.state);
            match state {
                Some(InstanceState::Firing) => {
                    if let Some(rule_name) = self.owning_rule_name_for(&key) {
                        if let Some(rule) = self.rule_by_name(rule_name) {
                            let instance = guard.instances.get_mut(&key).unwrap();
                            self.resolve(instance, rule, now).await;
                        }
                    }
                }
                Some(InstanceState::Pending) => {
                    if let Some(instance) = guard.instances.get_mut(&key) {
                        instance.state = InstanceState::Inactive;
                        instance.pending_since = None;
                    }
                }
                Some(InstanceState::Inactive) => {
                    guard.instances.remove(&key);
                }
                None => {}
            }
        }
    }
}

fn evaluate_container_field(rule: &Rule, container: &ContainerMetrics) -> Option<bool> {
    match rule.condition.field {
        Field::State => Some(rule.condition.evaluate_str(&container.state)),
        Field::Health => container
            .health
            .as_deref()
            .map(|h| rule.condition.evaluate_str(h)),
        Field::CpuPercent => container.cpu_percent.map(|v| rule.condition.evaluate_num(v)),
        Field::MemPercent => container.mem_percent.map(|v| rule.condition.evaluate_num(v)),
        Field::RestartCount => container
            .restart_count
            .map(|v| rule.condition.evaluate_num(v)),
        Field::DiskPercent | Field::LoadAvg1 => None,
    }
}

#[cfg(test)]
mod tests;
