use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::DateTime;

use lookout_core::clock::TestClock;
use lookout_core::condition::Condition;
use lookout_core::rule::{Action, Rule, Severity};
use lookout_core::snapshot::{ContainerMetrics, HostMetrics, MetricSnapshot};
use lookout_core::AlertEvent;

use super::*;

fn host_rule(name: &str, expr: &str, for_dur: u64, cooldown: u64) -> Rule {
    Rule::new(
        name,
        Condition::parse(expr).unwrap(),
        StdDuration::from_secs(for_dur),
        Severity::Critical,
        vec![Action::Notify],
        StdDuration::from_secs(cooldown),
    )
    .unwrap()
}

fn container_rule(name: &str, expr: &str, cooldown: u64) -> Rule {
    Rule::new(
        name,
        Condition::parse(expr).unwrap(),
        StdDuration::ZERO,
        Severity::Warning,
        vec![Action::Notify],
        StdDuration::from_secs(cooldown),
    )
    .unwrap()
}

async fn new_alerter(rules: Vec<Rule>, clock: TestClock) -> (Alerter, AlertStore, Arc<Mutex<Vec<AlertEvent>>>) {
    let store = AlertStore::connect_in_memory().await.unwrap();
    let notifier = Arc::new(Notifier::start(
        &lookout_core::config::NotifyConfig::default(),
        reqwest::Client::new(),
    ));
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    let callback: ChangeCallback = Arc::new(move |event| events_clone.lock().unwrap().push(event));
    let alerter = Alerter::new(rules, store.clone(), notifier, Arc::new(clock), Some(callback));
    (alerter, store, events)
}

fn host_snapshot(cpu_percent: f64) -> MetricSnapshot {
    MetricSnapshot {
        host: Some(HostMetrics {
            cpu_percent: Some(cpu_percent),
            mem_percent: None,
            load1: None,
        }),
        disks: None,
        containers: None,
    }
}

fn at(secs: i64) -> chrono::DateTime<chrono::Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

#[tokio::test]
async fn scenario_basic_fire_and_resolve() {
    let clock = TestClock::new(at(0));
    let rule = host_rule("high_cpu", "host.cpu_percent > 90", 0, 0);
    let (alerter, store, events) = new_alerter(vec![rule], clock.clone()).await;

    alerter.evaluate(&host_snapshot(95.0)).await;
    clock.set(at(10));
    alerter.evaluate(&host_snapshot(50.0)).await;

    let all = store
        .query_alerts(at(0), at(20))
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].resolved_at, Some(at(10)));

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].status, lookout_core::AlertEventStatus::Firing);
    assert_eq!(events[1].status, lookout_core::AlertEventStatus::Resolved);
}

#[tokio::test]
async fn scenario_cooldown_suppresses_refire() {
    let clock = TestClock::new(at(0));
    let rule = host_rule("high_cpu", "host.cpu_percent > 90", 0, 300);
    let (alerter, store, _events) = new_alerter(vec![rule], clock.clone()).await;

    alerter.evaluate(&host_snapshot(95.0)).await; // t=0 fire
    clock.set(at(10));
    alerter.evaluate(&host_snapshot(50.0)).await; // t=10 resolve
    clock.set(at(70));
    alerter.evaluate(&host_snapshot(95.0)).await; // t=70 suppressed (cooldown)
    clock.set(at(370));
    alerter.evaluate(&host_snapshot(95.0)).await; // t=370 fires again

    let all = store.query_alerts(at(0), at(400)).await.unwrap();
    assert_eq!(all.len(), 2, "expected exactly 2 rows, cooldown should suppress the t=70 fire");
}

#[tokio::test]
async fn scenario_for_duration_debounce() {
    let clock = TestClock::new(at(0));
    let rule = host_rule("high_cpu", "host.cpu_percent > 90", 10, 0);
    let (alerter, store, _events) = new_alerter(vec![rule], clock.clone()).await;

    alerter.evaluate(&host_snapshot(95.0)).await; // t=0 -> pending
    let all = store.query_alerts(at(0), at(20)).await.unwrap();
    assert!(all.is_empty());

    clock.set(at(10));
    alerter.evaluate(&host_snapshot(95.0)).await; // t=10 -> fires

    let all = store.query_alerts(at(0), at(20)).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].fired_at, at(10));
}

fn container(id: &str, state: &str) -> ContainerMetrics {
    ContainerMetrics {
        container_id: id.to_string(),
        name: id.to_string(),
        state: state.to_string(),
        health: None,
        cpu_percent: None,
        mem_percent: None,
        restart_count: None,
        started_at: None,
    }
}

#[tokio::test]
async fn scenario_per_instance_cooldown_is_independent_across_containers() {
    let clock = TestClock::new(at(0));
    let rule = container_rule("exited", "container.state == 'exited'", 300);
    let (alerter, store, _events) = new_alerter(vec![rule], clock.clone()).await;

    let snap_a = MetricSnapshot {
        host: None,
        disks: None,
        containers: Some(vec![container("aaa", "exited")]),
    };
    alerter.evaluate(&snap_a).await; // aaa fires @ 0

    clock.set(at(10));
    let snap_resolve_a = MetricSnapshot {
        host: None,
        disks: None,
        containers: Some(vec![container("aaa", "running")]),
    };
    alerter.evaluate(&snap_resolve_a).await; // aaa resolves @ 10

    clock.set(at(70));
    let snap_b = MetricSnapshot {
        host: None,
        disks: None,
        containers: Some(vec![
            container("aaa", "running"),
            container("bbb", "exited"),
        ]),
    };
    alerter.evaluate(&snap_b).await; // bbb should fire immediately, independent cooldown

    let all = store.query_alerts(at(0), at(100)).await.unwrap();
    assert_eq!(all.len(), 2);
    let bbb_row = all.iter().find(|r| r.instance_key == "exited:bbb").unwrap();
    assert_eq!(bbb_row.fired_at, at(70));
}

#[tokio::test]
async fn scenario_stale_container_resolves_then_gcs() {
    let clock = TestClock::new(at(0));
    let rule = container_rule("exited", "container.state == 'exited'", 0);
    let (alerter, store, _events) = new_alerter(vec![rule], clock.clone()).await;

    let snap = MetricSnapshot {
        host: None,
        disks: None,
        containers: Some(vec![container("aaa", "exited")]),
    };
    alerter.evaluate(&snap).await;

    clock.set(at(5));
    let empty = MetricSnapshot {
        host: None,
        disks: None,
        containers: Some(vec![]),
    };
    alerter.evaluate(&empty).await; // container vanished: resolves at this tick

    let all = store.query_alerts(at(0), at(10)).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].resolved_at, Some(at(5)));

    {
        let guard = alerter.inner.lock().await;
        assert!(guard.instances.contains_key("exited:aaa"));
    }

    clock.set(at(6));
    alerter.evaluate(&empty).await; // next tick: GC'd since it's Inactive and unseen

    let guard = alerter.inner.lock().await;
    assert!(!guard.instances.contains_key("exited:aaa"));
}

#[tokio::test]
async fn scenario_adoption_across_restart() {
    let clock = TestClock::new(at(100));
    let rule = host_rule("high_cpu", "host.cpu_percent > 90", 0, 0);
    let store = AlertStore::connect_in_memory().await.unwrap();
    store
        .insert_alert(
            "high_cpu",
            Severity::Critical,
            "host.cpu_percent > 90",
            "high_cpu",
            at(50),
            "adopted",
        )
        .await
        .unwrap();

    let notifier = Arc::new(Notifier::start(
        &lookout_core::config::NotifyConfig::default(),
        reqwest::Client::new(),
    ));
    let events: Arc<Mutex<Vec<AlertEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    let callback: ChangeCallback = Arc::new(move |e| events_clone.lock().unwrap().push(e));
    let alerter = Alerter::new(vec![rule], store.clone(), notifier, Arc::new(clock), Some(callback));

    alerter.adopt_firing().await.unwrap();

    {
        let guard = alerter.inner.lock().await;
        let inst = guard.instances.get("high_cpu").unwrap();
        assert_eq!(inst.state, lookout_core::InstanceState::Firing);
        assert_eq!(inst.fired_at, Some(at(50)));
    }

    let all = store.query_alerts(at(0), at(200)).await.unwrap();
    assert_eq!(all.len(), 1, "adoption must not insert a new row");
    assert!(events.lock().unwrap().is_empty(), "adoption emits no event");
}

#[tokio::test]
async fn nil_snapshot_field_never_causes_firing_to_inactive() {
    let clock = TestClock::new(at(0));
    let rule = host_rule("high_cpu", "host.cpu_percent > 90", 0, 0);
    let (alerter, store, _events) = new_alerter(vec![rule], clock.clone()).await;

    alerter.evaluate(&host_snapshot(95.0)).await;
    clock.set(at(5));
    let missing_host = MetricSnapshot {
        host: None,
        disks: None,
        containers: None,
    };
    alerter.evaluate(&missing_host).await;

    let firing = store.query_firing_alerts().await.unwrap();
    assert_eq!(firing.len(), 1, "a nil host scope must not resolve the firing alert");
}

#[tokio::test]
async fn evaluate_container_event_fires_string_rule_on_a_single_event() {
    let clock = TestClock::new(at(0));
    let rule = container_rule("exited", "container.state == 'exited'", 0);
    let (alerter, store, events) = new_alerter(vec![rule], clock.clone()).await;

    let event = lookout_core::snapshot::ContainerEvent {
        metrics: container("aaa", "exited"),
    };
    alerter.evaluate_container_event(&event).await;

    let all = store.query_alerts(at(0), at(10)).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].instance_key, "exited:aaa");
    assert_eq!(events.lock().unwrap().len(), 1, "firing must publish one change event");
}

#[tokio::test]
async fn evaluate_container_event_ignores_numeric_rules() {
    let clock = TestClock::new(at(0));
    let rule = container_rule("high_container_cpu", "container.cpu_percent > 90", 0);
    let (alerter, store, _events) = new_alerter(vec![rule], clock.clone()).await;

    let mut metrics = container("aaa", "running");
    metrics.cpu_percent = Some(95.0);
    let event = lookout_core::snapshot::ContainerEvent { metrics };
    alerter.evaluate_container_event(&event).await;

    let all = store.query_alerts(at(0), at(10)).await.unwrap();
    assert!(all.is_empty(), "numeric-field rules must be skipped on the event path");
}

#[tokio::test]
async fn adopt_firing_is_idempotent() {
    let clock = TestClock::new(at(100));
    let rule = host_rule("high_cpu", "host.cpu_percent > 90", 0, 0);
    let store = AlertStore::connect_in_memory().await.unwrap();
    store
        .insert_alert("high_cpu", Severity::Critical, "host.cpu_percent > 90", "high_cpu", at(50), "")
        .await
        .unwrap();
    let notifier = Arc::new(Notifier::start(&lookout_core::config::NotifyConfig::default(), reqwest::Client::new()));
    let alerter = Alerter::new(vec![rule], store, notifier, Arc::new(clock), None);

    alerter.adopt_firing().await.unwrap();
    let snapshot_after_first: Vec<(String, lookout_core::InstanceState)> = {
        let guard = alerter.inner.lock().await;
        guard.instances.iter().map(|(k, v)| (k.clone(), v.state)).collect()
    };

    alerter.adopt_firing().await.unwrap();
    let snapshot_after_second: Vec<(String, lookout_core::InstanceState)> = {
        let guard = alerter.inner.lock().await;
        guard.instances.iter().map(|(k, v)| (k.clone(), v.state)).collect()
    };

    assert_eq!(snapshot_after_first, snapshot_after_second);
}
