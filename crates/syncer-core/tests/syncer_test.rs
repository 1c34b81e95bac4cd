//! Reconciliation and scheduling tests against in-memory backends

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeDiscovery, FakeGateway};
use syncer_common::{Instance, SyncerError, Target};
use syncer_core::{HealthRegistry, HealthStatus, Scheduler, Syncer};

fn target() -> Target {
    Target::new("nacos1", "apisix1")
}

fn syncer(
    target: Target,
    discovery: &Arc<FakeDiscovery>,
    gateway: &Arc<FakeGateway>,
    health: &HealthRegistry,
) -> Syncer {
    Syncer::new(target, discovery.clone(), gateway.clone(), health.clone()).unwrap()
}

// ============== Run ==============

#[tokio::test]
async fn test_run_pushes_plan_then_settles() {
    let discovery = FakeDiscovery::new();
    discovery.add_service(
        "order",
        vec![Instance::new("10.0.0.1", 80, 1.0), Instance::new("10.0.0.2", 80, 5.0)],
    );
    let gateway = FakeGateway::new();
    gateway.set_upstream(
        "nacos1-order",
        vec![Instance::new("10.0.0.2", 80, 3.0), Instance::new("10.0.0.3", 80, 1.0)],
    );
    let health = HealthRegistry::new();
    let syncer = syncer(target(), &discovery, &gateway, &health);

    let summary = syncer.run().await.unwrap();
    assert_eq!(summary.pushed, 1);

    let pushes = gateway.pushes.lock().clone();
    let (upstream, template, plan) = &pushes[0];
    assert_eq!(upstream, "nacos1-order");
    assert!(template.is_none());
    assert_eq!(plan.additions().count(), 1);
    assert_eq!(plan.updates().count(), 1);
    assert_eq!(plan.removals().count(), 1);

    // the gateway now mirrors discovery, so the next run is a no-op
    let summary = syncer.run().await.unwrap();
    assert_eq!(summary.pushed, 0);
    assert_eq!(gateway.pushes.lock().len(), 1);
}

#[tokio::test]
async fn test_excluded_service_is_never_touched() {
    let discovery = FakeDiscovery::new();
    discovery.add_service("payments-internal", vec![Instance::new("10.0.0.1", 80, 1.0)]);
    discovery.add_service("payments", vec![Instance::new("10.0.0.2", 80, 1.0)]);
    let gateway = FakeGateway::new();
    let health = HealthRegistry::new();

    let mut target = target();
    target.exclude_service = vec!["internal$".to_string()];
    let syncer = syncer(target, &discovery, &gateway, &health);

    let summary = syncer.run().await.unwrap();
    assert_eq!(summary.excluded, 1);
    assert_eq!(discovery.fetched(), vec!["payments"]);
    assert_eq!(gateway.pushed_upstreams(), vec!["nacos1-payments"]);
}

#[tokio::test]
async fn test_embedded_instances_are_not_refetched() {
    let discovery = FakeDiscovery::new();
    discovery.add_embedded_service("ORDER", vec![Instance::new("10.0.0.1", 8080, 1.0)]);
    let gateway = FakeGateway::new();
    let health = HealthRegistry::new();

    let mut target = Target::new("eureka1", "kong1");
    target.upstream_prefix = "eu".to_string();
    target
        .config
        .insert("template".to_string(), r#"{"name":"{{.Name}}"}"#.to_string());
    let syncer = syncer(target, &discovery, &gateway, &health);

    syncer.run().await.unwrap();
    assert!(discovery.fetched().is_empty());
    let pushes = gateway.pushes.lock().clone();
    assert_eq!(pushes[0].0, "eu-ORDER");
    assert_eq!(pushes[0].1.as_deref(), Some(r#"{"name":"{{.Name}}"}"#));
    assert_eq!(gateway.upstream("eu-ORDER").len(), 1);
}

#[tokio::test]
async fn test_fetch_failure_aborts_rest_of_run() {
    let discovery = FakeDiscovery::new();
    discovery.add_service("a", vec![Instance::new("10.0.0.1", 80, 1.0)]);
    discovery.add_service("b", vec![Instance::new("10.0.0.2", 80, 1.0)]);
    discovery.add_service("c", vec![Instance::new("10.0.0.3", 80, 1.0)]);
    discovery.fail_service("b");
    let gateway = FakeGateway::new();
    let health = HealthRegistry::new();
    let syncer = syncer(target(), &discovery, &gateway, &health);
    health.seed("nacos1-apisix1", 0);

    let err = syncer.run().await.unwrap_err();
    assert!(matches!(err, SyncerError::DiscoveryUnavailable(_)));
    assert_eq!(discovery.fetched(), vec!["a", "b"]);
    assert_eq!(gateway.pushed_upstreams(), vec!["nacos1-a"]);
    assert_eq!(health.last_run("nacos1-apisix1"), Some(0));
}

#[tokio::test]
async fn test_push_failure_aborts_run() {
    let discovery = FakeDiscovery::new();
    discovery.add_service("a", vec![Instance::new("10.0.0.1", 80, 1.0)]);
    discovery.add_service("b", vec![Instance::new("10.0.0.2", 80, 1.0)]);
    let gateway = FakeGateway::new();
    gateway.fail_upstream("nacos1-a");
    let health = HealthRegistry::new();
    let syncer = syncer(target(), &discovery, &gateway, &health);

    assert!(matches!(syncer.run().await, Err(SyncerError::SyncFailed(_))));
    assert_eq!(discovery.fetched(), vec!["a"]);
    assert!(gateway.pushed_upstreams().is_empty());
}

#[tokio::test]
async fn test_successful_run_stamps_health() {
    let discovery = FakeDiscovery::new();
    let gateway = FakeGateway::new();
    let health = HealthRegistry::new();
    let syncer = syncer(target(), &discovery, &gateway, &health);
    health.seed("nacos1-apisix1", 0);

    syncer.run().await.unwrap();
    assert!(health.last_run("nacos1-apisix1").unwrap() > 0);
}

#[test]
fn test_invalid_exclusion_is_rejected() {
    let mut target = target();
    target.exclude_service = vec!["(".to_string()];
    let result = Syncer::new(target, FakeDiscovery::new(), FakeGateway::new(), HealthRegistry::new());
    assert!(matches!(result, Err(SyncerError::InvalidPattern { .. })));
}

// ============== Scheduling ==============

#[tokio::test(start_paused = true)]
async fn test_failed_tick_does_not_stop_schedule() {
    let discovery = FakeDiscovery::new();
    discovery.add_service("order", vec![Instance::new("10.0.0.1", 80, 1.0)]);
    discovery.fail_next_listings(1);
    let gateway = FakeGateway::new();
    let health = HealthRegistry::new();

    let scheduler = Scheduler::new();
    scheduler.schedule(Arc::new(syncer(target(), &discovery, &gateway, &health)));

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(gateway.pushed_upstreams().is_empty());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(gateway.pushed_upstreams(), vec!["nacos1-order"]);
    scheduler.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_failing_target_does_not_affect_others() {
    let broken = FakeDiscovery::new();
    broken.fail_next_listings(usize::MAX);
    let healthy = FakeDiscovery::new();
    healthy.add_service("order", vec![Instance::new("10.0.0.1", 80, 1.0)]);
    let gateway = FakeGateway::new();
    let health = HealthRegistry::new();

    let scheduler = Scheduler::new();
    scheduler.schedule(Arc::new(syncer(
        Target::new("broken", "apisix1"),
        &broken,
        &gateway,
        &health,
    )));
    scheduler.schedule(Arc::new(syncer(
        Target::new("healthy", "apisix1"),
        &healthy,
        &gateway,
        &health,
    )));

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(gateway.pushed_upstreams(), vec!["healthy-order"]);
    scheduler.stop();

    health.seed("broken-apisix1", 0);
    let liveness = health.liveness(
        [("broken-apisix1", 10), ("healthy-apisix1", 10)],
        syncer_common::unix_timestamp(),
        Duration::ZERO,
    );
    assert_eq!(liveness.status, HealthStatus::Warn);
    assert_eq!(liveness.lost, 1);
}
