//! Runtime state, reload and registry override tests

mod common;

use std::sync::Arc;

use common::FakeDiscovery;
use syncer_common::{
    Instance, MatchType, OverrideStatus, Registration, SyncerConfig, SyncerError,
};
use syncer_core::{HealthStatus, SyncState, apply_registration};

fn config(discovery_type: &str) -> SyncerConfig {
    let yaml = format!(
        r#"
discovery-servers:
  nacos1:
    type: {discovery_type}
    host: http://127.0.0.1:8848
gateway-servers:
  apisix1:
    type: apisix
    admin-url: http://127.0.0.1:9080
    config:
      X-API-KEY: secret
targets:
  - discovery: nacos1
    gateway: apisix1
    enabled: true
  - discovery: nacos1
    gateway: apisix1
    name: disabled-one
"#
    );
    SyncerConfig::from_yaml(&yaml).unwrap()
}

// ============== Reload ==============

#[tokio::test]
async fn test_apply_config_installs_runtime() {
    let state = SyncState::new();
    state.apply_config(&config("nacos")).unwrap();

    let runtime = state.runtime();
    assert_eq!(runtime.syncers().len(), 1);
    assert_eq!(runtime.scheduler().len(), 1);
    assert_eq!(state.get_discovery_client("nacos1").unwrap().kind(), "nacos");
    assert_eq!(state.get_gateway_client("apisix1").unwrap().kind(), "apisix");
    assert!(matches!(
        state.get_gateway_client("kong1"),
        Err(SyncerError::ClientNotFound(_))
    ));

    let liveness = state.liveness();
    assert_eq!(liveness.total, 1);
    assert_eq!(liveness.status, HealthStatus::Ok);
    assert_eq!(liveness.details, vec!["syncer:nacos1-apisix1,is ok"]);
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_runtime() {
    let state = SyncState::new();
    state.apply_config(&config("nacos")).unwrap();
    let before = state.runtime();

    let err = state.apply_config(&config("consul")).unwrap_err();
    assert!(matches!(err, SyncerError::BackendUnsupported(ref t) if t == "consul"));
    assert!(Arc::ptr_eq(&before, &state.runtime()));
    assert!(state.get_discovery_client("nacos1").is_ok());
}

#[tokio::test]
async fn test_reload_replaces_runtime() {
    let state = SyncState::new();
    state.apply_config(&config("nacos")).unwrap();
    let before = state.runtime();

    state.apply_config(&config("eureka")).unwrap();
    assert!(!Arc::ptr_eq(&before, &state.runtime()));
    assert_eq!(state.get_discovery_client("nacos1").unwrap().kind(), "eureka");
}

#[test]
fn test_empty_state_is_ok() {
    let state = SyncState::new();
    let liveness = state.liveness();
    assert_eq!(liveness.total, 0);
    assert_eq!(liveness.status, HealthStatus::Ok);
    assert!(state.get_discovery_client("nacos1").is_err());
}

// ============== Registry overrides ==============

fn registration(status: OverrideStatus, other: OverrideStatus) -> Registration {
    Registration {
        match_type: MatchType::Metadata,
        regexp_str: "^gray$".to_string(),
        metadata_key: "lane".to_string(),
        status,
        other_status: other,
        service_name: "order".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_apply_registration_pushes_changed_subset() {
    let discovery = FakeDiscovery::new();
    discovery.add_service(
        "order",
        vec![
            Instance::new("10.0.0.1", 80, 1.0).with_metadata("lane", "gray"),
            Instance::new("10.0.0.2", 80, 1.0).with_metadata("lane", "main"),
        ],
    );

    let count = apply_registration(
        discovery.as_ref(),
        &registration(OverrideStatus::Down, OverrideStatus::Origin),
    )
    .await
    .unwrap();
    assert_eq!(count, 1);

    let overrides = discovery.overrides.lock().clone();
    assert_eq!(overrides.len(), 1);
    let (service, instances) = &overrides[0];
    assert_eq!(service, "order");
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].ip, "10.0.0.1");
    assert!(!instances[0].enabled);
    assert!(instances[0].changed);
}

#[tokio::test]
async fn test_apply_registration_without_changes_skips_backend() {
    let discovery = FakeDiscovery::new();
    discovery.add_service(
        "order",
        vec![Instance::new("10.0.0.2", 80, 1.0).with_metadata("lane", "main")],
    );

    let count = apply_registration(
        discovery.as_ref(),
        &registration(OverrideStatus::Up, OverrideStatus::Origin),
    )
    .await
    .unwrap();
    assert_eq!(count, 0);
    assert!(discovery.overrides.lock().is_empty());
}

#[tokio::test]
async fn test_apply_registration_surfaces_fetch_failure() {
    let discovery = FakeDiscovery::new();
    discovery.fail_service("order");
    let err = apply_registration(
        discovery.as_ref(),
        &registration(OverrideStatus::Up, OverrideStatus::Down),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SyncerError::DiscoveryUnavailable(_)));
}
