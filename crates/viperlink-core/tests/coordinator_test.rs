#![allow(clippy::unwrap_used)]
// Integration tests for the polling coordinator, driven end-to-end
// against a wiremock SmartStart backend.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use viperlink_core::{AccountConfig, Coordinator, CoreError};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(vehicle_ids: &[&str], refresh_interval_secs: u64) -> (MockServer, Coordinator) {
    let server = MockServer::start().await;
    let config = AccountConfig {
        base_url: Url::parse(&server.uri()).unwrap(),
        username: "driver@example.com".into(),
        password: SecretString::from("test-password".to_owned()),
        vehicle_ids: vehicle_ids.iter().map(ToString::to_string).collect(),
        refresh_interval_secs,
        ..AccountConfig::default()
    };
    let coordinator = Coordinator::new(&config).unwrap();
    (server, coordinator)
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": { "authToken": { "accessToken": "tok-1", "expiration": 0 } }
        })))
        .mount(server)
        .await;
}

async fn mount_devices(server: &MockServer, ids: &[&str]) {
    let devices: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "id": id, "name": format!("Vehicle {id}") }))
        .collect();

    Mock::given(method("GET"))
        .and(path("/devices/search/null"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "results": { "devices": devices } })),
        )
        .mount(server)
        .await;
}

async fn mount_command(server: &MockServer, device: &str, command: &str, resp: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/devices/command"))
        .and(body_partial_json(
            json!({ "command": command, "deviceId": device }),
        ))
        .respond_with(resp)
        .mount(server)
        .await;
}

fn active_body(ignition_on: bool) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "results": { "device": {
            "latitude": "44.97",
            "longitude": "-93.26",
            "deviceStatus": { "ignitionOn": ignition_on }
        }}
    }))
}

fn current_body(doors_locked: bool, remote_starter_active: Option<bool>) -> ResponseTemplate {
    let mut device_status = json!({ "doorsLocked": doors_locked });
    if let Some(active) = remote_starter_active {
        device_status["remoteStarterActive"] = json!(active);
    }

    ResponseTemplate::new(200).set_body_json(json!({
        "results": { "device": { "deviceStatus": device_status } }
    }))
}

async fn command_request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|req| req.url.path() == "/devices/command")
        .count()
}

// ── Partial failure & carry-forward ─────────────────────────────────

#[tokio::test]
async fn partial_vehicle_failure_keeps_cycle_successful() {
    let (server, coordinator) = setup(&["v1", "v2"], 0).await;
    mount_login(&server).await;
    mount_devices(&server, &["v1", "v2"]).await;

    // v1: both reads succeed. v2: active read fails, current succeeds.
    mount_command(&server, "v1", "read_active", active_body(true)).await;
    mount_command(&server, "v1", "read_current", current_body(false, None)).await;
    mount_command(
        &server,
        "v2",
        "read_active",
        ResponseTemplate::new(500).set_body_string("backend hiccup"),
    )
    .await;
    mount_command(&server, "v2", "read_current", current_body(true, None)).await;

    coordinator.connect().await.unwrap();

    let snapshot = coordinator.snapshot().unwrap();
    assert_eq!(snapshot.len(), 2);

    let v1 = snapshot.get("v1").unwrap();
    assert_eq!(v1.ignition_on, Some(true));

    let v2 = snapshot.get("v2").unwrap();
    assert_eq!(v2.doors_locked, Some(true));
    // ReadA-owned fields stay unknown for v2.
    assert_eq!(v2.latitude, None);
    assert_eq!(v2.ignition_on, None);

    assert!(coordinator.last_updated().is_some());
    coordinator.shutdown().await;
}

#[tokio::test]
async fn failed_vehicle_carries_previous_status_forward() {
    let (server, coordinator) = setup(&["v1"], 0).await;
    mount_login(&server).await;
    mount_devices(&server, &["v1"]).await;

    // First cycle succeeds, then the backend starts erroring.
    Mock::given(method("POST"))
        .and(path("/devices/command"))
        .and(body_partial_json(json!({ "command": "read_active" })))
        .respond_with(active_body(true))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/devices/command"))
        .and(body_partial_json(json!({ "command": "read_current" })))
        .respond_with(current_body(true, None))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/devices/command"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    coordinator.connect().await.unwrap();
    let first = coordinator.vehicle_status("v1").unwrap();
    assert_eq!(first.ignition_on, Some(true));

    // Second cycle: both reads fail; the previous entry must survive.
    coordinator.refresh().await.unwrap();

    let second = coordinator.vehicle_status("v1").unwrap();
    assert_eq!(second, first);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn all_vehicles_failing_with_no_prior_data_fails_the_cycle() {
    let (server, coordinator) = setup(&["v1", "v2"], 0).await;
    mount_login(&server).await;
    mount_devices(&server, &["v1", "v2"]).await;

    Mock::given(method("POST"))
        .and(path("/devices/command"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = coordinator.connect().await;

    match result {
        Err(CoreError::UpdateFailed { ref message }) => {
            assert!(message.contains("Vehicle v1"), "missing v1 in: {message}");
            assert!(message.contains("Vehicle v2"), "missing v2 in: {message}");
        }
        other => panic!("expected UpdateFailed, got: {other:?}"),
    }
    assert!(coordinator.snapshot().is_none());
}

#[tokio::test]
async fn empty_tracked_list_fails_with_generic_message() {
    let (server, coordinator) = setup(&[], 0).await;
    mount_login(&server).await;
    mount_devices(&server, &[]).await;

    let result = coordinator.connect().await;

    match result {
        Err(CoreError::UpdateFailed { ref message }) => {
            assert!(
                message.contains("No data received"),
                "unexpected message: {message}"
            );
        }
        other => panic!("expected UpdateFailed, got: {other:?}"),
    }
}

// ── Authentication handling ─────────────────────────────────────────

#[tokio::test]
async fn rejected_login_requires_reauthentication() {
    let (server, coordinator) = setup(&["v1"], 0).await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let result = coordinator.connect().await;

    // Must be distinguishable from a retryable failure.
    assert!(
        matches!(result, Err(CoreError::AuthenticationRequired { .. })),
        "expected AuthenticationRequired, got: {result:?}"
    );
}

#[tokio::test]
async fn expired_session_is_repaired_by_one_retry() {
    let (server, coordinator) = setup(&["v1"], 0).await;
    mount_login(&server).await;
    mount_devices(&server, &["v1"]).await;

    // The first cycle's two reads hit 401; after re-authentication the
    // retry succeeds.
    Mock::given(method("POST"))
        .and(path("/devices/command"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_command(&server, "v1", "read_active", active_body(true)).await;
    mount_command(&server, "v1", "read_current", current_body(true, None)).await;

    coordinator.connect().await.unwrap();

    let status = coordinator.vehicle_status("v1").unwrap();
    assert_eq!(status.ignition_on, Some(true));
    assert_eq!(status.doors_locked, Some(true));

    // Initial login plus the mid-cycle re-authentication.
    let logins = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|req| req.url.path() == "/auth/login")
        .count();
    assert_eq!(logins, 2);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn failed_reauthentication_is_isolated_per_vehicle() {
    let (server, coordinator) = setup(&["v1"], 0).await;
    mount_login(&server).await;
    mount_devices(&server, &["v1"]).await;
    mount_command(&server, "v1", "read_active", active_body(false)).await;
    mount_command(&server, "v1", "read_current", current_body(true, None)).await;

    coordinator.connect().await.unwrap();
    let first = coordinator.vehicle_status("v1").unwrap();

    // Backend now rejects everything, including the re-login.
    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/devices/command"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    // Prior data exists, so the cycle still succeeds with carry-forward;
    // the credential problem never escalates to AuthenticationRequired.
    coordinator.refresh().await.unwrap();
    assert_eq!(coordinator.vehicle_status("v1").unwrap(), first);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn cycle_level_api_error_returns_previous_snapshot() {
    let (server, coordinator) = setup(&["v1"], 0).await;
    mount_login(&server).await;
    mount_devices(&server, &["v1"]).await;
    mount_command(&server, "v1", "read_active", active_body(true)).await;
    mount_command(&server, "v1", "read_current", current_body(true, None)).await;

    coordinator.connect().await.unwrap();
    let first = coordinator.vehicle_status("v1").unwrap();
    let first_updated = coordinator.last_updated();

    // Force the next cycle through the login step, and make it fail
    // with a content problem (API-class, not auth-class).
    coordinator.api().invalidate_token();
    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway down</html>"))
        .mount(&server)
        .await;

    // Previous snapshot exists: the cycle succeeds and keeps it.
    coordinator.refresh().await.unwrap();
    assert_eq!(coordinator.vehicle_status("v1").unwrap(), first);
    assert_eq!(coordinator.last_updated(), first_updated);

    coordinator.shutdown().await;
}

// ── Cadence ─────────────────────────────────────────────────────────

#[tokio::test]
async fn boost_reverts_when_no_remote_start_is_active() {
    let (server, coordinator) = setup(&["v1"], 0).await;
    mount_login(&server).await;
    // remoteStarterActive absent counts as inactive.
    mount_command(&server, "v1", "read_active", active_body(false)).await;
    mount_command(&server, "v1", "read_current", current_body(true, None)).await;

    coordinator.start_boosted_polling();
    assert!(coordinator.is_boosted());

    coordinator.refresh().await.unwrap();
    assert!(!coordinator.is_boosted());
}

#[tokio::test]
async fn boost_survives_while_remote_start_is_active() {
    let (server, coordinator) = setup(&["v1"], 0).await;
    mount_login(&server).await;
    mount_command(&server, "v1", "read_active", active_body(true)).await;
    mount_command(&server, "v1", "read_current", current_body(false, Some(true))).await;

    coordinator.start_boosted_polling();
    coordinator.refresh().await.unwrap();

    assert!(coordinator.is_boosted());
}

#[tokio::test]
async fn manual_refresh_does_not_change_cadence() {
    let (server, coordinator) = setup(&["v1"], 0).await;
    mount_login(&server).await;
    mount_command(&server, "v1", "read_active", active_body(false)).await;
    mount_command(&server, "v1", "read_current", current_body(true, None)).await;

    assert!(!coordinator.is_boosted());
    coordinator.refresh().await.unwrap();
    assert!(!coordinator.is_boosted());
}

// ── Polling timer ───────────────────────────────────────────────────

#[tokio::test]
async fn disabled_interval_never_polls_automatically() {
    let (server, coordinator) = setup(&["v1"], 0).await;
    mount_login(&server).await;
    mount_devices(&server, &["v1"]).await;
    mount_command(&server, "v1", "read_active", active_body(true)).await;
    mount_command(&server, "v1", "read_current", current_body(true, None)).await;

    coordinator.connect().await.unwrap();
    let after_connect = command_request_count(&server).await;
    assert_eq!(after_connect, 2);

    // No timer is armed; nothing further should arrive on its own.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(command_request_count(&server).await, after_connect);

    // An explicit request still triggers a cycle.
    coordinator.request_refresh();
    let mut waited = Duration::ZERO;
    while command_request_count(&server).await == after_connect {
        assert!(waited < Duration::from_secs(5), "manual refresh never ran");
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += Duration::from_millis(50);
    }

    coordinator.shutdown().await;
}

#[tokio::test]
async fn configured_interval_polls_automatically() {
    let (server, coordinator) = setup(&["v1"], 1).await;
    mount_login(&server).await;
    mount_devices(&server, &["v1"]).await;
    mount_command(&server, "v1", "read_active", active_body(true)).await;
    mount_command(&server, "v1", "read_current", current_body(true, None)).await;

    coordinator.connect().await.unwrap();
    let after_connect = command_request_count(&server).await;

    let mut waited = Duration::ZERO;
    while command_request_count(&server).await <= after_connect {
        assert!(waited < Duration::from_secs(5), "timer never fired");
        tokio::time::sleep(Duration::from_millis(100)).await;
        waited += Duration::from_millis(100);
    }

    coordinator.shutdown().await;
}

// ── Identity cache ──────────────────────────────────────────────────

#[tokio::test]
async fn identity_cache_is_filtered_to_tracked_ids() {
    let (server, coordinator) = setup(&["v1"], 0).await;
    mount_login(&server).await;
    mount_devices(&server, &["v1", "untracked"]).await;
    mount_command(&server, "v1", "read_active", active_body(true)).await;
    mount_command(&server, "v1", "read_current", current_body(true, None)).await;

    coordinator.connect().await.unwrap();

    assert_eq!(coordinator.vehicle_ids(), ["v1"]);
    let vehicle = coordinator.vehicle("v1").unwrap();
    assert_eq!(vehicle.name, "Vehicle v1");
    assert!(coordinator.vehicle("untracked").is_none());

    coordinator.shutdown().await;
}
