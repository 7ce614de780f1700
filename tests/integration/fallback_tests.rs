//! Fallback policy tests: stale snapshots under the staleness ceiling beat
//! error markers, and the marker is always a JSON object.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::test_helpers::{
    engine_with, query, test_config, vehicle_payload, FakeBackend, LoginStep, StatusStep,
};

#[tokio::test(start_paused = true)]
async fn login_failure_with_cached_entry_serves_the_stale_snapshot() {
    let backend = FakeBackend::new();
    backend.push_login(LoginStep::Succeed("JSESSIONID=one".into()));
    backend.push_login(LoginStep::Fail("connection refused".into()));
    backend.push_status(StatusStep::Data(vehicle_payload(42)));
    // Zero TTL: the second request must re-login and hit the scripted failure.
    let engine = engine_with(&test_config(5, 60, 0), Arc::new(backend));

    let first = engine.coordinator.vehicle_status(&query("344930")).await;
    assert_eq!(first, vehicle_payload(42));

    tokio::time::advance(Duration::from_secs(6)).await;
    let second = engine.coordinator.vehicle_status(&query("344930")).await;

    assert_eq!(second, vehicle_payload(42), "stale snapshot, unchanged");
    assert_eq!(engine.backend.status_calls(), 1, "no fetch without a credential");
}

#[tokio::test(start_paused = true)]
async fn login_failure_without_cache_returns_the_error_marker() {
    let backend = FakeBackend::new();
    backend.push_login(LoginStep::Fail("connection refused".into()));
    let engine = engine_with(&test_config(5, 60, 20), Arc::new(backend));

    let result = engine.coordinator.vehicle_status(&query("344930")).await;

    assert_eq!(result, json!({ "error": "login failed" }));
    assert_eq!(engine.backend.status_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_serves_the_stale_snapshot() {
    let backend = FakeBackend::new();
    backend.push_login(LoginStep::Succeed("JSESSIONID=one".into()));
    backend.push_status(StatusStep::Data(vehicle_payload(42)));
    backend.push_status(StatusStep::Transport("connection reset".into()));
    let engine = engine_with(&test_config(5, 60, 20), Arc::new(backend));

    let first = engine.coordinator.vehicle_status(&query("344930")).await;
    assert_eq!(first, vehicle_payload(42));

    tokio::time::advance(Duration::from_secs(6)).await;
    let second = engine.coordinator.vehicle_status(&query("344930")).await;

    assert_eq!(second, vehicle_payload(42));
    assert_eq!(
        engine.backend.login_calls(),
        1,
        "transport failure must not invalidate the credential"
    );
    assert_eq!(engine.backend.status_calls(), 2, "no retry for transport failures");
}

#[tokio::test(start_paused = true)]
async fn transport_failure_without_cache_returns_the_error_marker() {
    let backend = FakeBackend::new();
    backend.push_login(LoginStep::Succeed("JSESSIONID=one".into()));
    backend.push_status(StatusStep::Transport("connection reset".into()));
    let engine = engine_with(&test_config(5, 60, 20), Arc::new(backend));

    let result = engine.coordinator.vehicle_status(&query("344930")).await;

    assert_eq!(result, json!({ "error": "fetch error" }));
}

#[tokio::test(start_paused = true)]
async fn snapshot_older_than_the_ceiling_is_not_served() {
    let backend = FakeBackend::new();
    backend.push_login(LoginStep::Succeed("JSESSIONID=one".into()));
    backend.push_status(StatusStep::Data(vehicle_payload(42)));
    backend.push_status(StatusStep::Transport("connection reset".into()));
    let engine = engine_with(&test_config(5, 10, 20), Arc::new(backend));

    engine.coordinator.vehicle_status(&query("344930")).await;
    tokio::time::advance(Duration::from_secs(11)).await;
    let result = engine.coordinator.vehicle_status(&query("344930")).await;

    assert_eq!(result, json!({ "error": "fetch error" }));
}

#[tokio::test(start_paused = true)]
async fn zero_ceiling_serves_snapshots_of_any_age() {
    let backend = FakeBackend::new();
    backend.push_login(LoginStep::Succeed("JSESSIONID=one".into()));
    backend.push_status(StatusStep::Data(vehicle_payload(42)));
    backend.push_status(StatusStep::Transport("connection reset".into()));
    let engine = engine_with(&test_config(5, 0, 20), Arc::new(backend));

    engine.coordinator.vehicle_status(&query("344930")).await;
    tokio::time::advance(Duration::from_secs(3600)).await;
    let result = engine.coordinator.vehicle_status(&query("344930")).await;

    assert_eq!(result, vehicle_payload(42));
}

#[tokio::test(start_paused = true)]
async fn auth_rejection_with_failed_relogin_serves_the_stale_snapshot() {
    let backend = FakeBackend::new();
    backend.push_login(LoginStep::Succeed("JSESSIONID=one".into()));
    backend.push_login(LoginStep::Fail("connection refused".into()));
    backend.push_status(StatusStep::Data(vehicle_payload(42)));
    backend.push_status(StatusStep::AuthRejected(403));
    let engine = engine_with(&test_config(5, 60, 20), Arc::new(backend));

    engine.coordinator.vehicle_status(&query("344930")).await;
    tokio::time::advance(Duration::from_secs(6)).await;
    let result = engine.coordinator.vehicle_status(&query("344930")).await;

    assert_eq!(result, vehicle_payload(42), "stale fallback after failed re-login");
    assert_eq!(engine.backend.login_calls(), 2);
    assert_eq!(engine.backend.status_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn error_and_ambiguous_responses_never_overwrite_the_cache() {
    let backend = FakeBackend::new();
    backend.push_login(LoginStep::Succeed("JSESSIONID=one".into()));
    backend.push_status(StatusStep::Data(vehicle_payload(42)));
    backend.push_status(StatusStep::SessionDead);
    let engine = engine_with(&test_config(5, 60, 20), Arc::new(backend));

    engine.coordinator.vehicle_status(&query("344930")).await;

    // Repeated failing rounds outside the freshness window.
    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(6)).await;
        let result = engine.coordinator.vehicle_status(&query("344930")).await;
        assert_eq!(result, vehicle_payload(42), "snapshot survives failed rounds");
    }
}
