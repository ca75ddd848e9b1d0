use std::sync::Arc;

use tokio::sync::broadcast::error::TryRecvError;

use crate::credentials::{CredentialStore, MemoryCredentialStore};
use crate::refresh::SingleFlightCoordinator;
use crate::session::SessionSignal;
use crate::telemetry::refresh::RefreshRole;
use crate::tests::test_support::{
    CountingExecutor, FakeTransport, capture_logs, drain_logs, gateway, pair, store_with,
};
use crate::transport::OutgoingRequest;

#[tokio::test(start_paused = true)]
async fn concurrent_401s_share_one_refresh_and_retry_once_each() {
    let store = store_with(Some(pair("A1", "R1")));
    let gateway = gateway(
        FakeTransport::accepting("A2"),
        CountingExecutor::succeeding(pair("A2", "R2")),
        store.clone(),
    );
    let mut events = gateway.subscribe();

    let (r1, r2, r3) = tokio::join!(
        gateway.send(OutgoingRequest::get("/api/receipts/1/")),
        gateway.send(OutgoingRequest::get("/api/receipts/2/")),
        gateway.send(OutgoingRequest::get("/api/receipts/3/")),
    );

    for resp in [r1, r2, r3] {
        assert_eq!(resp.expect("retry should succeed").status.as_u16(), 200);
    }
    assert_eq!(gateway.coordinator().executor().calls(), 1);
    assert_eq!(gateway.coordinator().executor().presented(), vec!["R1".to_string()]);

    for target in ["/api/receipts/1/", "/api/receipts/2/", "/api/receipts/3/"] {
        assert_eq!(
            gateway.transport().calls_to(target),
            vec![Some("A1".to_string()), Some("A2".to_string())],
            "{target} should be sent once with the stale credential and retried once"
        );
    }
    assert_eq!(store.get(), Some(pair("A2", "R2")));
    assert!(!gateway.coordinator().in_flight());
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn concurrent_refresh_calls_observe_the_same_outcome() {
    let store = Arc::new(MemoryCredentialStore::with_pair(pair("A1", "R1")));
    let coordinator = SingleFlightCoordinator::new(
        CountingExecutor::succeeding(pair("A2", "R2")),
        store.clone(),
        SessionSignal::new(store.clone()),
    );

    let (a, b, c) = tokio::join!(
        coordinator.refresh(),
        coordinator.refresh(),
        coordinator.refresh_after(Some("A1")),
    );

    assert_eq!(a.unwrap(), pair("A2", "R2"));
    assert_eq!(b.unwrap(), pair("A2", "R2"));
    assert_eq!(c.outcome.unwrap(), pair("A2", "R2"));
    assert_eq!(c.role, RefreshRole::Follower);
    assert_eq!(coordinator.executor().calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn settled_cycle_frees_the_slot_for_the_next_one() {
    let store = Arc::new(MemoryCredentialStore::with_pair(pair("A1", "R1")));
    let coordinator = SingleFlightCoordinator::new(
        CountingExecutor::succeeding(pair("A2", "R2")),
        store.clone(),
        SessionSignal::new(store.clone()),
    );

    let first = coordinator.refresh_after(Some("A1")).await;
    assert_eq!(first.role, RefreshRole::Leader);
    assert!(!coordinator.in_flight());

    coordinator.refresh().await.unwrap();
    assert_eq!(coordinator.executor().calls(), 2);
    assert_eq!(
        coordinator.executor().presented(),
        vec!["R1".to_string(), "R2".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn late_401_after_rotation_reuses_the_stored_credential() {
    let store = Arc::new(MemoryCredentialStore::with_pair(pair("A2", "R2")));
    let coordinator = SingleFlightCoordinator::new(
        CountingExecutor::succeeding(pair("A3", "R3")),
        store.clone(),
        SessionSignal::new(store.clone()),
    );

    let ticket = coordinator.refresh_after(Some("A1")).await;

    assert_eq!(ticket.outcome.unwrap(), pair("A2", "R2"));
    assert_eq!(coordinator.executor().calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn requests_after_refresh_use_the_new_credential() {
    let store = store_with(Some(pair("A1", "R1")));
    let gateway = gateway(
        FakeTransport::accepting("A2"),
        CountingExecutor::succeeding(pair("A2", "R2")),
        store.clone(),
    );

    gateway
        .send(OutgoingRequest::get("/api/receipts/"))
        .await
        .expect("first request recovers");

    let (lines, guard) = capture_logs();
    gateway
        .send(OutgoingRequest::get("/api/receipts/summary/"))
        .await
        .expect("second request succeeds directly");
    drop(guard);

    assert_eq!(
        gateway.transport().calls_to("/api/receipts/summary/"),
        vec![Some("A2".to_string())]
    );
    assert_eq!(gateway.coordinator().executor().calls(), 1);
    let logs = drain_logs(lines);
    assert!(
        !logs.iter().any(|line| line.contains("refresh.start")),
        "no refresh expected, got {:?}",
        logs
    );
}
