use std::time::Duration;

use reqwest::StatusCode;

use crate::errors::Error;
use crate::tests::test_support::{CountingExecutor, FakeTransport, gateway, pair, store_with};
use crate::transport::OutgoingRequest;

#[tokio::test(start_paused = true)]
async fn public_targets_never_carry_a_credential() {
    let store = store_with(Some(pair("A1", "R1")));
    let gateway = gateway(
        FakeTransport::new(|_, _| StatusCode::UNAUTHORIZED),
        CountingExecutor::succeeding(pair("A2", "R2")),
        store,
    );

    let login = gateway
        .send(OutgoingRequest::post("/api/auth/login/"))
        .await
        .expect("public 401 passes through");
    gateway
        .send(OutgoingRequest::post("/api/auth/register/?invite=x"))
        .await
        .expect("public 401 passes through");

    assert_eq!(login.status, StatusCode::UNAUTHORIZED);
    assert!(
        gateway
            .transport()
            .calls()
            .iter()
            .all(|(_, bearer)| bearer.is_none())
    );
    assert_eq!(gateway.coordinator().executor().calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn business_errors_pass_through_unchanged() {
    let store = store_with(Some(pair("A1", "R1")));
    let gateway = gateway(
        FakeTransport::new(|req, _| {
            if req.target.ends_with("/missing/") {
                StatusCode::NOT_FOUND
            } else if req.target.ends_with("/forbidden/") {
                StatusCode::FORBIDDEN
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }),
        CountingExecutor::succeeding(pair("A2", "R2")),
        store,
    );

    for (target, expected) in [
        ("/api/receipts/missing/", StatusCode::NOT_FOUND),
        ("/api/receipts/forbidden/", StatusCode::FORBIDDEN),
        ("/api/receipts/", StatusCode::INTERNAL_SERVER_ERROR),
    ] {
        let resp = gateway.send(OutgoingRequest::get(target)).await.unwrap();
        assert_eq!(resp.status, expected);
        assert_eq!(gateway.transport().calls_to(target).len(), 1);
    }
    assert_eq!(gateway.coordinator().executor().calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn transport_errors_propagate_without_refresh() {
    let store = store_with(Some(pair("A1", "R1")));
    let gateway = gateway(
        FakeTransport::fallible(|_, _| Err(Error::Timeout(Duration::from_secs(30)))),
        CountingExecutor::succeeding(pair("A2", "R2")),
        store,
    );

    let res = gateway.send(OutgoingRequest::get("/api/receipts/")).await;

    assert!(matches!(res, Err(Error::Timeout(_))));
    assert_eq!(gateway.coordinator().executor().calls(), 0);
}
