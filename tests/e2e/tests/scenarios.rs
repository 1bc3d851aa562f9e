// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios exercising the full in-process HTTP router: the
//! subscribe/publish round-trip, durable replay across reconnects, and
//! dotted-path query filtering. Node lifecycle transitions are covered at
//! the core-crate unit level in `kernelci_core::driver`.

use std::sync::Arc;

use axum_test::TestServer;
use kernelci_api::auth::{Authenticator, BearerAuthenticator};
use kernelci_api::config::ApiConfig;
use kernelci_api::routes::build_router;
use kernelci_api::state::AppState;
use kernelci_core::config::CoreConfig;
use tokio_util::sync::CancellationToken;

const SECRET: &str = "test-secret";

fn auth_header(principal: &str) -> (&'static str, String) {
    ("authorization", format!("Bearer {SECRET}|{principal}"))
}

fn test_config() -> ApiConfig {
    ApiConfig {
        host: "127.0.0.1".to_owned(),
        port: 0,
        secret_key: SECRET.to_owned(),
        core: CoreConfig { driver_tick_seconds: 3600, listen_wait_budget_seconds: 2, ..Default::default() },
    }
}

fn server() -> TestServer {
    let authenticator: Arc<dyn Authenticator> = Arc::new(BearerAuthenticator::new(SECRET));
    let state = AppState::new(&test_config(), authenticator, CancellationToken::new());
    TestServer::new(build_router(state)).expect("build test server")
}

// -- subscribe/publish round-trip ---------------------------------------------

#[tokio::test]
async fn subscribe_then_publish_is_delivered() {
    let server = server();
    let (hk, hv) = auth_header("alice");

    let sub = server.post("/subscribe/node").add_header(hk, &hv).json(&serde_json::json!({})).await;
    sub.assert_status_ok();
    let subscription_id = sub.json::<serde_json::Value>()["subscription_id"].as_u64().unwrap();

    let node_resp = server
        .post("/node")
        .add_header(hk, &hv)
        .json(&serde_json::json!({"kind": "checkout", "name": "checkout1"}))
        .await;
    node_resp.assert_status_ok();

    let listen = server.get(&format!("/listen/{subscription_id}")).add_header(hk, &hv).await;
    listen.assert_status_ok();
}

#[tokio::test]
async fn listen_with_no_publish_times_out_with_204() {
    let server = server();
    let (hk, hv) = auth_header("alice");

    let sub = server.post("/subscribe/node").add_header(hk, &hv).json(&serde_json::json!({})).await;
    let subscription_id = sub.json::<serde_json::Value>()["subscription_id"].as_u64().unwrap();

    let listen = server.get(&format!("/listen/{subscription_id}")).add_header(hk, &hv).await;
    listen.assert_status(axum::http::StatusCode::NO_CONTENT);
}

// -- durable replay across reconnects -----------------------------------------

#[tokio::test]
async fn durable_subscriber_replays_after_unsubscribe_and_resubscribe() {
    let server = server();
    let (hk, hv) = auth_header("alice");

    let first = server
        .post("/subscribe/node")
        .add_header(hk, &hv)
        .json(&serde_json::json!({"subscriber_id": "scheduler-1"}))
        .await;
    let first_id = first.json::<serde_json::Value>()["subscription_id"].as_u64().unwrap();

    server.post("/node").add_header(hk, &hv).json(&serde_json::json!({"kind": "checkout", "name": "c1"})).await.assert_status_ok();

    let listen_first = server.get(&format!("/listen/{first_id}")).add_header(hk, &hv).await;
    listen_first.assert_status_ok();
    let first_body: serde_json::Value = listen_first.json();
    assert_eq!(first_body["sequenceid"], "1");

    // Disconnect without a follow-up Listen (no implicit ack runs), then
    // reconnect with the same subscriber_id: the event must be redelivered.
    server.post(&format!("/unsubscribe/{first_id}")).await.assert_status_ok();

    let second = server
        .post("/subscribe/node")
        .add_header(hk, &hv)
        .json(&serde_json::json!({"subscriber_id": "scheduler-1"}))
        .await;
    let second_id = second.json::<serde_json::Value>()["subscription_id"].as_u64().unwrap();

    let listen_second = server.get(&format!("/listen/{second_id}")).add_header(hk, &hv).await;
    listen_second.assert_status_ok();
    let second_body: serde_json::Value = listen_second.json();
    assert_eq!(second_body["sequenceid"], "1");
}

#[tokio::test]
async fn fresh_durable_subscriber_does_not_backfill() {
    let server = server();
    let (hk, hv) = auth_header("alice");

    server.post("/node").add_header(hk, &hv).json(&serde_json::json!({"kind": "checkout", "name": "c1"})).await.assert_status_ok();

    let sub = server
        .post("/subscribe/node")
        .add_header(hk, &hv)
        .json(&serde_json::json!({"subscriber_id": "fresh-scheduler"}))
        .await;
    let subscription_id = sub.json::<serde_json::Value>()["subscription_id"].as_u64().unwrap();

    let listen = server.get(&format!("/listen/{subscription_id}")).add_header(hk, &hv).await;
    listen.assert_status(axum::http::StatusCode::NO_CONTENT);
}

// -- dotted-path query operators -----------------------------------------------

#[tokio::test]
async fn query_filters_by_data_field_with_gt_operator() {
    let server = server();
    let (hk, hv) = auth_header("alice");

    server
        .post("/node")
        .add_header(hk, &hv)
        .json(&serde_json::json!({"kind": "test", "name": "t1", "data": {"score": 3}}))
        .await
        .assert_status_ok();
    server
        .post("/node")
        .add_header(hk, &hv)
        .json(&serde_json::json!({"kind": "test", "name": "t2", "data": {"score": 10}}))
        .await
        .assert_status_ok();

    let results = server.get("/nodes").add_query_param("data.score__gt", "5").await;
    results.assert_status_ok();
    let body: serde_json::Value = results.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "t2");
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn count_matches_query_total() {
    let server = server();
    let (hk, hv) = auth_header("alice");
    for i in 0..3 {
        server
            .post("/node")
            .add_header(hk, &hv)
            .json(&serde_json::json!({"kind": "checkout", "name": format!("c{i}")}))
            .await
            .assert_status_ok();
    }

    let count = server.get("/count").add_query_param("kind", "checkout").await;
    count.assert_status_ok();
    assert_eq!(count.json::<usize>(), 3);
}

// -- Auth boundary -------------------------------------------------------------

#[tokio::test]
async fn missing_auth_header_is_rejected() {
    let server = server();
    let resp = server.post("/node").json(&serde_json::json!({"kind": "checkout", "name": "c1"})).await;
    resp.assert_status(axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn get_node_requires_no_auth_but_update_does() {
    let server = server();
    let (hk, hv) = auth_header("alice");
    let created = server
        .post("/node")
        .add_header(hk, &hv)
        .json(&serde_json::json!({"kind": "checkout", "name": "c1"}))
        .await;
    let id = created.json::<serde_json::Value>()["id"].as_str().unwrap().to_owned();

    let got = server.get(&format!("/node/{id}")).await;
    got.assert_status_ok();

    let updated = server.put(&format!("/node/{id}")).json(&serde_json::json!({"group": "g1"})).await;
    updated.assert_status(axum::http::StatusCode::UNAUTHORIZED);
}
