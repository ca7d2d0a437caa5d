//! Gateway in front of a plaintext upstream.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{client_for, spawn_app, spawn_gateway, test_codec, Bank, PASSWORD};
use envelope_gateway::crypto::{now_ms, Envelope};
use envelope_gateway::pipeline::ENCRYPTED_HEADER;

type Seen = Arc<Mutex<Vec<(bool, Value)>>>;

/// Upstream that records whether it saw the marker and what body arrived.
async fn recording_upstream() -> (std::net::SocketAddr, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let router = Router::new().route(
        "/transfers",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let record = record.clone();
            async move {
                record
                    .lock()
                    .unwrap()
                    .push((headers.contains_key(ENCRYPTED_HEADER), body));
                Json(json!({"success": true, "data": {"transferId": "t-1"}}))
            }
        }),
    );
    (spawn_app(router).await, seen)
}

#[tokio::test]
async fn test_sealed_round_trip_through_gateway() {
    let (upstream, seen) = recording_upstream().await;
    let (gateway, shutdown, handle) = spawn_gateway(upstream).await;
    let codec = test_codec();

    let transfer = json!({"from": "chk-1", "to": "sav-2", "amount": 250});
    let response = reqwest::Client::new()
        .post(format!("http://{}/transfers", gateway))
        .header(ENCRYPTED_HEADER, "true")
        .json(&codec.encrypt(&transfer).to_value())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(true));
    assert!(Envelope::detect(&body));
    assert_eq!(
        codec.decrypt_value(&body).unwrap(),
        json!({"success": true, "data": {"transferId": "t-1"}})
    );

    assert_eq!(*seen.lock().unwrap(), vec![(false, transfer)]);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_stale_envelope_never_reaches_upstream() {
    let (upstream, seen) = recording_upstream().await;
    let (gateway, _shutdown, _handle) = spawn_gateway(upstream).await;

    let mut envelope = test_codec().encrypt(&json!({"amount": 1}));
    envelope.timestamp = now_ms() - 400_000;

    let response = reqwest::Client::new()
        .post(format!("http://{}/transfers", gateway))
        .header(ENCRYPTED_HEADER, "true")
        .json(&envelope.to_value())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"success": false, "message": "Failed to process request"}));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unmarked_request_is_plain_proxy() {
    let (upstream, seen) = recording_upstream().await;
    let (gateway, _shutdown, _handle) = spawn_gateway(upstream).await;

    let body: Value = reqwest::Client::new()
        .post(format!("http://{}/transfers", gateway))
        .json(&json!({"amount": 3}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["data"]["transferId"], json!("t-1"));
    assert_eq!(*seen.lock().unwrap(), vec![(false, json!({"amount": 3}))]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_client_session_through_gateway() {
    let bank = Bank::new();
    let upstream = spawn_app(bank.router()).await;
    let (gateway, _shutdown, _handle) = spawn_gateway(upstream).await;
    let (client, _) = client_for(gateway);

    client
        .login(json!({"email": "a@b.com", "password": PASSWORD}))
        .await
        .unwrap();

    // Set-Cookie crossed the gateway, so an expired session refreshes.
    bank.expire_session();
    let reply = client.get("/accounts").await.unwrap();

    assert_eq!(reply["data"]["accounts"][0]["id"], json!("chk-1"));
    assert_eq!(bank.refresh_count(), 1);
}
