//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{OriginalUri, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use envelope_gateway::config::EnvelopeConfig;
use envelope_gateway::crypto::{EnvelopeCodec, EnvelopeKey};
use envelope_gateway::gateway::{with_envelope, EnvelopeState, GatewayError, GatewayServer};
use envelope_gateway::lifecycle::Shutdown;
use envelope_gateway::resilience::RetryPolicy;
use envelope_gateway::transport::ReqwestTransport;
use envelope_gateway::SecureClient;

pub const PASSWORD: &str = "correct horse";

pub fn test_codec() -> Arc<EnvelopeCodec> {
    Arc::new(EnvelopeCodec::new(EnvelopeKey::from_bytes([42u8; 32])))
}

/// Serve `router` on an ephemeral loopback port.
pub async fn spawn_app(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Start a gateway in front of `upstream`.
pub async fn spawn_gateway(
    upstream: SocketAddr,
) -> (SocketAddr, Shutdown, JoinHandle<Result<(), GatewayError>>) {
    let mut config = EnvelopeConfig::default();
    config.gateway.upstream = upstream.to_string();
    config.timeouts.request_secs = 5;

    let server = GatewayServer::new(&config, test_codec()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));
    (addr, shutdown, handle)
}

/// Client against `addr` with a forced-logout counter.
pub fn client_for(addr: SocketAddr) -> (SecureClient, Arc<AtomicUsize>) {
    let transport = ReqwestTransport::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let forced_logouts = Arc::new(AtomicUsize::new(0));
    let counter = forced_logouts.clone();

    let client = SecureClient::builder(
        Arc::new(transport),
        EnvelopeCodec::new(EnvelopeKey::from_bytes([42u8; 32])),
    )
    .retry_policy(RetryPolicy::none())
    .request_timeout(Duration::from_secs(5))
    .observer(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }))
    .build();

    (client, forced_logouts)
}

/// Plaintext banking backend with cookie sessions.
///
/// The session cookie is valid while it names the current generation;
/// `expire_session` bumps the generation so every held cookie goes stale.
pub struct Bank {
    generation: AtomicU64,
    refresh_allowed: AtomicBool,
    refresh_delay_ms: AtomicU64,
    refresh_broken: AtomicBool,
    refresh_held: AtomicBool,
    refresh_release: Notify,
    pub refreshes: AtomicUsize,
    /// Hits per path on the session-guarded reads other than `/accounts`.
    pub reads: Mutex<HashMap<String, usize>>,
    pub account_reads: AtomicUsize,
    pub transfers: Mutex<Vec<Value>>,
}

impl Bank {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            generation: AtomicU64::new(1),
            refresh_allowed: AtomicBool::new(true),
            refresh_delay_ms: AtomicU64::new(0),
            refresh_broken: AtomicBool::new(false),
            refresh_held: AtomicBool::new(false),
            refresh_release: Notify::new(),
            refreshes: AtomicUsize::new(0),
            reads: Mutex::new(HashMap::new()),
            account_reads: AtomicUsize::new(0),
            transfers: Mutex::new(Vec::new()),
        })
    }

    pub fn expire_session(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn reject_refresh(&self) {
        self.refresh_allowed.store(false, Ordering::SeqCst);
    }

    pub fn delay_refresh(&self, delay: Duration) {
        self.refresh_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Refresh answers 500 from now on.
    pub fn break_refresh(&self) {
        self.refresh_broken.store(true, Ordering::SeqCst);
    }

    /// Refresh waits until [`Bank::release_refresh`].
    pub fn hold_refresh(&self) {
        self.refresh_held.store(true, Ordering::SeqCst);
    }

    pub fn release_refresh(&self) {
        self.refresh_release.notify_one();
    }

    pub fn reads_of(&self, path: &str) -> usize {
        let reads = self.reads.lock().expect("bank mutex poisoned");
        reads.get(path).copied().unwrap_or(0)
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    fn session_token(&self) -> String {
        format!("g{}", self.generation.load(Ordering::SeqCst))
    }

    fn is_signed_in(&self, headers: &HeaderMap) -> bool {
        cookie(headers, "session").as_deref() == Some(self.session_token().as_str())
    }

    /// Plaintext routes; wrap with [`sealed`] to serve the envelope directly.
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/auth/login", post(login))
            .route("/auth/refresh", post(refresh))
            .route("/auth/logout", post(logout))
            .route("/accounts", get(accounts))
            .route("/transactions", get(session_read))
            .route("/loans", get(session_read))
            .route("/notifications", get(session_read))
            .route("/users/me", get(session_read))
            .route("/transfers", post(transfer))
            .route("/security/audit", get(|| async {
                (StatusCode::FORBIDDEN, Json(json!({"success": false, "message": "Admins only"})))
            }))
            .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
            .with_state(self.clone())
    }
}

/// `router` behind the envelope middleware.
pub fn sealed(router: Router) -> Router {
    with_envelope(router, EnvelopeState::new(test_codec(), 1024 * 1024))
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

fn with_cookies(mut response: Response, cookies: &[String]) -> Response {
    for c in cookies {
        response
            .headers_mut()
            .append(SET_COOKIE, HeaderValue::from_str(c).unwrap());
    }
    response
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"success": false, "message": message})),
    )
        .into_response()
}

async fn login(State(bank): State<Arc<Bank>>, Json(credentials): Json<Value>) -> Response {
    if credentials["password"] != PASSWORD {
        return unauthorized("Invalid credentials");
    }
    let reply = Json(json!({
        "success": true,
        "data": {"user": {"id": 7, "email": credentials["email"]}}
    }))
    .into_response();

    with_cookies(
        reply,
        &[
            format!("session={}; Path=/; HttpOnly", bank.session_token()),
            "refresh=valid; Path=/; HttpOnly".to_string(),
        ],
    )
}

async fn refresh(State(bank): State<Arc<Bank>>, headers: HeaderMap) -> Response {
    bank.refreshes.fetch_add(1, Ordering::SeqCst);

    let delay = bank.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if bank.refresh_held.load(Ordering::SeqCst) {
        bank.refresh_release.notified().await;
    }

    if bank.refresh_broken.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"success": false, "message": "Session store unavailable"})),
        )
            .into_response();
    }

    if !bank.refresh_allowed.load(Ordering::SeqCst)
        || cookie(&headers, "refresh").as_deref() != Some("valid")
    {
        return unauthorized("Invalid refresh token");
    }

    with_cookies(
        Json(json!({"success": true})).into_response(),
        &[format!("session={}; Path=/; HttpOnly", bank.session_token())],
    )
}

async fn logout() -> Response {
    with_cookies(
        Json(json!({"success": true})).into_response(),
        &[
            "session=; Path=/; Max-Age=0".to_string(),
            "refresh=; Path=/; Max-Age=0".to_string(),
        ],
    )
}

async fn accounts(State(bank): State<Arc<Bank>>, headers: HeaderMap) -> Response {
    bank.account_reads.fetch_add(1, Ordering::SeqCst);
    if !bank.is_signed_in(&headers) {
        return unauthorized("Token expired");
    }
    Json(json!({
        "success": true,
        "data": {"accounts": [{"id": "chk-1", "balance": 1200}]}
    }))
    .into_response()
}

async fn session_read(
    State(bank): State<Arc<Bank>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let path = uri.path().to_string();
    *bank
        .reads
        .lock()
        .expect("bank mutex poisoned")
        .entry(path.clone())
        .or_insert(0) += 1;

    if !bank.is_signed_in(&headers) {
        return unauthorized("Token expired");
    }
    Json(json!({"success": true, "data": {"path": path}})).into_response()
}

async fn transfer(
    State(bank): State<Arc<Bank>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !bank.is_signed_in(&headers) {
        return unauthorized("Token expired");
    }
    let mut transfers = bank.transfers.lock().expect("bank mutex poisoned");
    transfers.push(body);
    Json(json!({"success": true, "data": {"transferId": format!("t-{}", transfers.len())}}))
        .into_response()
}
