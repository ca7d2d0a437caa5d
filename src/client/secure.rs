//! `SecureClient`: envelope pipelines and session continuity around a transport.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{EnvelopeConfig, SessionConfig};
use crate::crypto::{EnvelopeCodec, EnvelopeKey, KeyError};
use crate::error::{ClientError, TransportError};
use crate::observability::metrics;
use crate::pipeline::{ApiRequest, RequestPipeline, ResponsePipeline};
use crate::policy::SensitivityPolicy;
use crate::resilience::{with_deadline, RetryPolicy};
use crate::session::{LoggingObserver, SessionManager, SessionObserver, SessionSettings};
use crate::transport::{ReqwestTransport, Transport, WireResponse};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Failure to assemble a client from configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Envelope key unavailable: {0}")]
    Key(#[from] KeyError),

    #[error("Transport setup failed: {0}")]
    Transport(#[from] TransportError),
}

/// API client that seals sensitive calls and survives session expiry.
///
/// Cheap to clone; clones share the session and the transport.
#[derive(Clone)]
pub struct SecureClient {
    transport: Arc<dyn Transport>,
    requests: RequestPipeline,
    responses: ResponsePipeline,
    session: SessionManager,
    retry: RetryPolicy,
    request_timeout: Duration,
    paths: SessionConfig,
}

impl SecureClient {
    pub fn builder(transport: Arc<dyn Transport>, codec: EnvelopeCodec) -> SecureClientBuilder {
        SecureClientBuilder::new(transport, codec)
    }

    /// Key from the environment, reqwest transport, everything else from `config`.
    pub fn from_config(
        config: &EnvelopeConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self, BuildError> {
        let key = EnvelopeKey::from_env(&config.crypto.key_env)?;
        let codec = EnvelopeCodec::with_replay_window(
            key,
            Duration::from_secs(config.crypto.replay_window_secs),
        );
        let transport = ReqwestTransport::from_config(config)?;

        Ok(Self::builder(Arc::new(transport), codec)
            .config(config)
            .observer(observer)
            .build())
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ClientError> {
        self.send(ApiRequest::delete(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        self.send(ApiRequest::post(path, body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        self.send(ApiRequest::put(path, body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        self.send(ApiRequest::patch(path, body)).await
    }

    /// Log in with `credentials`; the session cookies land in the transport.
    pub async fn login(&self, credentials: Value) -> Result<Value, ClientError> {
        let reply = self
            .send(ApiRequest::post(self.paths.login_path.clone(), credentials))
            .await?;
        self.session.mark_authenticated();
        Ok(reply)
    }

    /// Explicit logout. Pending retries are cancelled first, then the server
    /// is told (best effort) and the cookie jar is cleared.
    pub async fn logout(&self) {
        self.session.logout();

        let wire = self
            .requests
            .prepare(&ApiRequest::new(Method::POST, self.paths.logout_path.clone()));
        match with_deadline(self.request_timeout, self.transport.send(wire)).await {
            Ok(response) if !response.status.is_success() => {
                tracing::debug!(status = %response.status, "Logout endpoint refused, clearing anyway");
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "Logout call failed, clearing anyway"),
        }

        self.transport.clear_credentials();
    }

    /// Issue one API call.
    pub async fn send(&self, mut request: ApiRequest) -> Result<Value, ClientError> {
        let request_id = Uuid::new_v4();
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            request
                .headers
                .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }

        let span = tracing::info_span!(
            "api_call",
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
        );
        self.execute(&request).instrument(span).await
    }

    async fn execute(&self, request: &ApiRequest) -> Result<Value, ClientError> {
        let mut retried = false;

        loop {
            let epoch = self.session.epoch();
            let response = self.dispatch(request).await?;
            metrics::record_request(response.status.as_u16());

            match response.status {
                status if status.is_success() => {
                    return self
                        .responses
                        .decode_bytes(&request.path, &response.body)
                        .into_result()
                        .map_err(ClientError::from);
                }
                StatusCode::UNAUTHORIZED => {
                    if retried {
                        tracing::warn!("Retried call rejected again, giving up");
                        return Err(ClientError::Unauthenticated);
                    }
                    if self.is_session_endpoint(&request.path) {
                        return Err(ClientError::NotAuthenticated);
                    }
                    self.session.recover(epoch).await?;
                    retried = true;
                    tracing::debug!("Retrying with refreshed session");
                }
                StatusCode::FORBIDDEN => return Err(ClientError::AuthorizationDenied),
                status => return Err(self.status_error(&request.path, status, &response)),
            }
        }
    }

    /// Send with a per-attempt deadline, backing off on transient failures.
    async fn dispatch(&self, request: &ApiRequest) -> Result<WireResponse, ClientError> {
        let mut attempt = 1;
        loop {
            let wire = self.requests.prepare(request);
            match with_deadline(self.request_timeout, self.transport.send(wire)).await {
                Ok(response) => return Ok(response),
                Err(e) => match self.retry.next_delay(attempt, &request.method, &e) {
                    Some(delay) => {
                        let reason = match e {
                            TransportError::Timeout(_) => "timeout",
                            _ => "network",
                        };
                        tracing::warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Transient failure, retrying"
                        );
                        metrics::record_retry(reason);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(e.into()),
                },
            }
        }
    }

    fn is_session_endpoint(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        path == self.paths.login_path
            || path == self.paths.refresh_path
            || path == self.paths.logout_path
    }

    fn status_error(&self, path: &str, status: StatusCode, response: &WireResponse) -> ClientError {
        let message = self
            .responses
            .decode_bytes(path, &response.body)
            .into_result()
            .ok()
            .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_owned))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown status").to_string());

        tracing::debug!(status = %status, message = %message, "Request failed");
        ClientError::Status { status, message }
    }
}

impl std::fmt::Debug for SecureClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureClient")
            .field("session", &self.session)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Assembles a [`SecureClient`]; every knob defaults to the config defaults.
pub struct SecureClientBuilder {
    transport: Arc<dyn Transport>,
    codec: Arc<EnvelopeCodec>,
    policy: SensitivityPolicy,
    retry: RetryPolicy,
    request_timeout: Duration,
    settings: SessionSettings,
    paths: SessionConfig,
    observer: Arc<dyn SessionObserver>,
}

impl SecureClientBuilder {
    fn new(transport: Arc<dyn Transport>, codec: EnvelopeCodec) -> Self {
        let defaults = EnvelopeConfig::default();
        Self {
            transport,
            codec: Arc::new(codec),
            policy: SensitivityPolicy::default(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(defaults.timeouts.request_secs),
            settings: SessionSettings::default(),
            paths: defaults.session,
            observer: Arc::new(LoggingObserver),
        }
    }

    /// Take sensitivity lists, retries, timeouts and session knobs from `config`.
    pub fn config(mut self, config: &EnvelopeConfig) -> Self {
        self.policy = SensitivityPolicy::from_config(&config.sensitivity);
        self.retry = RetryPolicy::from_config(&config.retries);
        self.request_timeout = Duration::from_secs(config.timeouts.request_secs);
        self.settings = SessionSettings::from_config(&config.session, &config.timeouts);
        self.paths = config.session.clone();
        self
    }

    pub fn policy(mut self, policy: SensitivityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn session_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn build(self) -> SecureClient {
        let policy = Arc::new(self.policy);
        let requests = RequestPipeline::new(self.codec.clone(), policy.clone());
        let responses = ResponsePipeline::new(self.codec, policy);

        // Refresh goes through the request pipeline once: it has no body,
        // so the prepared form never needs resealing.
        let refresh_request =
            requests.prepare(&ApiRequest::new(Method::POST, self.paths.refresh_path.clone()));
        let session = SessionManager::new(
            self.transport.clone(),
            refresh_request,
            self.settings,
            self.observer,
        );

        SecureClient {
            transport: self.transport,
            requests,
            responses,
            session,
            retry: self.retry,
            request_timeout: self.request_timeout,
            paths: self.paths,
        }
    }
}
