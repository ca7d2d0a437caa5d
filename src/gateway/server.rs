//! Forwarding gateway in front of a plaintext upstream API.
//!
//! # Responsibilities
//! - Build the axum router (envelope middleware + forwarding handler)
//! - Wire up request ID, timeout and trace layers
//! - Forward every request to the single configured upstream
//! - Serve until the shutdown signal fires

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::HOST;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{HeaderName, StatusCode, Uri, Version};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::EnvelopeConfig;
use crate::crypto::EnvelopeCodec;
use crate::gateway::middleware::{with_envelope, EnvelopeState};

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid upstream address '{0}'")]
    InvalidUpstream(String),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
struct ForwardState {
    client: Client<HttpConnector, Body>,
    upstream: Authority,
}

/// HTTP gateway that speaks the envelope to clients and plaintext upstream.
pub struct GatewayServer {
    router: Router,
    upstream: Authority,
}

impl GatewayServer {
    pub fn new(config: &EnvelopeConfig, codec: Arc<EnvelopeCodec>) -> Result<Self, GatewayError> {
        let upstream = Authority::from_str(&config.gateway.upstream)
            .map_err(|_| GatewayError::InvalidUpstream(config.gateway.upstream.clone()))?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let state = ForwardState {
            client,
            upstream: upstream.clone(),
        };
        let envelope = EnvelopeState::new(codec, config.gateway.max_body_size);

        let router = Self::build_router(config, state, envelope);
        Ok(Self { router, upstream })
    }

    #[allow(deprecated)]
    fn build_router(config: &EnvelopeConfig, state: ForwardState, envelope: EnvelopeState) -> Router {
        let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

        let forwarding = Router::new()
            .route("/{*path}", any(forward))
            .route("/", any(forward))
            .with_state(state);

        with_envelope(forwarding, envelope).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// The fully layered router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), GatewayError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, upstream = %self.upstream, "Gateway starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining");
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

async fn forward(State(state): State<ForwardState>, request: Request) -> Response {
    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    let uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(uri = %parts.uri, error = %e, "Cannot rewrite request URI");
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    };

    tracing::debug!(method = %parts.method, uri = %uri, "Forwarding upstream");

    parts.uri = uri;
    parts.version = Version::HTTP_11;
    parts.headers.remove(HOST);

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => response.map(Body::new).into_response(),
        Err(e) => {
            tracing::warn!(upstream = %state.upstream, error = %e, "Upstream request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"success": false, "message": "Upstream unavailable"})),
            )
                .into_response()
        }
    }
}
