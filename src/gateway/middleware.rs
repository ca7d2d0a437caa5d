//! Server half of the envelope as an axum middleware.
//!
//! # Responsibilities
//! - Open the envelope body of any request marked `x-encrypted: true`
//! - Strip the marker before the inner service sees the request
//! - Seal JSON replies to marked requests
//!
//! Requests without the marker pass through untouched in both directions.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::crypto::{Envelope, EnvelopeCodec, EnvelopeError};
use crate::observability::logging::SECURITY_TARGET;
use crate::observability::metrics;
use crate::pipeline::ENCRYPTED_HEADER;

const REJECT_MESSAGE: &str = "Failed to process request";

/// Shared state for [`envelope_middleware`].
#[derive(Debug, Clone)]
pub struct EnvelopeState {
    codec: Arc<EnvelopeCodec>,
    max_body_size: usize,
}

impl EnvelopeState {
    pub fn new(codec: Arc<EnvelopeCodec>, max_body_size: usize) -> Self {
        Self {
            codec,
            max_body_size,
        }
    }
}

/// Wrap every route of `router` in the envelope middleware.
pub fn with_envelope<S>(router: Router<S>, state: EnvelopeState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(state, envelope_middleware))
}

pub async fn envelope_middleware(
    State(state): State<EnvelopeState>,
    request: Request,
    next: Next,
) -> Response {
    if !is_marked(request.headers()) {
        let response = next.run(request).await;
        metrics::record_gateway_request(false, response.status().as_u16());
        return response;
    }

    let path = request.uri().path().to_string();
    let (mut parts, body) = request.into_parts();
    parts.headers.remove(ENCRYPTED_HEADER);

    let bytes = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Failed to read sealed request body");
            return reject();
        }
    };

    let plaintext = match open_body(&state.codec, bytes) {
        Ok(plaintext) => plaintext,
        Err(err) => {
            report_failure(&path, &err);
            metrics::record_gateway_request(true, StatusCode::BAD_REQUEST.as_u16());
            return reject();
        }
    };

    parts.headers.remove(CONTENT_LENGTH);
    if !plaintext.is_empty() {
        parts
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    let response = next.run(Request::from_parts(parts, Body::from(plaintext))).await;
    let response = seal_response(&state, &path, response).await;
    metrics::record_gateway_request(true, response.status().as_u16());
    response
}

fn is_marked(headers: &HeaderMap) -> bool {
    headers
        .get(ENCRYPTED_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Envelope bodies are opened; empty and non-envelope bodies are forwarded as is.
fn open_body(codec: &EnvelopeCodec, bytes: Bytes) -> Result<Bytes, EnvelopeError> {
    if bytes.is_empty() {
        return Ok(bytes);
    }
    let Ok(payload) = serde_json::from_slice::<Value>(&bytes) else {
        return Ok(bytes);
    };
    if !Envelope::detect(&payload) {
        return Ok(bytes);
    }

    let plaintext = codec.decrypt_value(&payload)?;
    Ok(Bytes::from(plaintext.to_string()))
}

async fn seal_response(state: &EnvelopeState, path: &str, response: Response) -> Response {
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);
    if !is_json {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Failed to read reply body for sealing");
            return (StatusCode::BAD_GATEWAY, Json(json!({"success": false, "message": REJECT_MESSAGE})))
                .into_response();
        }
    };

    let Ok(plaintext) = serde_json::from_slice::<Value>(&bytes) else {
        return Response::from_parts(parts, Body::from(bytes));
    };

    let mut sealed = state.codec.encrypt(&plaintext).to_value();
    if let Some(success) = plaintext.get("success").and_then(Value::as_bool) {
        sealed["success"] = Value::Bool(success);
    }
    metrics::record_envelope_sealed();
    tracing::trace!(path = %path, "Reply sealed");

    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(sealed.to_string()))
}

fn reject() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"success": false, "message": REJECT_MESSAGE})),
    )
        .into_response()
}

fn report_failure(path: &str, err: &EnvelopeError) {
    metrics::record_envelope_failure(err.kind());
    if err.is_security_event() {
        tracing::warn!(
            target: SECURITY_TARGET,
            path = %path,
            kind = err.kind(),
            "Rejected sealed request"
        );
    } else {
        tracing::debug!(path = %path, error = %err, "Malformed sealed request");
    }
}
