//! Outbound half of the envelope.
//!
//! # Responsibilities
//! - Seal request bodies on sensitive paths
//! - Mark sensitive requests with `x-encrypted: true`, with or without a body
//!
//! The header is the only signal the remote end uses to decide whether to
//! seal its reply, so bodyless reads on sensitive paths still carry it.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;

use crate::crypto::EnvelopeCodec;
use crate::observability::metrics;
use crate::policy::{Direction, SensitivityPolicy};
use crate::transport::WireRequest;

/// Header asking the remote end to answer with an envelope.
pub const ENCRYPTED_HEADER: &str = "x-encrypted";

/// A call as issued by application code, before the envelope applies.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Classifies and seals outbound requests.
#[derive(Debug, Clone)]
pub struct RequestPipeline {
    codec: Arc<EnvelopeCodec>,
    policy: Arc<SensitivityPolicy>,
}

impl RequestPipeline {
    pub fn new(codec: Arc<EnvelopeCodec>, policy: Arc<SensitivityPolicy>) -> Self {
        Self { codec, policy }
    }

    /// Build the wire form of `request`. Runs once per attempt.
    pub fn prepare(&self, request: &ApiRequest) -> WireRequest {
        let mut headers = request.headers.clone();
        headers.remove(ENCRYPTED_HEADER);

        if !self.policy.is_sensitive(&request.path, Direction::Outbound) {
            return WireRequest {
                method: request.method.clone(),
                path: request.path.clone(),
                headers,
                body: request.body.clone(),
            };
        }

        headers.insert(ENCRYPTED_HEADER, HeaderValue::from_static("true"));

        let body = request.body.as_ref().map(|plaintext| {
            metrics::record_envelope_sealed();
            self.codec.encrypt(plaintext).to_value()
        });

        tracing::trace!(
            path = %request.path,
            sealed_body = body.is_some(),
            "Request marked for envelope"
        );

        WireRequest {
            method: request.method.clone(),
            path: request.path.clone(),
            headers,
            body,
        }
    }
}
