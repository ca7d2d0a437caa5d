//! Network transport subsystem.
//!
//! # Data Flow
//! ```text
//! WireRequest (after the request pipeline)
//!     → Transport::send (reqwest client + cookie jar)
//!     → WireResponse (status + raw body bytes)
//! ```
//!
//! # Design Decisions
//! - The transport owns the httpOnly session cookies; nothing above it sees them
//! - Trait seam so the session manager and client core test without a network
//! - Deadlines are applied by the caller, not inside the transport

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::error::TransportError;

#[cfg(test)]
pub(crate) mod mock;
pub mod reqwest_transport;

pub use reqwest_transport::ReqwestTransport;

/// A request as it goes on the wire.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/accounts/42`.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl WireRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// A response as it came off the wire.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl WireResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: StatusCode, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }
}

/// Sends wire requests to the remote API.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError>;

    /// Drop every stored credential (session cookies).
    fn clear_credentials(&self);
}
