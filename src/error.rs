//! Errors surfaced to callers of the client core.

use reqwest::StatusCode;
use thiserror::Error;

use crate::crypto::EnvelopeError;

/// Opaque message for every envelope/crypto failure.
pub const MSG_PROCESSING_FAILED: &str = "Failed to process request, please try again.";

/// Message shown when the session could not be refreshed.
pub const MSG_SESSION_EXPIRED: &str = "Your session has expired, redirecting to login.";

/// Failures of the underlying network transport.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection refused, reset, DNS, TLS and similar.
    #[error("Network error: {0}")]
    Network(String),

    /// The per-call deadline elapsed.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// The request could not be built (bad URL, bad header).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Everything a caller of [`crate::client::SecureClient`] can observe.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Envelope could not be opened (malformed, stale or corrupt).
    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    /// The shared refresh call was rejected; the session is gone.
    #[error("Authentication failed: session could not be refreshed")]
    AuthenticationFailed,

    /// 401 with no session to refresh (e.g. bad login credentials).
    #[error("Not authenticated")]
    NotAuthenticated,

    /// 401 on a call that was already retried after a refresh.
    #[error("Request rejected as unauthenticated after session refresh")]
    Unauthenticated,

    /// 403: never refreshed, never retried.
    #[error("Authorization denied")]
    AuthorizationDenied,

    /// Too many calls already waiting on the in-flight refresh.
    #[error("Refresh queue full ({0} calls waiting)")]
    RefreshQueueFull(usize),

    /// The session was logged out while this call waited for a refresh.
    #[error("Request cancelled by logout")]
    Cancelled,

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Any other non-success status.
    #[error("Request failed with status {status}: {message}")]
    Status { status: StatusCode, message: String },
}

impl ClientError {
    /// Text safe to render to an end user. Never includes key material,
    /// IVs or internal detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            ClientError::Envelope(_) => MSG_PROCESSING_FAILED,
            ClientError::AuthenticationFailed | ClientError::Unauthenticated => MSG_SESSION_EXPIRED,
            ClientError::NotAuthenticated => "Please log in to continue.",
            ClientError::AuthorizationDenied => "You do not have permission to perform this action.",
            ClientError::RefreshQueueFull(_) | ClientError::Cancelled => MSG_PROCESSING_FAILED,
            ClientError::Transport(TransportError::Timeout(_)) => {
                "The request timed out, please try again."
            }
            ClientError::Transport(_) => "Network error, please check your connection.",
            ClientError::Status { .. } => "Request failed, please try again.",
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(TransportError::Network(_) | TransportError::Timeout(_))
        )
    }
}
