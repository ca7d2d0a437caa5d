//! Session state and refresh outcomes.

use crate::error::TransportError;

/// Authentication state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
    Refreshing,
    /// Transient: held only while the forced logout runs.
    Expired,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Anonymous => "anonymous",
            SessionState::Authenticated => "authenticated",
            SessionState::Refreshing => "refreshing",
            SessionState::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the shared refresh call resolved to.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// New cookies are in place.
    Refreshed,
    /// The refresh endpoint answered 401/403; the session is gone.
    Rejected,
    /// Network failure, timeout or any other status. Handled like a
    /// rejection; the cause is kept for logs.
    Failed(TransportError),
}

impl RefreshOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::Refreshed => "refreshed",
            RefreshOutcome::Rejected => "rejected",
            RefreshOutcome::Failed(_) => "failed",
        }
    }
}
