//! Single-flight refresh-and-retry coordinator.
//!
//! # Responsibilities
//! - Own the session state, epoch and in-flight refresh handle
//! - Collapse concurrent 401s into one refresh call
//! - Resolve every waiter with the same outcome
//! - Fire exactly one forced logout when the refresh fails
//!
//! All shared state sits behind one mutex that is never held across an
//! await point.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::StatusCode;
use tokio::sync::watch;

use crate::config::{SessionConfig, TimeoutConfig};
use crate::error::{ClientError, TransportError, MSG_SESSION_EXPIRED};
use crate::observability::metrics;
use crate::resilience::with_deadline;
use crate::session::state::{RefreshOutcome, SessionState};
use crate::transport::{Transport, WireRequest};

type RefreshHandle = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Receives the forced-logout action.
pub trait SessionObserver: Send + Sync {
    /// Called once per failed refresh, after cookies are cleared and
    /// before the state returns to anonymous.
    fn on_forced_logout(&self);
}

impl<F> SessionObserver for F
where
    F: Fn() + Send + Sync,
{
    fn on_forced_logout(&self) {
        self()
    }
}

/// Default observer: logs the user-facing redirect notice.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl SessionObserver for LoggingObserver {
    fn on_forced_logout(&self) {
        tracing::warn!("{}", MSG_SESSION_EXPIRED);
    }
}

/// Refresh deadline and fan-in bound.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub refresh_timeout: Duration,
    /// Calls allowed to wait on one in-flight refresh.
    pub max_attached: usize,
}

impl SessionSettings {
    pub fn from_config(session: &SessionConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            refresh_timeout: Duration::from_secs(timeouts.refresh_secs),
            max_attached: session.max_attached,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default(), &TimeoutConfig::default())
    }
}

struct Inner {
    state: SessionState,
    /// Bumped by every successful refresh and every login.
    epoch: u64,
    /// Bumped by logout and by a login that supersedes a refresh.
    lineage: u64,
    refresh_seq: u64,
    in_flight: Option<(u64, RefreshHandle)>,
    attached: usize,
}

struct Core {
    inner: Mutex<Inner>,
    transport: Arc<dyn Transport>,
    refresh_request: WireRequest,
    settings: SessionSettings,
    observer: Arc<dyn SessionObserver>,
    lineage_tx: watch::Sender<u64>,
}

impl Core {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("session mutex poisoned")
    }

    fn is_current(inner: &Inner, lineage: u64, seq: u64) -> bool {
        inner.lineage == lineage && inner.in_flight.as_ref().map(|(s, _)| *s) == Some(seq)
    }

    async fn run_refresh(self: Arc<Self>, lineage: u64, seq: u64) -> RefreshOutcome {
        let result = with_deadline(
            self.settings.refresh_timeout,
            self.transport.send(self.refresh_request.clone()),
        )
        .await;

        let outcome = match result {
            Ok(response) if response.status.is_success() => RefreshOutcome::Refreshed,
            Ok(response)
                if response.status == StatusCode::UNAUTHORIZED
                    || response.status == StatusCode::FORBIDDEN =>
            {
                RefreshOutcome::Rejected
            }
            Ok(response) => RefreshOutcome::Failed(TransportError::Network(format!(
                "refresh endpoint returned {}",
                response.status
            ))),
            Err(e) => RefreshOutcome::Failed(e),
        };

        self.publish(lineage, seq, &outcome);
        outcome
    }

    /// Apply a refresh outcome. Runs before the shared handle resolves, so
    /// waiters always observe the new state and credentials.
    fn publish(&self, lineage: u64, seq: u64, outcome: &RefreshOutcome) {
        metrics::record_refresh(outcome.label());

        let forced_logout = {
            let mut inner = self.lock();
            if !Self::is_current(&inner, lineage, seq) {
                tracing::debug!(seq, "Discarding refresh result superseded by login or logout");
                return;
            }
            inner.in_flight = None;
            inner.attached = 0;

            match outcome {
                RefreshOutcome::Refreshed => {
                    inner.epoch += 1;
                    inner.state = SessionState::Authenticated;
                    tracing::info!(epoch = inner.epoch, "Session refreshed");
                    false
                }
                RefreshOutcome::Rejected => {
                    inner.state = SessionState::Expired;
                    tracing::warn!("Session refresh rejected, forcing logout");
                    true
                }
                RefreshOutcome::Failed(e) => {
                    inner.state = SessionState::Expired;
                    tracing::warn!(error = %e, "Session refresh failed, forcing logout");
                    true
                }
            }
        };

        if forced_logout {
            self.transport.clear_credentials();
            self.observer.on_forced_logout();
            metrics::record_forced_logout();

            let mut inner = self.lock();
            if inner.lineage == lineage && inner.state == SessionState::Expired {
                inner.state = SessionState::Anonymous;
            }
        }
    }
}

/// Releases a waiter's slot if it leaves before the refresh resolves.
struct AttachGuard<'a> {
    core: &'a Core,
    lineage: u64,
    seq: u64,
}

impl Drop for AttachGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.core.lock();
        if Core::is_current(&inner, self.lineage, self.seq) {
            inner.attached = inner.attached.saturating_sub(1);
        }
    }
}

/// Cookie-session state machine with single-flight refresh.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct SessionManager {
    core: Arc<Core>,
}

impl SessionManager {
    /// `refresh_request` is sent verbatim for every refresh; it carries no
    /// body and relies on the refresh cookie held by `transport`.
    pub fn new(
        transport: Arc<dyn Transport>,
        refresh_request: WireRequest,
        settings: SessionSettings,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let (lineage_tx, _) = watch::channel(0);
        Self {
            core: Arc::new(Core {
                inner: Mutex::new(Inner {
                    state: SessionState::Anonymous,
                    epoch: 0,
                    lineage: 0,
                    refresh_seq: 0,
                    in_flight: None,
                    attached: 0,
                }),
                transport,
                refresh_request,
                settings,
                observer,
                lineage_tx,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.core.lock().state
    }

    /// Credential generation a call is sent under.
    pub fn epoch(&self) -> u64 {
        self.core.lock().epoch
    }

    /// Calls currently waiting on the in-flight refresh.
    pub fn attached(&self) -> usize {
        self.core.lock().attached
    }

    /// Record a successful login (or a resumed cookie session).
    pub fn mark_authenticated(&self) {
        let superseded = {
            let mut inner = self.core.lock();
            inner.state = SessionState::Authenticated;
            inner.epoch += 1;
            if inner.in_flight.take().is_some() {
                inner.attached = 0;
                inner.lineage += 1;
                Some(inner.lineage)
            } else {
                None
            }
        };
        if let Some(lineage) = superseded {
            self.core.lineage_tx.send_replace(lineage);
        }
        tracing::info!("Session authenticated");
    }

    /// Explicit logout: clears the session and cancels every pending retry.
    /// No forced-logout side effects fire.
    pub fn logout(&self) {
        let (lineage, cancelled) = {
            let mut inner = self.core.lock();
            let cancelled = inner.attached;
            inner.state = SessionState::Anonymous;
            inner.in_flight = None;
            inner.attached = 0;
            inner.lineage += 1;
            (inner.lineage, cancelled)
        };
        self.core.lineage_tx.send_replace(lineage);
        tracing::info!(cancelled, "Session logged out");
    }

    /// Handle a first 401 for a call sent under `sent_epoch`.
    ///
    /// Returns `Ok(())` when the call should be retried once with the
    /// current credentials. The retry itself is the caller's job, so a
    /// caller dropped while waiting never issues it.
    pub async fn recover(&self, sent_epoch: u64) -> Result<(), ClientError> {
        let (lineage, seq, handle) = {
            let mut inner = self.core.lock();
            match inner.state {
                SessionState::Anonymous | SessionState::Expired => {
                    return Err(ClientError::NotAuthenticated);
                }
                SessionState::Authenticated if inner.epoch > sent_epoch => {
                    tracing::debug!(
                        sent_epoch,
                        epoch = inner.epoch,
                        "Credentials refreshed since send, retrying directly"
                    );
                    return Ok(());
                }
                _ => {}
            }

            let existing = inner.in_flight.as_ref().map(|(s, h)| (*s, h.clone()));
            let (seq, handle) = match existing {
                Some(attached_to) => {
                    if inner.attached >= self.core.settings.max_attached {
                        tracing::warn!(
                            attached = inner.attached,
                            "Refresh queue full, shedding request"
                        );
                        return Err(ClientError::RefreshQueueFull(inner.attached));
                    }
                    attached_to
                }
                None => {
                    inner.refresh_seq += 1;
                    let seq = inner.refresh_seq;
                    let handle = self.spawn_refresh(inner.lineage, seq);
                    inner.state = SessionState::Refreshing;
                    inner.in_flight = Some((seq, handle.clone()));
                    tracing::info!(seq, "Session expired, refreshing");
                    (seq, handle)
                }
            };
            inner.attached += 1;
            (inner.lineage, seq, handle)
        };

        let _guard = AttachGuard {
            core: &self.core,
            lineage,
            seq,
        };
        let mut lineage_rx = self.core.lineage_tx.subscribe();

        let outcome = tokio::select! {
            outcome = handle => outcome,
            _ = lineage_changed(&mut lineage_rx, lineage) => {
                tracing::debug!(seq, "Pending retry cancelled");
                return Err(ClientError::Cancelled);
            }
        };

        if self.core.lock().lineage != lineage {
            return Err(ClientError::Cancelled);
        }

        match outcome {
            RefreshOutcome::Refreshed => Ok(()),
            RefreshOutcome::Rejected | RefreshOutcome::Failed(_) => {
                Err(ClientError::AuthenticationFailed)
            }
        }
    }

    fn spawn_refresh(&self, lineage: u64, seq: u64) -> RefreshHandle {
        let core = self.core.clone();
        let task = tokio::spawn(core.clone().run_refresh(lineage, seq));

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let outcome = RefreshOutcome::Failed(TransportError::Network(format!(
                        "refresh task aborted: {}",
                        e
                    )));
                    core.publish(lineage, seq, &outcome);
                    outcome
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.core.lock();
        f.debug_struct("SessionManager")
            .field("state", &inner.state)
            .field("epoch", &inner.epoch)
            .field("attached", &inner.attached)
            .finish()
    }
}

async fn lineage_changed(rx: &mut watch::Receiver<u64>, lineage: u64) {
    loop {
        if *rx.borrow_and_update() != lineage {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
