//! Session continuity subsystem.
//!
//! # State Machine
//! ```text
//! ANONYMOUS ──login──▶ AUTHENTICATED ──401──▶ REFRESHING ──ok──▶ AUTHENTICATED
//!     ▲                    │                      │
//!     │                 logout                 rejected
//!     │                    │                      ▼
//!     └────────────────────┴──────────────── EXPIRED (forced logout, transient)
//! ```
//!
//! # Design Decisions
//! - One refresh call in flight at most; later 401s attach to it (single-flight)
//! - The refresh runs in its own task so a dropped caller cannot strand waiters
//! - Waiters retry from their own futures: a dropped caller never retries
//! - A bounded number of waiters per refresh; the rest are shed
//! - Session epoch: a 401 on a call sent before the last refresh retries directly

pub mod manager;
pub mod state;

pub use manager::{LoggingObserver, SessionManager, SessionObserver, SessionSettings};
pub use state::{RefreshOutcome, SessionState};
