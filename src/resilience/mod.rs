//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the remote API:
//!     → timeouts.rs (every attempt, retry and refresh has its own deadline)
//!     → On network failure: retries.rs (idempotent? attempts left?)
//!     → backoff.rs (exponential delay with jitter)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - A timeout is a network failure, never an authentication signal
//! - Retries only for idempotent methods (a transfer is never sent twice)
//! - This path is independent of the session refresh-and-retry path

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::calculate_backoff;
pub use retries::{is_retryable, RetryPolicy};
pub use timeouts::with_deadline;
