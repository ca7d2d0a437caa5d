//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters via the metrics facade)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Prometheus scrape endpoint (gateway binary only)
//! ```
//!
//! # Design Decisions
//! - Structured fields, never interpolated secrets
//! - Security events (stale/corrupt envelopes) use the `security` target
//! - Metrics are cheap; with no recorder installed they are no-ops

pub mod logging;
pub mod metrics;
