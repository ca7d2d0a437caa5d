//! Sensitivity policy subsystem.
//!
//! # Data Flow
//! ```text
//! SensitivityConfig (outbound[], inbound[])
//!     → classifier.rs (compile into PathRule lists)
//!     → is_sensitive(path, direction) → bool
//! ```
//!
//! # Design Decisions
//! - Separate outbound and inbound lists; they are allowed to differ
//! - Substring match, no regex, first match wins
//! - Immutable after construction (shared via Arc without locks)

pub mod classifier;

pub use classifier::{Direction, PathRule, SensitivityPolicy};
