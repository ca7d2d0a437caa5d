//! Lifecycle management for the gateway binary.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → every subscribed server stops accepting → drains → exits
//!
//! Signals (signals.rs):
//!     SIGINT / SIGTERM → Shutdown::trigger
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; late subscribers after a trigger see it too
//! - In-flight requests finish; nothing new is accepted

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::spawn_signal_listener;
