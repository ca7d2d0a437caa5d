//! Secure envelope transport and session continuity.
//!
//! Client half: [`client::SecureClient`] seals sensitive calls, opens sealed
//! replies and keeps a cookie session alive across concurrent expiries with a
//! single-flight refresh. Server half: [`gateway`] opens and seals the same
//! envelope in front of a plaintext upstream.

// Envelope core
pub mod crypto;
pub mod pipeline;
pub mod policy;
pub mod session;

// Composition
pub mod client;
pub mod gateway;
pub mod transport;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use client::SecureClient;
pub use config::EnvelopeConfig;
pub use error::{ClientError, TransportError};
pub use gateway::GatewayServer;
pub use lifecycle::Shutdown;
