//! Gateway subsystem: the server half of the envelope.
//!
//! # Data Flow
//! ```text
//! Client request (x-encrypted: true, envelope body)
//!     → middleware.rs (open envelope, strip marker)
//!     → server.rs (forward plaintext upstream)
//!     → upstream reply
//!     → middleware.rs (seal JSON reply, copy `success`)
//!     → Client
//! ```
//!
//! # Design Decisions
//! - The marker header alone decides whether the reply is sealed
//! - Every envelope failure answers the same opaque 400
//! - Set-Cookie and other upstream headers pass through untouched

pub mod middleware;
pub mod server;

pub use middleware::{envelope_middleware, with_envelope, EnvelopeState};
pub use server::{GatewayError, GatewayServer};
