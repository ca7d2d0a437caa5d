//! HTTP client core.
//!
//! # Data Flow
//! ```text
//! caller
//!     → SecureClient::send
//!     → RequestPipeline::prepare (per attempt)
//!     → Transport::send under a deadline, backoff retries for idempotent calls
//!     → 2xx: ResponsePipeline::decode_bytes → plaintext JSON
//!     → 401: SessionManager::recover → retry once
//!     → 403 / other: error, never retried
//! ```
//!
//! # Design Decisions
//! - The client is the composition root; the session manager is injected, not global
//! - Network retries and the refresh-and-retry path never feed each other
//! - Callers only ever see plaintext JSON or a [`crate::error::ClientError`]

pub mod secure;

pub use secure::{BuildError, SecureClient, SecureClientBuilder};
