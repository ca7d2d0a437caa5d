//! Envelope pipelines around every call.
//!
//! # Data Flow
//! ```text
//! ApiRequest
//!     → request.rs (classify outbound → seal body / mark x-encrypted)
//!     → WireRequest → transport
//!
//! WireResponse
//!     → response.rs (classify inbound → locate envelope → open in place)
//!     → DecodeOutcome { Decrypted | Passthrough | Failed }
//! ```
//!
//! # Design Decisions
//! - The request pipeline runs per attempt: every retry gets a fresh IV and timestamp
//! - Envelope placement is a fixed precedence list, first match wins
//! - Plaintext and legacy replies pass through rather than failing

pub mod request;
pub mod response;

pub use request::{ApiRequest, RequestPipeline, ENCRYPTED_HEADER};
pub use response::{DecodeOutcome, Placement, ResponsePipeline};
