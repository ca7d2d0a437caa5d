//! Envelope crypto subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound JSON payload
//!     → envelope.rs (serialize → AES-256-CBC/PKCS7 → base64)
//!     → Envelope { encrypted, iv, timestamp }
//!
//! Inbound Envelope
//!     → envelope.rs (shape check → base64 decode → replay window → decrypt)
//!     → JSON payload
//! ```
//!
//! # Security Constraints
//! - Key material comes ONLY from the environment (see key.rs)
//! - Keys, IVs and ciphertext are never logged
//! - CBC without an integrity tag: tampering is detected only when padding or
//!   JSON decoding fails

pub mod envelope;
pub mod key;

pub use envelope::{now_ms, Envelope, EnvelopeCodec, EnvelopeError, DEFAULT_REPLAY_WINDOW};
pub use key::{EnvelopeKey, KeyError, DEFAULT_KEY_ENV_VAR, KEY_LEN};
