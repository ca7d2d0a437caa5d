//! Shared symmetric key for the envelope.
//!
//! # Security
//! - Loaded ONLY from an environment variable, never from the config file
//! - Never logged; `Debug` is redacted
//! - Constant for the process lifetime (no runtime rotation)

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;

/// Length of an AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// Default environment variable holding the key.
pub const DEFAULT_KEY_ENV_VAR: &str = "ENVELOPE_KEY";

/// Errors raised while loading the envelope key.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Environment variable {0} not set")]
    MissingEnv(String),

    #[error("Envelope key must be 64 hex chars, base64 of 32 bytes, or a 32-byte string")]
    InvalidFormat,
}

/// A 32-byte AES-256 key shared by both ends of the link.
#[derive(Clone, PartialEq, Eq)]
pub struct EnvelopeKey([u8; KEY_LEN]);

impl EnvelopeKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a key from its textual form.
    ///
    /// Accepted, in order: 64 hex characters (optional `0x` prefix), standard
    /// base64 of exactly 32 bytes, or a literal 32-byte UTF-8 string.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let raw = raw.trim();
        let hex_part = raw.strip_prefix("0x").unwrap_or(raw);

        if hex_part.len() == KEY_LEN * 2 {
            if let Ok(bytes) = hex::decode(hex_part) {
                return Self::from_slice(&bytes);
            }
        }

        if let Ok(bytes) = BASE64.decode(raw) {
            if bytes.len() == KEY_LEN {
                return Self::from_slice(&bytes);
            }
        }

        if raw.len() == KEY_LEN {
            return Self::from_slice(raw.as_bytes());
        }

        Err(KeyError::InvalidFormat)
    }

    /// Load the key from the named environment variable.
    pub fn from_env(var: &str) -> Result<Self, KeyError> {
        let raw = std::env::var(var).map_err(|_| KeyError::MissingEnv(var.to_string()))?;
        let key = Self::parse(&raw)?;
        tracing::info!(env_var = %var, "Envelope key loaded");
        Ok(key)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| KeyError::InvalidFormat)?;
        Ok(Self(array))
    }
}

impl std::fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EnvelopeKey(<redacted>)")
    }
}
