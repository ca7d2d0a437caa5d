//! Envelope codec: AES-256-CBC with PKCS7 over the JSON form of a payload.
//!
//! Wire format:
//! ```text
//! { "encrypted": "<base64 ciphertext>", "iv": "<base64, 16 bytes>", "timestamp": <epoch-ms> }
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::crypto::key::EnvelopeKey;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// Envelopes older than this are rejected as replays.
pub const DEFAULT_REPLAY_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Errors raised while opening an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Structurally invalid: missing field, bad base64, wrong length.
    #[error("Malformed envelope: {0}")]
    Malformed(&'static str),

    /// Timestamp outside the replay window.
    #[error("Stale envelope: {age_ms} ms old")]
    Stale { age_ms: i64 },

    /// Padding removal failed or the plaintext is not UTF-8 JSON.
    #[error("Corrupt ciphertext: {0}")]
    Corrupt(&'static str),
}

impl EnvelopeError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EnvelopeError::Malformed(_) => "malformed",
            EnvelopeError::Stale { .. } => "stale",
            EnvelopeError::Corrupt(_) => "corrupt",
        }
    }

    /// Stale and corrupt envelopes point at replay, tampering or a key mismatch.
    pub fn is_security_event(&self) -> bool {
        !matches!(self, EnvelopeError::Malformed(_))
    }
}

/// The encrypted-payload wire structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Base64 ciphertext.
    #[serde(rename = "encrypted")]
    pub ciphertext: String,

    /// Base64 of the 16-byte IV.
    pub iv: String,

    /// Creation time in epoch milliseconds.
    pub timestamp: i64,
}

impl Envelope {
    /// Structural test: an object carrying both `encrypted` and `iv`.
    pub fn detect(value: &Value) -> bool {
        value
            .as_object()
            .map(|obj| obj.contains_key("encrypted") && obj.contains_key("iv"))
            .unwrap_or(false)
    }

    /// Read an envelope out of an arbitrary JSON value.
    pub fn from_value(value: &Value) -> Result<Self, EnvelopeError> {
        let obj = value
            .as_object()
            .ok_or(EnvelopeError::Malformed("envelope is not an object"))?;

        let ciphertext = obj
            .get("encrypted")
            .and_then(Value::as_str)
            .ok_or(EnvelopeError::Malformed("missing ciphertext"))?;
        let iv = obj
            .get("iv")
            .and_then(Value::as_str)
            .ok_or(EnvelopeError::Malformed("missing iv"))?;
        let timestamp = obj
            .get("timestamp")
            .and_then(Value::as_i64)
            .ok_or(EnvelopeError::Malformed("missing timestamp"))?;

        Ok(Self {
            ciphertext: ciphertext.to_string(),
            iv: iv.to_string(),
            timestamp,
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "encrypted": self.ciphertext,
            "iv": self.iv,
            "timestamp": self.timestamp,
        })
    }
}

/// Encrypts and decrypts envelopes with a fixed key.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    key: EnvelopeKey,
    replay_window: Duration,
}

impl EnvelopeCodec {
    pub fn new(key: EnvelopeKey) -> Self {
        Self::with_replay_window(key, DEFAULT_REPLAY_WINDOW)
    }

    pub fn with_replay_window(key: EnvelopeKey, replay_window: Duration) -> Self {
        Self { key, replay_window }
    }

    pub fn replay_window(&self) -> Duration {
        self.replay_window
    }

    /// Seal a JSON payload. A fresh random IV is drawn for every call.
    pub fn encrypt(&self, plaintext: &Value) -> Envelope {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let serialized = plaintext.to_string();
        let ciphertext = Aes256CbcEnc::new(self.key.as_bytes().into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(serialized.as_bytes());

        Envelope {
            ciphertext: BASE64.encode(ciphertext),
            iv: BASE64.encode(iv),
            timestamp: now_ms(),
        }
    }

    /// Open an envelope back into its JSON payload.
    pub fn decrypt(&self, envelope: &Envelope) -> Result<Value, EnvelopeError> {
        let iv = BASE64
            .decode(&envelope.iv)
            .map_err(|_| EnvelopeError::Malformed("iv is not valid base64"))?;
        let iv: [u8; IV_LEN] = iv
            .try_into()
            .map_err(|_| EnvelopeError::Malformed("iv must be 16 bytes"))?;

        let ciphertext = BASE64
            .decode(&envelope.ciphertext)
            .map_err(|_| EnvelopeError::Malformed("ciphertext is not valid base64"))?;
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
            return Err(EnvelopeError::Malformed(
                "ciphertext length is not a multiple of the block size",
            ));
        }

        // Timestamps come off the wire; a far-past value saturates to stale.
        let age_ms = now_ms().saturating_sub(envelope.timestamp);
        let window_ms = i64::try_from(self.replay_window.as_millis()).unwrap_or(i64::MAX);
        if age_ms > window_ms {
            return Err(EnvelopeError::Stale { age_ms });
        }

        let plaintext = Aes256CbcDec::new(self.key.as_bytes().into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| EnvelopeError::Corrupt("padding check failed"))?;
        let text = String::from_utf8(plaintext)
            .map_err(|_| EnvelopeError::Corrupt("plaintext is not UTF-8"))?;

        serde_json::from_str(&text).map_err(|_| EnvelopeError::Corrupt("plaintext is not JSON"))
    }

    /// Parse and open an envelope held in a JSON value.
    pub fn decrypt_value(&self, value: &Value) -> Result<Value, EnvelopeError> {
        let envelope = Envelope::from_value(value)?;
        self.decrypt(&envelope)
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
