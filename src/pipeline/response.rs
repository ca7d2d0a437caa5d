//! Inbound half of the envelope.
//!
//! # Envelope placement
//! Endpoints put their envelope at different depths. The search order is
//! fixed and part of the contract; the first placement that matches wins:
//!
//! ```text
//! 1. Root      { encrypted, iv, timestamp, ... }         → plaintext replaces the payload
//! 2. DataUser  { data: { user: { encrypted, iv, ... } } } → plaintext spliced into data.user
//! 3. Data      { data: { encrypted, iv, ... } }           → plaintext replaces data
//! 4. none                                                 → payload passes through
//! ```

use std::sync::Arc;

use serde_json::Value;

use crate::crypto::{Envelope, EnvelopeCodec, EnvelopeError};
use crate::observability::logging::SECURITY_TARGET;
use crate::observability::metrics;
use crate::policy::{Direction, SensitivityPolicy};

/// Where an envelope was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Root,
    DataUser,
    Data,
}

impl Placement {
    /// Search order.
    pub const PRECEDENCE: [Placement; 3] = [Placement::Root, Placement::DataUser, Placement::Data];

    fn pointer(self) -> &'static str {
        match self {
            Placement::Root => "",
            Placement::DataUser => "/data/user",
            Placement::Data => "/data",
        }
    }

    fn locate(self, payload: &Value) -> Option<&Value> {
        payload.pointer(self.pointer()).filter(|v| Envelope::detect(v))
    }

    fn splice(self, mut payload: Value, plaintext: Value) -> Value {
        match self {
            Placement::Root => plaintext,
            Placement::DataUser | Placement::Data => {
                if let Some(slot) = payload.pointer_mut(self.pointer()) {
                    *slot = plaintext;
                }
                payload
            }
        }
    }
}

/// Result of inspecting one inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    Decrypted { value: Value, placement: Placement },
    Passthrough(Value),
    Failed(EnvelopeError),
}

impl DecodeOutcome {
    pub fn into_result(self) -> Result<Value, EnvelopeError> {
        match self {
            DecodeOutcome::Decrypted { value, .. } | DecodeOutcome::Passthrough(value) => Ok(value),
            DecodeOutcome::Failed(err) => Err(err),
        }
    }
}

/// Classifies inbound payloads and opens envelopes in place.
#[derive(Debug, Clone)]
pub struct ResponsePipeline {
    codec: Arc<EnvelopeCodec>,
    policy: Arc<SensitivityPolicy>,
}

impl ResponsePipeline {
    pub fn new(codec: Arc<EnvelopeCodec>, policy: Arc<SensitivityPolicy>) -> Self {
        Self { codec, policy }
    }

    pub fn decode(&self, path: &str, payload: Value) -> DecodeOutcome {
        if !self.policy.is_sensitive(path, Direction::Inbound) {
            return DecodeOutcome::Passthrough(payload);
        }

        let located = Placement::PRECEDENCE
            .iter()
            .copied()
            .find_map(|p| p.locate(&payload).map(|v| (p, self.codec.decrypt_value(v))));
        let Some((placement, opened)) = located else {
            return DecodeOutcome::Passthrough(payload);
        };

        match opened {
            Ok(plaintext) => DecodeOutcome::Decrypted {
                value: placement.splice(payload, plaintext),
                placement,
            },
            Err(err) => {
                report_failure(path, placement, &err);
                DecodeOutcome::Failed(err)
            }
        }
    }

    /// Decode a raw body. Empty bodies become `null`; non-JSON bodies
    /// pass through as a JSON string.
    pub fn decode_bytes(&self, path: &str, body: &[u8]) -> DecodeOutcome {
        if body.is_empty() {
            return DecodeOutcome::Passthrough(Value::Null);
        }
        match serde_json::from_slice::<Value>(body) {
            Ok(payload) => self.decode(path, payload),
            Err(_) => DecodeOutcome::Passthrough(Value::String(String::from_utf8_lossy(body).into_owned())),
        }
    }
}

fn report_failure(path: &str, placement: Placement, err: &EnvelopeError) {
    metrics::record_envelope_failure(err.kind());
    if err.is_security_event() {
        tracing::warn!(
            target: SECURITY_TARGET,
            path = %path,
            placement = ?placement,
            kind = err.kind(),
            "Rejected inbound envelope"
        );
    } else {
        tracing::debug!(path = %path, placement = ?placement, error = %err, "Malformed inbound envelope");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{now_ms, EnvelopeKey};
    use serde_json::json;

    fn setup() -> (ResponsePipeline, Arc<EnvelopeCodec>) {
        let codec = Arc::new(EnvelopeCodec::new(EnvelopeKey::from_bytes([11u8; 32])));
        let pipeline = ResponsePipeline::new(codec.clone(), Arc::new(SensitivityPolicy::default()));
        (pipeline, codec)
    }

    #[test]
    fn test_root_envelope_replaces_payload() {
        let (pipeline, codec) = setup();
        let plaintext = json!({"success": true, "data": {"accounts": [{"id": 1, "balance": 50}]}});

        let mut body = codec.encrypt(&plaintext).to_value();
        body["success"] = json!(true);

        let outcome = pipeline.decode("/accounts", body);
        assert_eq!(
            outcome,
            DecodeOutcome::Decrypted {
                value: plaintext,
                placement: Placement::Root
            }
        );
    }

    #[test]
    fn test_data_user_spliced_in_place() {
        let (pipeline, codec) = setup();
        let user = json!({"id": 7, "email": "a@b.com"});
        let body = json!({
            "success": true,
            "data": {
                "user": codec.encrypt(&user).to_value(),
                "expiresIn": 900
            }
        });

        let outcome = pipeline.decode("/auth/login", body);
        let DecodeOutcome::Decrypted { value, placement } = outcome else {
            panic!("expected decrypted outcome");
        };
        assert_eq!(placement, Placement::DataUser);
        assert_eq!(
            value,
            json!({"success": true, "data": {"user": user, "expiresIn": 900}})
        );
    }

    #[test]
    fn test_data_envelope_replaced() {
        let (pipeline, codec) = setup();
        let data = json!([{"id": "tx-1", "amount": -20}]);
        let body = json!({"success": true, "data": codec.encrypt(&data).to_value()});

        let value = pipeline.decode("/transactions", body).into_result().unwrap();
        assert_eq!(value, json!({"success": true, "data": data}));
    }

    #[test]
    fn test_root_wins_over_nested() {
        let (pipeline, codec) = setup();
        let root_plain = json!({"from": "root"});
        let nested_plain = json!({"from": "nested"});

        let mut body = codec.encrypt(&root_plain).to_value();
        body["data"] = json!({"user": codec.encrypt(&nested_plain).to_value()});

        let outcome = pipeline.decode("/users/me", body);
        assert_eq!(
            outcome,
            DecodeOutcome::Decrypted {
                value: root_plain,
                placement: Placement::Root
            }
        );
    }

    #[test]
    fn test_data_user_wins_over_data() {
        let (pipeline, codec) = setup();
        // data is envelope-shaped too, but data.user is checked first.
        let body = json!({"data": {"user": codec.encrypt(&json!(1)).to_value(), "encrypted": "x", "iv": "y"}});
        let outcome = pipeline.decode("/users", body);
        assert!(matches!(
            outcome,
            DecodeOutcome::Decrypted { placement: Placement::DataUser, .. }
        ));
    }

    #[test]
    fn test_plaintext_passthrough() {
        let (pipeline, _) = setup();
        let body = json!({"success": true, "data": {"balance": 10}});
        assert_eq!(
            pipeline.decode("/accounts", body.clone()),
            DecodeOutcome::Passthrough(body)
        );
    }

    #[test]
    fn test_insensitive_path_never_decrypts() {
        let (pipeline, codec) = setup();
        let body = codec.encrypt(&json!({"x": 1})).to_value();
        assert_eq!(
            pipeline.decode("/chat", body.clone()),
            DecodeOutcome::Passthrough(body)
        );
    }

    #[test]
    fn test_upload_reply_is_decrypted() {
        let (pipeline, codec) = setup();
        let body = codec.encrypt(&json!({"fileId": "f-1"})).to_value();
        assert!(matches!(
            pipeline.decode("/uploads", body),
            DecodeOutcome::Decrypted { .. }
        ));
    }

    #[test]
    fn test_stale_envelope_fails() {
        let (pipeline, codec) = setup();
        let mut envelope = codec.encrypt(&json!({"x": 1}));
        envelope.timestamp = now_ms() - 400_000;

        let outcome = pipeline.decode("/accounts", envelope.to_value());
        assert!(matches!(outcome, DecodeOutcome::Failed(EnvelopeError::Stale { .. })));
    }

    #[test]
    fn test_decode_bytes_edge_cases() {
        let (pipeline, _) = setup();
        assert_eq!(pipeline.decode_bytes("/accounts", b""), DecodeOutcome::Passthrough(Value::Null));
        assert_eq!(
            pipeline.decode_bytes("/accounts", b"Service Unavailable"),
            DecodeOutcome::Passthrough(json!("Service Unavailable"))
        );
    }
}
