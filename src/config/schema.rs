//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client
//! and the gateway. All types derive Serde traits for deserialization from
//! config files.

use serde::{Deserialize, Serialize};

use crate::crypto::DEFAULT_KEY_ENV_VAR;
use crate::policy::classifier::{DEFAULT_OUTBOUND, INBOUND_ONLY};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Remote API the client talks to.
    pub api: ApiConfig,

    /// Envelope key source and replay window.
    pub crypto: CryptoConfig,

    /// Session endpoints and refresh fan-in.
    pub session: SessionConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration for network failures.
    pub retries: RetryConfig,

    /// Path lists for envelope participation.
    pub sensitivity: SensitivityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Server-side gateway settings.
    pub gateway: GatewayConfig,
}

/// Remote API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every request path is joined onto.
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
        }
    }
}

/// Envelope crypto configuration.
///
/// The key itself never lives in the config file; only the name of the
/// environment variable holding it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Environment variable holding the shared key.
    pub key_env: String,

    /// Maximum envelope age in seconds.
    pub replay_window_secs: u64,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            key_env: DEFAULT_KEY_ENV_VAR.to_string(),
            replay_window_secs: 300,
        }
    }
}

/// Session endpoints and single-flight limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub login_path: String,
    pub refresh_path: String,
    pub logout_path: String,

    /// Maximum calls that may wait on one in-flight refresh.
    pub max_attached: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_path: "/auth/login".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            logout_path: "/auth/logout".to_string(),
            max_attached: 64,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Per-attempt deadline for ordinary calls and retries, in seconds.
    pub request_secs: u64,

    /// Deadline for the refresh call, in seconds.
    pub refresh_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            refresh_secs: 10,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Path fragments that participate in the envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SensitivityConfig {
    pub outbound: Vec<String>,
    pub inbound: Vec<String>,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        let outbound: Vec<String> = DEFAULT_OUTBOUND.iter().map(|s| s.to_string()).collect();
        let inbound = outbound
            .iter()
            .cloned()
            .chain(INBOUND_ONLY.iter().map(|s| s.to_string()))
            .collect();
        Self { outbound, inbound }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Envelope gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Plaintext upstream API address (e.g., "127.0.0.1:5001").
    pub upstream: String,

    /// Maximum request/response body size in bytes.
    pub max_body_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            upstream: "127.0.0.1:5001".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
