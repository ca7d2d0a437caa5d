//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, retry bounds sane)
//! - Check URLs and socket addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: EnvelopeConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use crate::config::schema::EnvelopeConfig;

/// A single semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &EnvelopeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if url::Url::parse(&config.api.base_url).is_err() {
        errors.push(ValidationError::new("api.base_url", "not a valid URL"));
    }

    if config.crypto.key_env.trim().is_empty() {
        errors.push(ValidationError::new("crypto.key_env", "must name an environment variable"));
    }
    if config.crypto.replay_window_secs == 0 {
        errors.push(ValidationError::new("crypto.replay_window_secs", "must be > 0"));
    }

    for (field, path) in [
        ("session.login_path", &config.session.login_path),
        ("session.refresh_path", &config.session.refresh_path),
        ("session.logout_path", &config.session.logout_path),
    ] {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(field, "must start with '/'"));
        }
    }
    if config.session.max_attached == 0 {
        errors.push(ValidationError::new("session.max_attached", "must be > 0"));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be > 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.timeouts.refresh_secs == 0 {
        errors.push(ValidationError::new("timeouts.refresh_secs", "must be > 0"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    if config.sensitivity.outbound.iter().any(|p| p.is_empty())
        || config.sensitivity.inbound.iter().any(|p| p.is_empty())
    {
        errors.push(ValidationError::new(
            "sensitivity",
            "empty path fragments would match every path",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new("observability.metrics_address", "not a socket address"));
    }

    if config.gateway.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("gateway.bind_address", "not a socket address"));
    }
    if config.gateway.upstream.trim().is_empty() {
        errors.push(ValidationError::new("gateway.upstream", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
