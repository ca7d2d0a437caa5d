//! Retry logic for network failures.
//!
//! # Responsibilities
//! - Determine if a failed attempt is retryable
//! - Bound the number of attempts and the delay between them
//!
//! # Design Decisions
//! - Never retry POST/PUT/DELETE/PATCH: a funds transfer must not be submitted twice
//! - Only network errors and timeouts qualify; HTTP statuses never do
//! - 401 handling lives in the session manager, not here

use std::time::Duration;

use reqwest::Method;

use crate::config::RetryConfig;
use crate::error::TransportError;
use crate::resilience::backoff::calculate_backoff;

/// Returns true if `method` may be resent after `error`.
pub fn is_retryable(method: &Method, error: &TransportError) -> bool {
    let safe = matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS);
    let transient = matches!(error, TransportError::Network(_) | TransportError::Timeout(_));
    safe && transient
}

/// Bounded exponential-backoff policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: if config.enabled { config.max_attempts.max(1) } else { 1 },
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt, or `None` when the failure is final.
    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn next_delay(
        &self,
        attempt: u32,
        method: &Method,
        error: &TransportError,
    ) -> Option<Duration> {
        if attempt >= self.max_attempts || !is_retryable(method, error) {
            return None;
        }
        Some(calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
