//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EnvelopeConfig (validated, immutable)
//!     → handed to SecureClient / GatewayServer at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the envelope key is process-wide
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets are referenced by environment variable name, never inlined

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    ApiConfig, CryptoConfig, EnvelopeConfig, GatewayConfig, ObservabilityConfig, RetryConfig,
    SensitivityConfig, SessionConfig, TimeoutConfig,
};
