//! Path classification for envelope participation.
//!
//! # Responsibilities
//! - Decide per path and direction whether the envelope applies
//! - Keep outbound (encrypt request) and inbound (decrypt response) lists apart
//!
//! Upload endpoints are classified inbound-only: their responses are
//! decrypted but requests to them are sent in the clear.

use crate::config::SensitivityConfig;

/// Outbound paths whose requests are sealed.
pub const DEFAULT_OUTBOUND: &[&str] = &[
    "/auth/",
    "/users",
    "/accounts",
    "/transactions",
    "/transfers",
    "/loans",
    "/notifications",
    "/reports",
    "/security",
];

/// Inbound-only additions on top of [`DEFAULT_OUTBOUND`].
pub const INBOUND_ONLY: &[&str] = &["/uploads"];

/// Which way a payload is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

/// Matches any path containing the fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    fragment: String,
}

impl PathRule {
    pub fn new(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        path.contains(&self.fragment)
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }
}

/// Ordered rule lists for both directions.
#[derive(Debug, Clone)]
pub struct SensitivityPolicy {
    outbound: Vec<PathRule>,
    inbound: Vec<PathRule>,
}

impl SensitivityPolicy {
    pub fn new<O, I>(outbound: O, inbound: I) -> Self
    where
        O: IntoIterator,
        O::Item: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            outbound: outbound.into_iter().map(PathRule::new).collect(),
            inbound: inbound.into_iter().map(PathRule::new).collect(),
        }
    }

    pub fn from_config(config: &SensitivityConfig) -> Self {
        Self::new(config.outbound.iter().cloned(), config.inbound.iter().cloned())
    }

    pub fn is_sensitive(&self, path: &str, direction: Direction) -> bool {
        // Query strings never participate in matching.
        let path = path.split('?').next().unwrap_or(path);
        self.rules(direction).iter().any(|rule| rule.matches(path))
    }

    pub fn rules(&self, direction: Direction) -> &[PathRule] {
        match direction {
            Direction::Outbound => &self.outbound,
            Direction::Inbound => &self.inbound,
        }
    }
}

impl Default for SensitivityPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_OUTBOUND.iter().copied(),
            DEFAULT_OUTBOUND.iter().chain(INBOUND_ONLY).copied(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_outbound() {
        let policy = SensitivityPolicy::default();

        assert!(policy.is_sensitive("/api/auth/login", Direction::Outbound));
        assert!(policy.is_sensitive("/api/accounts/42", Direction::Outbound));
        assert!(policy.is_sensitive("/transfers", Direction::Outbound));
        assert!(policy.is_sensitive("/api/users?page=2", Direction::Outbound));
        assert!(!policy.is_sensitive("/api/health", Direction::Outbound));
        assert!(!policy.is_sensitive("/api/chat/messages", Direction::Outbound));
    }

    #[test]
    fn test_upload_asymmetry() {
        let policy = SensitivityPolicy::default();

        assert!(!policy.is_sensitive("/api/uploads/statement.pdf", Direction::Outbound));
        assert!(policy.is_sensitive("/api/uploads/statement.pdf", Direction::Inbound));
    }

    #[test]
    fn test_auth_rule_needs_trailing_slash() {
        let policy = SensitivityPolicy::default();
        assert!(!policy.is_sensitive("/authority", Direction::Outbound));
    }

    #[test]
    fn test_query_string_ignored() {
        let policy = SensitivityPolicy::default();
        assert!(!policy.is_sensitive("/api/health?next=/accounts", Direction::Inbound));
    }

    #[test]
    fn test_custom_lists() {
        let policy = SensitivityPolicy::new(["/vault"], ["/vault", "/uploads"]);
        assert!(policy.is_sensitive("/vault/items", Direction::Outbound));
        assert!(!policy.is_sensitive("/accounts", Direction::Outbound));
        assert_eq!(policy.rules(Direction::Inbound).len(), 2);
    }
}
