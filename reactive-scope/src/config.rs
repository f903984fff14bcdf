//! Configuration for a context manager.

use serde::{Deserialize, Serialize};

/// What `finish` does when a destroyer fails part way through a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownPolicy {
    /// Destroy every remaining instance and report all failures together.
    #[default]
    ContinueOnFailure,
    /// Stop at the first failure; untouched instances stay in the store.
    AbortOnFirstFailure,
}

/// Which snapshots `reset` checks against their origin thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreCheck {
    /// Only thread-bound snapshots (those that clear the binding on reset).
    #[default]
    PlaceholdersOnly,
    /// Every snapshot.
    Always,
}

/// Configuration for a [`ContextManager`](crate::context::ContextManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Name used in errors and log fields.
    pub scope_name: String,
    /// Behaviour of `finish` under destroyer failures.
    pub teardown_policy: TeardownPolicy,
    /// Which snapshots `reset` checks against their origin thread.
    pub restore_check: RestoreCheck,
}

fn default_scope_name() -> String {
    "reactive".to_string()
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            scope_name: default_scope_name(),
            teardown_policy: TeardownPolicy::default(),
            restore_check: RestoreCheck::default(),
        }
    }
}

impl ScopeConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scope name.
    #[must_use]
    pub fn with_scope_name(mut self, name: impl Into<String>) -> Self {
        self.scope_name = name.into();
        self
    }

    /// Sets the teardown policy.
    #[must_use]
    pub const fn with_teardown_policy(mut self, policy: TeardownPolicy) -> Self {
        self.teardown_policy = policy;
        self
    }

    /// Sets the restore check.
    #[must_use]
    pub const fn with_restore_check(mut self, check: RestoreCheck) -> Self {
        self.restore_check = check;
        self
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ScopeConfig::new();
        assert_eq!(config.scope_name, "reactive");
        assert_eq!(config.teardown_policy, TeardownPolicy::ContinueOnFailure);
        assert_eq!(config.restore_check, RestoreCheck::PlaceholdersOnly);
    }

    #[test]
    fn test_builders() {
        let config = ScopeConfig::new()
            .with_scope_name("request")
            .with_teardown_policy(TeardownPolicy::AbortOnFirstFailure)
            .with_restore_check(RestoreCheck::Always);

        assert_eq!(config.scope_name, "request");
        assert_eq!(config.teardown_policy, TeardownPolicy::AbortOnFirstFailure);
        assert_eq!(config.restore_check, RestoreCheck::Always);
    }

    #[test]
    fn test_from_json_partial() {
        let config = ScopeConfig::from_json(r#"{"teardown_policy": "abort_on_first_failure"}"#).unwrap();

        assert_eq!(
            config,
            ScopeConfig::new().with_teardown_policy(TeardownPolicy::AbortOnFirstFailure)
        );
    }

    #[test]
    fn test_from_json_rejects_unknown_policy() {
        assert!(ScopeConfig::from_json(r#"{"teardown_policy": "sometimes"}"#).is_err());
    }
}
