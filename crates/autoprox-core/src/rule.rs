//! The provisioning rule contract.
//!
//! A rule decides whether it applies to a store key and synthesizes the
//! definition AutoProx should create for it. Rules are pure with respect to
//! the catalog: nothing here mutates catalog state.

use std::fmt;

use repo_state::{Group, HostedRepository, RemoteRepository, StoreKey};
use thiserror::Error;

/// A rule could not synthesize a definition for `key`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot synthesize {key}: {message}")]
pub struct RuleError {
    pub key: StoreKey,
    pub message: String,
}

impl RuleError {
    pub fn new(key: &StoreKey, message: impl Into<String>) -> Self {
        RuleError {
            key: key.clone(),
            message: message.into(),
        }
    }

    pub fn invalid_url(key: &StoreKey, url: &str, reason: impl fmt::Display) -> Self {
        RuleError::new(key, format!("invalid URL '{}': {}", url, reason))
    }
}

/// Policy object deciding applicability and shape of synthesized stores.
///
/// Only the `create_*` method matching the key's store type is ever called.
/// `Ok(None)` means "no applicable definition" and is reported as not found.
pub trait AutoProxRule: Send + Sync + fmt::Debug {
    fn matches(&self, key: &StoreKey) -> bool;

    fn create_remote_repository(
        &self,
        _key: &StoreKey,
    ) -> Result<Option<RemoteRepository>, RuleError> {
        Ok(None)
    }

    fn create_hosted_repository(
        &self,
        _key: &StoreKey,
    ) -> Result<Option<HostedRepository>, RuleError> {
        Ok(None)
    }

    fn create_group(&self, _key: &StoreKey) -> Result<Option<Group>, RuleError> {
        Ok(None)
    }

    /// When false, synthesized remotes and groups are trusted without a probe.
    fn is_validation_enabled(&self) -> bool {
        true
    }

    /// Path probed under the validation remote; `None` probes the root.
    fn remote_validation_path(&self) -> Option<String> {
        None
    }

    /// Endpoint used only for validation. `None` skips the probe.
    fn create_validation_remote(
        &self,
        key: &StoreKey,
    ) -> Result<Option<RemoteRepository>, RuleError> {
        self.create_remote_repository(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repo_state::{StoreType, PKG_TYPE_MAVEN};

    #[derive(Debug)]
    struct RemoteOnly;

    impl AutoProxRule for RemoteOnly {
        fn matches(&self, key: &StoreKey) -> bool {
            key.name().starts_with("r-")
        }

        fn create_remote_repository(
            &self,
            key: &StoreKey,
        ) -> Result<Option<RemoteRepository>, RuleError> {
            Ok(Some(RemoteRepository::new(
                key.package_type(),
                key.name(),
                format!("http://example.test/{}", key.name()),
            )))
        }
    }

    #[test]
    fn defaults_validate_against_the_synthesized_remote() {
        let rule = RemoteOnly;
        let key = StoreKey::maven(StoreType::Remote, "r-1");

        assert!(rule.is_validation_enabled());
        assert_eq!(rule.remote_validation_path(), None);
        assert_eq!(
            rule.create_validation_remote(&key).unwrap(),
            rule.create_remote_repository(&key).unwrap()
        );
    }

    #[test]
    fn unimplemented_kinds_yield_none() {
        let rule = RemoteOnly;
        let key = StoreKey::new(PKG_TYPE_MAVEN, StoreType::Group, "r-1");
        assert_eq!(rule.create_group(&key).unwrap(), None);
        assert_eq!(rule.create_hosted_repository(&key).unwrap(), None);
    }

    #[test]
    fn rule_error_carries_key() {
        let key = StoreKey::maven(StoreType::Remote, "bad");
        let err = RuleError::invalid_url(&key, "ht!tp://", "relative URL without a base");
        assert_eq!(err.key, key);
        assert!(err.to_string().contains("maven:remote:bad"));
        assert!(err.to_string().contains("ht!tp://"));
    }
}
