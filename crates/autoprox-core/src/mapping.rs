//! Named bindings between rule source text and compiled rules.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use repo_state::{ArtifactStore, RemoteRepository, StoreKey, StoreType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AutoProxError, Result};
use crate::rule::{AutoProxRule, RuleError};

/// Name of the catch-all rule, always consulted last.
pub const DEFAULT_RULE_NAME: &str = "default";

/// A rule bound to its name and the source text it was compiled from.
///
/// Equality is by `(name, specification)`; two mappings compiled from the
/// same source compare equal even though their rule instances differ.
#[derive(Clone)]
pub struct RuleMapping {
    name: String,
    specification: String,
    spec_digest: String,
    rule: Arc<dyn AutoProxRule>,
}

impl RuleMapping {
    pub fn new(name: &str, specification: &str, rule: Arc<dyn AutoProxRule>) -> Self {
        Self {
            name: name.to_string(),
            specification: specification.to_string(),
            spec_digest: spec_digest(specification),
            rule,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn specification(&self) -> &str {
        &self.specification
    }

    /// SHA-256 of the specification text, lowercase hex.
    pub fn spec_digest(&self) -> &str {
        &self.spec_digest
    }

    pub fn rule(&self) -> &Arc<dyn AutoProxRule> {
        &self.rule
    }

    pub fn matches(&self, key: &StoreKey) -> bool {
        self.rule.matches(key)
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_RULE_NAME
    }

    /// Ask the rule for the definition of `key`, dispatching on store type.
    ///
    /// A definition whose key differs from `key` is a synthesis error.
    pub fn synthesize(&self, key: &StoreKey) -> Result<Option<ArtifactStore>> {
        let created = match key.store_type() {
            StoreType::Remote => self
                .rule
                .create_remote_repository(key)
                .map(|r| r.map(ArtifactStore::from)),
            StoreType::Hosted => self
                .rule
                .create_hosted_repository(key)
                .map(|h| h.map(ArtifactStore::from)),
            StoreType::Group => self
                .rule
                .create_group(key)
                .map(|g| g.map(ArtifactStore::from)),
        };

        match created.map_err(|source| self.synthesis_error(key, source))? {
            Some(store) if store.key() != key => Err(self.synthesis_error(
                key,
                RuleError::new(key, format!("rule produced {} instead", store.key())),
            )),
            other => Ok(other),
        }
    }

    /// Endpoint and path to probe before trusting a definition for `key`.
    ///
    /// `None` when the rule disables validation or supplies no endpoint.
    pub fn validation_target(&self, key: &StoreKey) -> Result<Option<(RemoteRepository, String)>> {
        if !self.rule.is_validation_enabled() {
            return Ok(None);
        }
        let remote = self
            .rule
            .create_validation_remote(key)
            .map_err(|source| self.synthesis_error(key, source))?;
        let path = self
            .rule
            .remote_validation_path()
            .unwrap_or_else(|| "/".to_string());
        Ok(remote.map(|remote| (remote, path)))
    }

    fn synthesis_error(&self, key: &StoreKey, source: RuleError) -> AutoProxError {
        AutoProxError::RuleSynthesis {
            rule: self.name.clone(),
            key: key.clone(),
            source,
        }
    }

    pub fn to_dto(&self) -> RuleDto {
        RuleDto {
            name: self.name.clone(),
            spec: self.specification.clone(),
        }
    }
}

pub(crate) fn spec_digest(specification: &str) -> String {
    hex::encode(Sha256::digest(specification.as_bytes()))
}

impl fmt::Debug for RuleMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleMapping")
            .field("name", &self.name)
            .field("spec_digest", &self.spec_digest)
            .finish_non_exhaustive()
    }
}

impl PartialEq for RuleMapping {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.specification == other.specification
    }
}

impl Eq for RuleMapping {}

impl PartialOrd for RuleMapping {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Catalog order: `default` last, everything else by name.
impl Ord for RuleMapping {
    fn cmp(&self, other: &Self) -> Ordering {
        self.is_default()
            .cmp(&other.is_default())
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.specification.cmp(&other.specification))
    }
}

/// Serializable view of a single rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDto {
    pub name: String,
    pub spec: String,
}

/// Serializable view of the whole catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDto {
    pub enabled: bool,
    pub rules: Vec<RuleDto>,
}

impl CatalogDto {
    pub fn rule(&self, name: &str) -> Option<&RuleDto> {
        self.rules.iter().find(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repo_state::{Group, HostedRepository};

    #[derive(Debug)]
    struct Prefix(&'static str);

    impl AutoProxRule for Prefix {
        fn matches(&self, key: &StoreKey) -> bool {
            key.name().starts_with(self.0)
        }
    }

    /// Answers every key with a fixed definition, whatever was asked.
    #[derive(Debug)]
    struct Fixed;

    impl AutoProxRule for Fixed {
        fn matches(&self, _key: &StoreKey) -> bool {
            true
        }

        fn create_remote_repository(
            &self,
            _key: &StoreKey,
        ) -> std::result::Result<Option<RemoteRepository>, RuleError> {
            Ok(Some(RemoteRepository::new("maven", "fixed", "http://example.test/")))
        }

        fn create_hosted_repository(
            &self,
            key: &StoreKey,
        ) -> std::result::Result<Option<HostedRepository>, RuleError> {
            Err(RuleError::new(key, "hosted stores are not offered"))
        }

        fn create_group(&self, key: &StoreKey) -> std::result::Result<Option<Group>, RuleError> {
            Ok(Some(Group::new(key.package_type(), key.name(), vec![])))
        }

        fn remote_validation_path(&self) -> Option<String> {
            Some("/ping".to_string())
        }
    }

    fn mapping(name: &str, spec: &str) -> RuleMapping {
        RuleMapping::new(name, spec, Arc::new(Prefix("foo")))
    }

    #[test]
    fn equality_ignores_rule_instance() {
        let a = RuleMapping::new("foo", "spec", Arc::new(Prefix("a")));
        let b = RuleMapping::new("foo", "spec", Arc::new(Prefix("b")));
        assert_eq!(a, b);
        assert_ne!(a, mapping("foo", "other spec"));
    }

    #[test]
    fn default_sorts_last() {
        let mut mappings = vec![
            mapping("default", "x"),
            mapping("zeta", "x"),
            mapping("alpha", "x"),
        ];
        mappings.sort();
        let names: Vec<&str> = mappings.iter().map(RuleMapping::name).collect();
        assert_eq!(names, vec!["alpha", "zeta", "default"]);
    }

    #[test]
    fn digest_is_sha256_hex() {
        let m = mapping("foo", "");
        assert_eq!(
            m.spec_digest(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn matches_delegates_to_rule() {
        let m = mapping("foo", "x");
        assert!(m.matches(&StoreKey::maven(StoreType::Remote, "foo-1")));
        assert!(!m.matches(&StoreKey::maven(StoreType::Remote, "bar-1")));
    }

    #[test]
    fn synthesize_dispatches_on_store_type() {
        let m = RuleMapping::new("fixed", "x", Arc::new(Fixed));
        let group = StoreKey::maven(StoreType::Group, "g");
        assert_eq!(m.synthesize(&group).unwrap().unwrap().key(), &group);

        let err = m.synthesize(&StoreKey::maven(StoreType::Hosted, "h")).unwrap_err();
        assert!(matches!(err, AutoProxError::RuleSynthesis { ref rule, .. } if rule == "fixed"));
    }

    #[test]
    fn synthesize_rejects_foreign_key() {
        let m = RuleMapping::new("fixed", "x", Arc::new(Fixed));
        let err = m
            .synthesize(&StoreKey::maven(StoreType::Remote, "other"))
            .unwrap_err();
        assert!(err.to_string().contains("maven:remote:fixed"));
    }

    #[test]
    fn validation_target_uses_rule_path() {
        let m = RuleMapping::new("fixed", "x", Arc::new(Fixed));
        let (remote, path) = m
            .validation_target(&StoreKey::maven(StoreType::Remote, "fixed"))
            .unwrap()
            .unwrap();
        assert_eq!(remote.url, "http://example.test/");
        assert_eq!(path, "/ping");

        let m = mapping("plain", "x");
        assert_eq!(
            m.validation_target(&StoreKey::maven(StoreType::Remote, "foo")).unwrap(),
            None
        );
    }

    #[test]
    fn dto_serializes_name_and_spec() {
        let dto = CatalogDto {
            enabled: true,
            rules: vec![mapping("foo", "[match]\nany = true\n").to_dto()],
        };
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["enabled"], true);
        assert_eq!(json["rules"][0]["name"], "foo");
        assert_eq!(dto.rule("foo").map(|r| r.spec.as_str()), Some("[match]\nany = true\n"));
    }
}
