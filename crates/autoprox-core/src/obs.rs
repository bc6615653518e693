//! Structured observability hooks for catalog and provisioning events.
//!
//! This module provides:
//! - A catalog-scoped span via the `CatalogSpan` RAII guard
//! - A per-key provisioning span for instrumenting async resolution
//! - Emission functions for rule lifecycle and provisioning outcomes
//!
//! Events carry an `event` field (`store.provisioned`, `rule.matched`, ...)
//! so JSON output can be filtered without parsing messages.

use std::fmt::Display;
use std::path::Path;

use repo_state::StoreKey;
use tracing::{info, warn};

/// RAII guard that enters a catalog-scoped span while rules load or change.
///
/// Only for synchronous sections; async code should use [`provision_span`].
pub struct CatalogSpan {
    _span: tracing::span::EnteredSpan,
}

impl CatalogSpan {
    pub fn enter(basedir: &Path) -> Self {
        let span = tracing::info_span!("autoprox.catalog", basedir = %basedir.display());
        Self {
            _span: span.entered(),
        }
    }
}

/// Span tagging everything logged while `key` is being resolved.
pub fn provision_span(key: &StoreKey) -> tracing::Span {
    tracing::info_span!("autoprox.provision", key = %key)
}

/// Emit event: rule directory scanned.
pub fn emit_catalog_loaded(basedir: &Path, rules: usize, skipped: usize) {
    info!(
        event = "catalog.loaded",
        basedir = %basedir.display(),
        rules = rules,
        skipped = skipped,
    );
}

/// Emit event: a rule file could not be read or parsed and was left out.
pub fn emit_rule_file_skipped(path: &Path, error: &dyn Display) {
    warn!(event = "catalog.rule_skipped", path = %path.display(), error = %error);
}

/// Emit event: a rule was written to the catalog.
pub fn emit_rule_stored(name: &str, spec_digest: &str, replaced: bool) {
    info!(
        event = "rule.stored",
        rule = %name,
        spec_digest = %spec_digest,
        replaced = replaced,
    );
}

/// Emit event: a rule was removed from the catalog.
pub fn emit_rule_removed(name: &str) {
    info!(event = "rule.removed", rule = %name);
}

/// Emit event: the catalog was switched on or off.
pub fn emit_catalog_toggled(enabled: bool) {
    info!(event = "catalog.toggled", enabled = enabled);
}

/// Emit event: a rule was selected for a key.
pub fn emit_rule_matched(rule: &str, key: &StoreKey) {
    info!(event = "rule.matched", rule = %rule, key = %key);
}

/// Emit event: a synthesized store was persisted.
pub fn emit_store_provisioned(key: &StoreKey, rule: &str, implied_by: Option<&StoreKey>) {
    match implied_by {
        Some(trigger) => info!(
            event = "store.provisioned",
            key = %key,
            rule = %rule,
            implied_by = %trigger,
        ),
        None => info!(event = "store.provisioned", key = %key, rule = %rule),
    }
}

/// Emit event: a synthesized store failed validation and was discarded.
pub fn emit_validation_failed(key: &StoreKey, rule: &str, url: &str) {
    warn!(event = "store.validation_failed", key = %key, rule = %rule, url = %url);
}

/// Emit event: a group member was dropped for nesting too deep (warning level).
pub fn emit_group_depth_exceeded(group: &StoreKey, member: &StoreKey, max_depth: usize) {
    warn!(
        event = "group.depth_exceeded",
        group = %group,
        member = %member,
        max_depth = max_depth,
    );
}

/// Emit event: a validation probe errored or timed out (warning level).
pub fn emit_probe_failed(url: &str, error: &dyn Display) {
    warn!(event = "probe.failed", url = %url, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use repo_state::StoreType;

    #[test]
    fn test_catalog_span_create() {
        let _span = CatalogSpan::enter(Path::new("/tmp/rules"));
    }

    #[test]
    fn test_emitters_do_not_panic() {
        let key = StoreKey::maven(StoreType::Remote, "central");
        let trigger = StoreKey::maven(StoreType::Group, "public");
        let _guard = provision_span(&key).entered();
        emit_rule_matched("default", &key);
        emit_store_provisioned(&key, "default", Some(&trigger));
        emit_store_provisioned(&key, "default", None);
        emit_validation_failed(&key, "default", "http://example.test/");
        emit_probe_failed("http://example.test/", &"timed out");
        emit_group_depth_exceeded(&trigger, &key, 16);
    }
}
