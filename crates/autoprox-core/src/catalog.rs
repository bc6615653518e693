//! The rule catalog: an ordered, file-backed set of named rules.
//!
//! Rules live as one source file per rule under the configured base
//! directory. In memory the catalog keeps an immutable snapshot
//! (`Arc<Vec<RuleMapping>>`) that writers replace wholesale, so readers never
//! observe a half-applied change and never wait on file I/O.
//!
//! Order is `default` last, everything else by name. Replacing a rule keeps
//! its position.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use repo_state::StoreKey;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::AutoProxConfig;
use crate::error::{AutoProxError, Result};
use crate::mapping::{CatalogDto, RuleMapping};
use crate::obs;
use crate::parser::RuleParser;

pub struct AutoProxCatalog {
    config: AutoProxConfig,
    parser: Arc<dyn RuleParser>,
    enabled: AtomicBool,
    rules: RwLock<Arc<Vec<RuleMapping>>>,
    /// Serializes writers; readers only touch `rules`.
    write_lock: Mutex<()>,
}

impl AutoProxCatalog {
    pub fn new(config: AutoProxConfig, parser: Arc<dyn RuleParser>) -> Self {
        Self {
            enabled: AtomicBool::new(config.enabled),
            config,
            parser,
            rules: RwLock::new(Arc::new(Vec::new())),
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &AutoProxConfig {
        &self.config
    }

    pub fn basedir(&self) -> &Path {
        &self.config.basedir
    }

    /// Load rules if enabled. Call once from the composition root.
    pub fn init(&self) -> Result<()> {
        if !self.is_enabled() {
            info!(basedir = %self.basedir().display(), "AutoProx is disabled");
            return Ok(());
        }
        let loaded = self.load_all()?;
        info!(
            basedir = %self.basedir().display(),
            rules = loaded,
            "AutoProx catalog initialised"
        );
        Ok(())
    }

    /// Disable the catalog and drop every rule.
    pub fn close(&self) {
        self.set_enabled(false);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Disabling clears the rule set. Enabling does not reload it.
    pub fn set_enabled(&self, enabled: bool) {
        let _writer = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if !enabled {
            self.swap(Vec::new());
        }
        if was != enabled {
            obs::emit_catalog_toggled(enabled);
        }
    }

    /// Re-read every rule file, replacing the in-memory set.
    ///
    /// A missing directory yields an empty catalog. Files that cannot be read
    /// or parsed are logged and skipped. Returns the number of rules loaded.
    pub fn load_all(&self) -> Result<usize> {
        self.ensure_enabled()?;
        let _span = obs::CatalogSpan::enter(self.basedir());
        let _writer = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ensure_enabled()?;

        let mut mappings = Vec::new();
        let mut skipped = 0;
        for (name, path) in self.rule_files()? {
            let loaded = std::fs::read_to_string(&path)
                .map_err(|e| AutoProxError::io(&path, e))
                .and_then(|spec| Ok(self.parser.parse_mapping(&name, &spec)?));
            match loaded {
                Ok(mapping) => {
                    debug!(rule = %name, spec_digest = %mapping.spec_digest(), "loaded rule");
                    mappings.push(mapping);
                }
                Err(e) => {
                    obs::emit_rule_file_skipped(&path, &e);
                    skipped += 1;
                }
            }
        }

        mappings.sort();
        let count = mappings.len();
        self.swap(mappings);
        obs::emit_catalog_loaded(self.basedir(), count, skipped);
        Ok(count)
    }

    /// First rule in catalog order matching `key`. `None` when disabled.
    pub fn find_match(&self, key: &StoreKey) -> Option<RuleMapping> {
        if !self.is_enabled() {
            return None;
        }
        let found = self
            .snapshot()
            .iter()
            .find(|mapping| mapping.matches(key))
            .cloned();
        match &found {
            Some(mapping) => obs::emit_rule_matched(mapping.name(), key),
            None => debug!(key = %key, "no rule matches"),
        }
        found
    }

    pub fn rule_named(&self, name: &str) -> Option<RuleMapping> {
        if !self.is_enabled() {
            return None;
        }
        self.snapshot().iter().find(|m| m.name() == name).cloned()
    }

    /// Current mappings in catalog order. Empty when disabled.
    pub fn rule_mappings(&self) -> Vec<RuleMapping> {
        if !self.is_enabled() {
            return Vec::new();
        }
        self.snapshot().as_ref().clone()
    }

    pub fn to_dto(&self) -> CatalogDto {
        CatalogDto {
            enabled: self.is_enabled(),
            rules: self
                .rule_mappings()
                .iter()
                .map(RuleMapping::to_dto)
                .collect(),
        }
    }

    /// Add or replace the rule `name`.
    ///
    /// Identical source is a no-op returning the existing mapping. Otherwise
    /// the source file is written first, so a failed write leaves the
    /// catalog untouched.
    pub fn store_rule(&self, name: &str, spec: &str) -> Result<RuleMapping> {
        self.ensure_enabled()?;
        validate_rule_name(name)?;
        let mapping = self.parser.parse_mapping(name, spec)?;

        let _span = obs::CatalogSpan::enter(self.basedir());
        let _writer = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ensure_enabled()?;

        let current = self.snapshot();
        let existing = current.iter().position(|m| m.name() == name);
        if let Some(index) = existing {
            if current[index] == mapping {
                debug!(rule = %name, "rule unchanged");
                return Ok(current[index].clone());
            }
        }

        self.write_rule_file(name, spec)?;

        let mut next = current.as_ref().clone();
        match existing {
            Some(index) => next[index] = mapping.clone(),
            None => {
                next.push(mapping.clone());
                next.sort();
            }
        }
        self.swap(next);
        obs::emit_rule_stored(name, mapping.spec_digest(), existing.is_some());
        Ok(mapping)
    }

    /// Remove the rule `name` and its source file. `Ok(None)` if unknown.
    pub fn remove_rule(&self, name: &str) -> Result<Option<RuleMapping>> {
        self.ensure_enabled()?;
        let _span = obs::CatalogSpan::enter(self.basedir());
        let _writer = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ensure_enabled()?;

        let current = self.snapshot();
        let Some(index) = current.iter().position(|m| m.name() == name) else {
            return Ok(None);
        };

        let path = self.rule_path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(AutoProxError::io(path, e)),
        }

        let mut next = current.as_ref().clone();
        let removed = next.remove(index);
        self.swap(next);
        obs::emit_rule_removed(name);
        Ok(Some(removed))
    }

    /// Where the source of rule `name` lives.
    pub fn rule_path(&self, name: &str) -> PathBuf {
        self.basedir()
            .join(format!("{}.{}", name, self.parser.extension()))
    }

    fn ensure_enabled(&self) -> Result<()> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(AutoProxError::Disabled)
        }
    }

    fn snapshot(&self) -> Arc<Vec<RuleMapping>> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn swap(&self, mappings: Vec<RuleMapping>) {
        *self.rules.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(mappings);
    }

    /// `(rule name, path)` for every rule source file in the base directory.
    fn rule_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let dir = self.basedir();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(basedir = %dir.display(), "rule directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(AutoProxError::io(dir, e)),
        };

        let extension = self.parser.extension();
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| AutoProxError::io(dir, e))?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                files.push((stem.to_string(), path.clone()));
            }
        }
        Ok(files)
    }

    fn write_rule_file(&self, name: &str, spec: &str) -> Result<()> {
        let dir = self.basedir();
        std::fs::create_dir_all(dir).map_err(|e| AutoProxError::io(dir, e))?;

        let path = self.rule_path(name);
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| AutoProxError::io(dir, e))?;
        tmp.write_all(spec.as_bytes())
            .map_err(|e| AutoProxError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| AutoProxError::io(&path, e.error))?;
        Ok(())
    }
}

/// Rule names become file names, so anything that could escape the base
/// directory is refused.
fn validate_rule_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(AutoProxError::InvalidRuleName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };
    if name.trim().is_empty() {
        return invalid("name is empty");
    }
    if name == "." || name == ".." {
        return invalid("name is a relative path component");
    }
    if name.contains(['/', '\\', '\0']) {
        return invalid("name contains a path separator");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template_rule::TomlRuleParser;

    fn catalog(dir: &Path) -> AutoProxCatalog {
        AutoProxCatalog::new(AutoProxConfig::new(dir), Arc::new(TomlRuleParser))
    }

    #[test]
    fn rule_names_that_escape_basedir_are_refused() {
        for name in ["", "  ", ".", "..", "../x", "a/b", "a\\b"] {
            assert!(
                matches!(
                    validate_rule_name(name),
                    Err(AutoProxError::InvalidRuleName { .. })
                ),
                "{:?} should be rejected",
                name
            );
        }
        assert!(validate_rule_name("foo-rules.v2").is_ok());
    }

    #[test]
    fn rule_path_uses_parser_extension() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog(dir.path());
        assert_eq!(catalog.rule_path("foo"), dir.path().join("foo.toml"));
    }

    #[test]
    fn disabled_catalog_reports_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = AutoProxCatalog::new(
            AutoProxConfig {
                enabled: false,
                ..AutoProxConfig::new(dir.path())
            },
            Arc::new(TomlRuleParser),
        );
        assert!(matches!(catalog.load_all(), Err(AutoProxError::Disabled)));
        assert!(catalog.init().is_ok());
        assert!(catalog.to_dto().rules.is_empty());
        assert!(!catalog.to_dto().enabled);
    }
}
