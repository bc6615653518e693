//! Storage trait definitions for AutoProx
//!
//! `StoreDataManager` is the contract of the component that owns persisted
//! repository definitions. AutoProx only consumes it: lookups never
//! synthesize, and `store_artifact_store` must treat re-persisting identical
//! content as a safe, detectable no-op.
//!
//! An in-memory implementation is provided via the `fakes` module.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{ArtifactStore, StoreKey};

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Event metadata key naming the subsystem that triggered a change.
pub const EVENT_ORIGIN: &str = "origin";

// ---------------------------------------------------------------------------
// Change descriptions
// ---------------------------------------------------------------------------

/// Who changed a store, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub user: String,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

impl ChangeSummary {
    pub const SYSTEM_USER: &'static str = "system";

    pub fn new(user: &str, summary: impl Into<String>) -> Self {
        Self {
            user: user.to_string(),
            summary: summary.into(),
            timestamp: Utc::now(),
        }
    }

    /// Change attributed to the server itself rather than a user.
    pub fn system(summary: impl Into<String>) -> Self {
        Self::new(Self::SYSTEM_USER, summary)
    }
}

/// Opaque key/value pairs passed through to the data manager's change log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata(BTreeMap<String, String>);

impl EventMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn set(mut self, name: &str, value: impl ToString) -> Self {
        self.0.insert(name.to_string(), value.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// StoreDataManager
// ---------------------------------------------------------------------------

/// Persistent home of repository definitions.
///
/// Guarantees expected of implementations:
/// - `get_artifact_store` never synthesizes anything.
/// - `store_artifact_store` with content identical to what is stored is a
///   no-op returning `Ok(false)`; any real write returns `Ok(true)`.
/// - `metadata` is recorded unmodified alongside the change.
#[async_trait]
pub trait StoreDataManager: Send + Sync {
    /// Look up a definition. `Ok(None)` when absent.
    async fn get_artifact_store(&self, key: &StoreKey) -> StoreResult<Option<ArtifactStore>>;

    /// Persist a definition, returning whether anything changed.
    async fn store_artifact_store(
        &self,
        store: &ArtifactStore,
        summary: &ChangeSummary,
        metadata: &EventMetadata,
    ) -> StoreResult<bool>;

    /// Delete a definition. No-op if absent.
    async fn delete_artifact_store(
        &self,
        key: &StoreKey,
        summary: &ChangeSummary,
        metadata: &EventMetadata,
    ) -> StoreResult<()>;

    /// Every stored definition, ordered by key.
    async fn all_artifact_stores(&self) -> StoreResult<Vec<ArtifactStore>>;

    /// Concrete (remote/hosted) stores reachable from a group, depth-first in
    /// membership order, each listed once.
    async fn ordered_concrete_stores_in_group(
        &self,
        group: &StoreKey,
        enabled_only: bool,
    ) -> StoreResult<Vec<ArtifactStore>>;

    async fn has_artifact_store(&self, key: &StoreKey) -> StoreResult<bool> {
        Ok(self.get_artifact_store(key).await?.is_some())
    }
}

/// Walk a group's membership depth-first using `manager` for lookups.
///
/// Dangling members and repeated visits are skipped; disabled stores (and
/// everything below a disabled group) are skipped when `enabled_only` is set.
pub async fn flatten_group<M>(
    manager: &M,
    group: &StoreKey,
    enabled_only: bool,
) -> StoreResult<Vec<ArtifactStore>>
where
    M: StoreDataManager + ?Sized,
{
    let mut concrete = Vec::new();
    let root = match manager.get_artifact_store(group).await? {
        Some(ArtifactStore::Group(g)) if !(enabled_only && g.disabled) => g,
        _ => return Ok(concrete),
    };

    let mut seen: HashSet<StoreKey> = HashSet::new();
    seen.insert(root.key.clone());
    let mut pending: Vec<StoreKey> = root.constituents.iter().rev().cloned().collect();

    while let Some(key) = pending.pop() {
        if !seen.insert(key.clone()) {
            continue;
        }
        let Some(store) = manager.get_artifact_store(&key).await? else {
            continue;
        };
        if enabled_only && store.is_disabled() {
            continue;
        }
        match store {
            ArtifactStore::Group(g) => pending.extend(g.constituents.iter().rev().cloned()),
            other => concrete.push(other),
        }
    }

    Ok(concrete)
}
