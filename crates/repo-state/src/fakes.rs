//! In-memory store data manager (testing and single-process deployments)
//!
//! `MemoryStoreDataManager` satisfies the `StoreDataManager` contract without
//! any external dependencies and keeps a change log so callers can audit
//! exactly which persist calls happened, and with what event metadata.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::error::StoreError;
use crate::model::{ArtifactStore, StoreKey};
use crate::storage_traits::*;

/// What a recorded change did to the store table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Unchanged,
    Deleted,
}

/// One entry of the in-memory change log.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub key: StoreKey,
    pub kind: ChangeKind,
    pub summary: ChangeSummary,
    pub metadata: EventMetadata,
}

/// In-memory data manager backed by a `BTreeMap<StoreKey, ArtifactStore>`.
#[derive(Debug, Default)]
pub struct MemoryStoreDataManager {
    stores: Mutex<BTreeMap<StoreKey, ArtifactStore>>,
    changes: Mutex<Vec<ChangeRecord>>,
    rejected: Mutex<HashSet<StoreKey>>,
    persist_calls: AtomicUsize,
}

impl MemoryStoreDataManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with definitions, bypassing the change log.
    pub fn with_stores(stores: impl IntoIterator<Item = ArtifactStore>) -> Self {
        let manager = Self::new();
        {
            let mut table = manager.stores.lock().unwrap();
            for store in stores {
                table.insert(store.key().clone(), store);
            }
        }
        manager
    }

    /// Make every future persist of `key` fail with `StoreError::Rejected`.
    pub fn reject(&self, key: StoreKey) {
        self.rejected.lock().unwrap().insert(key);
    }

    /// Number of `store_artifact_store` invocations, successful or not.
    pub fn persist_calls(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of the change log, oldest first.
    pub fn changes(&self) -> Vec<ChangeRecord> {
        self.changes.lock().unwrap().clone()
    }

    /// Change log entries for one key.
    pub fn changes_for(&self, key: &StoreKey) -> Vec<ChangeRecord> {
        self.changes()
            .into_iter()
            .filter(|c| &c.key == key)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stores.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(
        &self,
        key: &StoreKey,
        kind: ChangeKind,
        summary: &ChangeSummary,
        metadata: &EventMetadata,
    ) {
        self.changes.lock().unwrap().push(ChangeRecord {
            key: key.clone(),
            kind,
            summary: summary.clone(),
            metadata: metadata.clone(),
        });
    }
}

#[async_trait]
impl StoreDataManager for MemoryStoreDataManager {
    async fn get_artifact_store(&self, key: &StoreKey) -> StoreResult<Option<ArtifactStore>> {
        let stores = self.stores.lock().unwrap();
        Ok(stores.get(key).cloned())
    }

    async fn store_artifact_store(
        &self,
        store: &ArtifactStore,
        summary: &ChangeSummary,
        metadata: &EventMetadata,
    ) -> StoreResult<bool> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        let key = store.key().clone();

        if self.rejected.lock().unwrap().contains(&key) {
            return Err(StoreError::Rejected {
                key: key.to_string(),
                reason: "persist refused by backend".to_string(),
            });
        }

        let kind = {
            let mut stores = self.stores.lock().unwrap();
            match stores.get(&key) {
                Some(existing) if existing == store => ChangeKind::Unchanged,
                Some(_) => {
                    stores.insert(key.clone(), store.clone());
                    ChangeKind::Updated
                }
                None => {
                    stores.insert(key.clone(), store.clone());
                    ChangeKind::Created
                }
            }
        };

        debug!(key = %key, ?kind, summary = %summary.summary, "store persisted");
        self.record(&key, kind, summary, metadata);
        Ok(kind != ChangeKind::Unchanged)
    }

    async fn delete_artifact_store(
        &self,
        key: &StoreKey,
        summary: &ChangeSummary,
        metadata: &EventMetadata,
    ) -> StoreResult<()> {
        let removed = self.stores.lock().unwrap().remove(key).is_some();
        if removed {
            self.record(key, ChangeKind::Deleted, summary, metadata);
        }
        Ok(())
    }

    async fn all_artifact_stores(&self) -> StoreResult<Vec<ArtifactStore>> {
        let stores = self.stores.lock().unwrap();
        Ok(stores.values().cloned().collect())
    }

    async fn ordered_concrete_stores_in_group(
        &self,
        group: &StoreKey,
        enabled_only: bool,
    ) -> StoreResult<Vec<ArtifactStore>> {
        flatten_group(self, group, enabled_only).await
    }
}
