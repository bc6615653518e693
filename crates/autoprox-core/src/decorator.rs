//! On-demand provisioning in front of a store data manager.
//!
//! `AutoProxDataManager` wraps another [`StoreDataManager`]. Lookups that hit
//! the delegate return unchanged; a miss consults the rule catalog, asks the
//! matching rule for a definition, validates it against the remote and
//! persists it through the delegate. Groups resolve their members the same
//! way, dropping members that cannot be provisioned.
//!
//! Creation of a key is serialized by a per-key lock followed by a second
//! delegate lookup, so racing lookups for the same missing key persist once.
//! Group locks are only taken after all members are resolved; a task never
//! holds one key's lock while waiting for another's.
//!
//! Groups implied by other groups are followed at most [`MAX_GROUP_DEPTH`]
//! levels deep. Rules can generate an endless chain of distinct group names,
//! so deeper group members are pruned.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use remote_transfer::{resource_url, TransferManager};
use repo_state::{
    ArtifactStore, ChangeSummary, EventMetadata, StoreDataManager, StoreError, StoreKey,
    StoreResult, StoreType,
};
use tracing::{debug, warn, Instrument};

use crate::catalog::AutoProxCatalog;
use crate::error::Result;
use crate::keyed_lock::KeyedLocks;
use crate::mapping::RuleMapping;
use crate::obs;
use crate::probe::ValidationProbe;
use crate::provenance;

/// Deepest group nesting followed while resolving implied members.
pub const MAX_GROUP_DEPTH: usize = 16;

pub struct AutoProxDataManager {
    delegate: Arc<dyn StoreDataManager>,
    catalog: Arc<AutoProxCatalog>,
    probe: ValidationProbe,
    creation_locks: KeyedLocks<StoreKey>,
}

impl AutoProxDataManager {
    /// Probes are bounded by the catalog's configured validation timeout.
    pub fn new(
        delegate: Arc<dyn StoreDataManager>,
        catalog: Arc<AutoProxCatalog>,
        transfer: Arc<dyn TransferManager>,
    ) -> Self {
        let probe = ValidationProbe::new(transfer, catalog.config().validation_timeout());
        Self::with_probe(delegate, catalog, probe)
    }

    pub fn with_probe(
        delegate: Arc<dyn StoreDataManager>,
        catalog: Arc<AutoProxCatalog>,
        probe: ValidationProbe,
    ) -> Self {
        Self {
            delegate,
            catalog,
            probe,
            creation_locks: KeyedLocks::new(),
        }
    }

    /// Keys whose creation is currently in progress or awaited.
    pub fn pending_creations(&self) -> usize {
        self.creation_locks.len()
    }

    /// Look up `key`, provisioning it from the catalog on a miss.
    ///
    /// `Ok(None)` means not found: no rule matched, the rule offered nothing,
    /// validation failed, or the catalog is disabled.
    pub async fn resolve(&self, key: &StoreKey) -> Result<Option<ArtifactStore>> {
        self.resolve_from(key, None, &[])
            .instrument(obs::provision_span(key))
            .await
    }

    /// Whether `key` exists or can be provisioned. Errors count as absent;
    /// the [`StoreDataManager::has_artifact_store`] impl propagates them instead.
    pub async fn is_available(&self, key: &StoreKey) -> bool {
        match self.resolve(key).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!(key = %key, error = %e, "lookup failed");
                false
            }
        }
    }

    /// Provision `group` if needed, then list its concrete members.
    pub async fn ordered_concrete_stores_in_group(
        &self,
        group: &StoreKey,
        enabled_only: bool,
    ) -> Result<Vec<ArtifactStore>> {
        self.resolve(group).await?;
        Ok(self
            .delegate
            .ordered_concrete_stores_in_group(group, enabled_only)
            .await?)
    }

    /// `chain` holds the groups currently being resolved above `key`.
    fn resolve_from<'a>(
        &'a self,
        key: &'a StoreKey,
        implied_by: Option<&'a StoreKey>,
        chain: &'a [StoreKey],
    ) -> BoxFuture<'a, Result<Option<ArtifactStore>>> {
        async move {
            if let Some(existing) = self.delegate.get_artifact_store(key).await? {
                return Ok(Some(existing));
            }
            if !self.catalog.is_enabled() {
                return Ok(None);
            }
            match key.store_type() {
                StoreType::Group => self.provision_group(key, implied_by, chain).await,
                StoreType::Remote | StoreType::Hosted => {
                    self.provision_repository(key, implied_by).await
                }
            }
        }
        .boxed()
    }

    async fn provision_repository(
        &self,
        key: &StoreKey,
        implied_by: Option<&StoreKey>,
    ) -> Result<Option<ArtifactStore>> {
        let _creating = self.creation_locks.lock(key).await;
        if let Some(existing) = self.delegate.get_artifact_store(key).await? {
            debug!(key = %key, "created concurrently");
            return Ok(Some(existing));
        }

        let Some(mapping) = self.catalog.find_match(key) else {
            return Ok(None);
        };
        let Some(store) = mapping.synthesize(key)? else {
            debug!(key = %key, rule = %mapping.name(), "rule offers no definition");
            return Ok(None);
        };
        if key.store_type() == StoreType::Remote && !self.validate(&mapping, key).await? {
            return Ok(None);
        }

        self.persist(&mapping, store, implied_by).await.map(Some)
    }

    async fn provision_group(
        &self,
        key: &StoreKey,
        implied_by: Option<&StoreKey>,
        chain: &[StoreKey],
    ) -> Result<Option<ArtifactStore>> {
        let Some(mapping) = self.catalog.find_match(key) else {
            return Ok(None);
        };
        if !self.validate(&mapping, key).await? {
            return Ok(None);
        }
        let Some(ArtifactStore::Group(mut group)) = mapping.synthesize(key)? else {
            debug!(key = %key, rule = %mapping.name(), "rule offers no definition");
            return Ok(None);
        };

        let trigger = implied_by.unwrap_or(key);
        let mut below = chain.to_vec();
        below.push(key.clone());

        let members = std::mem::take(&mut group.constituents);
        for member in members {
            if below.contains(&member) {
                debug!(group = %key, member = %member, "pruned cyclic member");
                continue;
            }
            if group.constituents.contains(&member) {
                continue;
            }
            if member.store_type() == StoreType::Group && below.len() >= MAX_GROUP_DEPTH {
                obs::emit_group_depth_exceeded(key, &member, MAX_GROUP_DEPTH);
                continue;
            }
            match self.resolve_from(&member, Some(trigger), &below).await? {
                Some(_) => group.constituents.push(member),
                None => debug!(group = %key, member = %member, "pruned unresolved member"),
            }
        }

        if group.constituents.is_empty() {
            debug!(key = %key, "no members resolved, group not created");
            return Ok(None);
        }

        let _creating = self.creation_locks.lock(key).await;
        if let Some(existing) = self.delegate.get_artifact_store(key).await? {
            debug!(key = %key, "created concurrently");
            return Ok(Some(existing));
        }
        self.persist(&mapping, group.into(), implied_by)
            .await
            .map(Some)
    }

    async fn validate(&self, mapping: &RuleMapping, key: &StoreKey) -> Result<bool> {
        let Some((remote, path)) = mapping.validation_target(key)? else {
            return Ok(true);
        };
        if self.probe.exists(&remote, &path).await {
            return Ok(true);
        }
        obs::emit_validation_failed(key, mapping.name(), &resource_url(&remote.url, &path));
        Ok(false)
    }

    async fn persist(
        &self,
        mapping: &RuleMapping,
        mut store: ArtifactStore,
        implied_by: Option<&StoreKey>,
    ) -> Result<ArtifactStore> {
        let key = store.key().clone();
        provenance::tag_store(&mut store, implied_by);

        let summary = ChangeSummary::system(format!(
            "AUTOPROX: Creating {} for: '{}'",
            describe(key.store_type()),
            key
        ));
        let metadata = provenance::event_metadata(&key, implied_by);
        self.delegate
            .store_artifact_store(&store, &summary, &metadata)
            .await?;

        obs::emit_store_provisioned(&key, mapping.name(), implied_by);
        Ok(store)
    }
}

fn describe(store_type: StoreType) -> &'static str {
    match store_type {
        StoreType::Remote => "remote repository",
        StoreType::Hosted => "hosted repository",
        StoreType::Group => "repository group",
    }
}

/// Lookups provision; writes, deletes and listings go straight through.
#[async_trait]
impl StoreDataManager for AutoProxDataManager {
    async fn get_artifact_store(&self, key: &StoreKey) -> StoreResult<Option<ArtifactStore>> {
        Ok(self.resolve(key).await?)
    }

    async fn store_artifact_store(
        &self,
        store: &ArtifactStore,
        summary: &ChangeSummary,
        metadata: &EventMetadata,
    ) -> StoreResult<bool> {
        self.delegate
            .store_artifact_store(store, summary, metadata)
            .await
    }

    async fn delete_artifact_store(
        &self,
        key: &StoreKey,
        summary: &ChangeSummary,
        metadata: &EventMetadata,
    ) -> StoreResult<()> {
        self.delegate
            .delete_artifact_store(key, summary, metadata)
            .await
    }

    async fn all_artifact_stores(&self) -> StoreResult<Vec<ArtifactStore>> {
        self.delegate.all_artifact_stores().await
    }

    async fn ordered_concrete_stores_in_group(
        &self,
        group: &StoreKey,
        enabled_only: bool,
    ) -> StoreResult<Vec<ArtifactStore>> {
        AutoProxDataManager::ordered_concrete_stores_in_group(self, group, enabled_only)
            .await
            .map_err(StoreError::from)
    }

    async fn has_artifact_store(&self, key: &StoreKey) -> StoreResult<bool> {
        Ok(self.resolve(key).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summaries_name_the_store_kind() {
        assert_eq!(describe(StoreType::Remote), "remote repository");
        assert_eq!(describe(StoreType::Group), "repository group");
    }
}
