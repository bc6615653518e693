//! Dry-run provisioning.
//!
//! Reports what resolving a key would create without probing remotes or
//! writing anything.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use repo_state::{ArtifactStore, Group, StoreDataManager, StoreKey, StoreType};
use serde::Serialize;
use tracing::debug;

use crate::catalog::AutoProxCatalog;
use crate::decorator::MAX_GROUP_DEPTH;
use crate::error::{AutoProxError, Result};
use crate::obs;
use crate::provenance;

/// What provisioning a key would produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalculationResult {
    /// The definition for the requested key, provenance included.
    pub store: ArtifactStore,
    /// Group members that do not exist yet and would be created alongside,
    /// members before the groups containing them.
    pub supplemental_stores: Vec<ArtifactStore>,
    pub rule_name: String,
}

pub struct AutoProxCalculator {
    delegate: Arc<dyn StoreDataManager>,
    catalog: Arc<AutoProxCatalog>,
}

impl AutoProxCalculator {
    pub fn new(delegate: Arc<dyn StoreDataManager>, catalog: Arc<AutoProxCatalog>) -> Self {
        Self { delegate, catalog }
    }

    /// `Ok(None)` when `key` already exists or nothing would be created.
    pub async fn evaluate(&self, key: &StoreKey) -> Result<Option<CalculationResult>> {
        if !self.catalog.is_enabled() {
            return Err(AutoProxError::Disabled);
        }
        if self.delegate.get_artifact_store(key).await?.is_some() {
            debug!(key = %key, "already exists");
            return Ok(None);
        }
        let Some(mapping) = self.catalog.find_match(key) else {
            return Ok(None);
        };
        let Some(mut store) = mapping.synthesize(key)? else {
            return Ok(None);
        };
        provenance::tag_store(&mut store, None);

        let mut supplemental_stores = Vec::new();
        if let ArtifactStore::Group(group) = &mut store {
            let chain = vec![key.clone()];
            self.plan_members(group, key, &chain, &mut supplemental_stores)
                .await?;
            if group.constituents.is_empty() {
                return Ok(None);
            }
        }

        Ok(Some(CalculationResult {
            store,
            supplemental_stores,
            rule_name: mapping.name().to_string(),
        }))
    }

    /// Keep members that exist or would be created; record the latter.
    fn plan_members<'a>(
        &'a self,
        group: &'a mut Group,
        trigger: &'a StoreKey,
        chain: &'a [StoreKey],
        planned: &'a mut Vec<ArtifactStore>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let members = std::mem::take(&mut group.constituents);
            for member in members {
                if chain.contains(&member) || group.constituents.contains(&member) {
                    continue;
                }
                if member.store_type() == StoreType::Group && chain.len() >= MAX_GROUP_DEPTH {
                    if let Some(parent) = chain.last() {
                        obs::emit_group_depth_exceeded(parent, &member, MAX_GROUP_DEPTH);
                    }
                    continue;
                }
                let keep = planned.iter().any(|s| s.key() == &member)
                    || self.delegate.get_artifact_store(&member).await?.is_some()
                    || self.plan_missing(&member, trigger, chain, planned).await?;
                if keep {
                    group.constituents.push(member);
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn plan_missing(
        &self,
        member: &StoreKey,
        trigger: &StoreKey,
        chain: &[StoreKey],
        planned: &mut Vec<ArtifactStore>,
    ) -> Result<bool> {
        let Some(mapping) = self.catalog.find_match(member) else {
            return Ok(false);
        };
        let Some(mut store) = mapping.synthesize(member)? else {
            return Ok(false);
        };
        provenance::tag_store(&mut store, Some(trigger));

        if let ArtifactStore::Group(nested) = &mut store {
            let mut below = chain.to_vec();
            below.push(member.clone());
            self.plan_members(nested, trigger, &below, planned).await?;
            if nested.constituents.is_empty() {
                return Ok(false);
            }
        }
        planned.push(store);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutoProxConfig;
    use crate::template_rule::TomlRuleParser;
    use repo_state::fakes::MemoryStoreDataManager;

    #[tokio::test]
    async fn disabled_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = AutoProxConfig {
            enabled: false,
            ..AutoProxConfig::new(dir.path())
        };
        let catalog = Arc::new(AutoProxCatalog::new(config, Arc::new(TomlRuleParser)));
        let calc = AutoProxCalculator::new(Arc::new(MemoryStoreDataManager::new()), catalog);

        let key = StoreKey::maven(StoreType::Remote, "x");
        assert!(matches!(
            calc.evaluate(&key).await,
            Err(AutoProxError::Disabled)
        ));
    }
}
