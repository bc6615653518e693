//! Provenance tagging for synthesized stores.
//!
//! Back-references only: nothing reads these values to manage a store's
//! lifecycle.

use repo_state::{ArtifactStore, EventMetadata, StoreKey, EVENT_ORIGIN, METADATA_ORIGIN};

/// Value recorded under `origin` for every store AutoProx creates.
pub const AUTOPROX_ORIGIN: &str = "autoprox";

/// Metadata key naming the store whose resolution triggered a creation.
pub const IMPLIED_BY: &str = "implied-by";

/// Stamp store-level provenance on a freshly synthesized definition.
pub fn tag_store(store: &mut ArtifactStore, implied_by: Option<&StoreKey>) {
    store.set_metadata(METADATA_ORIGIN, AUTOPROX_ORIGIN);
    if let Some(trigger) = implied_by {
        store.set_metadata(IMPLIED_BY, trigger.to_string());
    }
}

/// Event metadata carried by the persist call for `key`.
pub fn event_metadata(key: &StoreKey, implied_by: Option<&StoreKey>) -> EventMetadata {
    EventMetadata::new()
        .set(EVENT_ORIGIN, AUTOPROX_ORIGIN)
        .set(IMPLIED_BY, implied_by.unwrap_or(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use repo_state::{RemoteRepository, StoreType};

    #[test]
    fn direct_creation_points_at_itself() {
        let key = StoreKey::maven(StoreType::Remote, "central");
        let meta = event_metadata(&key, None);
        assert_eq!(meta.get(EVENT_ORIGIN), Some("autoprox"));
        assert_eq!(meta.get(IMPLIED_BY), Some("maven:remote:central"));
    }

    #[test]
    fn implied_creation_points_at_trigger() {
        let key = StoreKey::maven(StoreType::Remote, "central");
        let group = StoreKey::maven(StoreType::Group, "public");

        let mut store: ArtifactStore =
            RemoteRepository::new("maven", "central", "http://example.test/").into();
        tag_store(&mut store, Some(&group));

        assert_eq!(store.metadata_value(METADATA_ORIGIN), Some("autoprox"));
        assert_eq!(store.metadata_value(IMPLIED_BY), Some("maven:group:public"));
        assert_eq!(
            event_metadata(&key, Some(&group)).get(IMPLIED_BY),
            Some("maven:group:public")
        );
    }

    #[test]
    fn direct_store_has_no_implied_by_field() {
        let mut store: ArtifactStore =
            RemoteRepository::new("maven", "central", "http://example.test/").into();
        tag_store(&mut store, None);
        assert_eq!(store.metadata_value(IMPLIED_BY), None);
    }
}
