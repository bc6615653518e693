use std::sync::Arc;
use std::time::Duration;

use autoprox_core::{AutoProxCatalog, AutoProxConfig, AutoProxDataManager, TomlRuleParser};
use futures::future::join_all;
use remote_transfer::fakes::{ProbeOutcome, StaticTransferManager};
use repo_state::fakes::{ChangeKind, MemoryStoreDataManager};
use repo_state::{StoreKey, StoreType};
use tempfile::TempDir;

const MIRROR_RULE: &str = r#"
[match]
pattern = "mirror-*"

[remote]
url = "http://example.test/{1}"

[validation]
path = "/health"
"#;

const GROUP_RULE: &str = r#"
[match]
pattern = "public"

[group]
constituents = ["remote:mirror-a", "remote:mirror-b"]
"#;

fn setup(delay: Duration) -> (TempDir, Arc<MemoryStoreDataManager>, Arc<AutoProxDataManager>) {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(AutoProxCatalog::new(
        AutoProxConfig::new(dir.path()),
        Arc::new(TomlRuleParser),
    ));
    catalog.store_rule("mirror", MIRROR_RULE).unwrap();
    catalog.store_rule("public", GROUP_RULE).unwrap();

    let store = Arc::new(MemoryStoreDataManager::new());
    let transfer =
        Arc::new(StaticTransferManager::new(ProbeOutcome::Exists).with_delay(delay));
    let manager = Arc::new(AutoProxDataManager::new(
        store.clone(),
        catalog,
        transfer,
    ));
    (dir, store, manager)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_lookups_persist_once() {
    let (_dir, store, manager) = setup(Duration::from_millis(20));
    let key = StoreKey::maven(StoreType::Remote, "mirror-central");

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            let key = key.clone();
            tokio::spawn(async move { manager.resolve(&key).await })
        })
        .collect();
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().unwrap())
        .collect();

    // 1. Every caller sees the same definition
    assert!(results.iter().all(|store| store == &results[0]));

    // 2. Exactly one persist, recorded as a creation
    assert_eq!(store.persist_calls(), 1);
    let changes = store.changes_for(&key);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::Created);

    // 3. The lock table drains
    assert_eq!(manager.pending_creations(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_group_lookups_create_each_store_once() {
    let (_dir, store, manager) = setup(Duration::from_millis(10));
    let key = StoreKey::maven(StoreType::Group, "public");

    let results = join_all((0..6).map(|_| {
        let manager = manager.clone();
        let key = key.clone();
        async move { manager.resolve(&key).await }
    }))
    .await;

    for result in results {
        let group = result.unwrap().unwrap();
        assert_eq!(group.as_group().unwrap().constituents.len(), 2);
    }
    assert_eq!(store.len(), 3);
    assert_eq!(store.persist_calls(), 3);
    assert_eq!(manager.pending_creations(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_different_keys_do_not_serialize() {
    let (_dir, store, manager) = setup(Duration::from_millis(200));
    let started = tokio::time::Instant::now();

    let results = join_all((0..5).map(|i| {
        let manager = manager.clone();
        async move {
            let key = StoreKey::maven(StoreType::Remote, format!("mirror-{}", i));
            manager.resolve(&key).await
        }
    }))
    .await;

    assert!(results.iter().all(|r| matches!(r, Ok(Some(_)))));
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(store.persist_calls(), 5);
}
