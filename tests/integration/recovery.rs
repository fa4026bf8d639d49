//! Recovery and persistence-synchronization tests.
//!
//! The file store must always mirror the live working set, and a fresh
//! engine pointed at an existing store must pick up where the previous one
//! left off.

use overdue::testing::{wait_until, TestContract};
use overdue::{ContractId, Engine, EngineConfig, FileStore, Store};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn config(workers: usize) -> EngineConfig {
    EngineConfig::default()
        .with_workers(workers)
        .with_heartbeat(Duration::from_millis(10))
}

fn file_store(dir: &tempfile::TempDir) -> Arc<FileStore<TestContract>> {
    Arc::new(FileStore::new(dir.path().join("contracts.json")))
}

#[tokio::test]
async fn test_store_mirrors_live_working_set() {
    let dir = tempdir().unwrap();
    let store = file_store(&dir);

    let engine: Engine<TestContract> = Engine::new(
        config(2),
        Some(store.clone() as Arc<dyn Store<TestContract>>),
    )
    .await
    .unwrap();
    engine.start().await.unwrap();

    engine
        .enqueue(TestContract::expiring_in("pending", Duration::from_secs(60)))
        .await
        .unwrap();
    engine.enqueue(TestContract::expired("finished")).await.unwrap();

    // once "finished" completes, the store must contain exactly "pending"
    wait_until(Duration::from_secs(1), || {
        let engine = &engine;
        async move { engine.active_count().await.unwrap() == 1 }
    })
    .await;

    let persisted = store.load().await.unwrap();
    assert_eq!(persisted.len(), 1);
    assert!(persisted.contains_key(&ContractId::new("pending")));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_restart_recovers_persisted_contracts() {
    let dir = tempdir().unwrap();

    // first engine: persist a far-future contract, then shut down
    {
        let store = file_store(&dir);
        let engine: Engine<TestContract> = Engine::new(
            config(2),
            Some(store as Arc<dyn Store<TestContract>>),
        )
        .await
        .unwrap();
        engine.start().await.unwrap();

        engine
            .enqueue(TestContract::expiring_in("survivor", Duration::from_secs(60)))
            .await
            .unwrap();
        engine.shutdown().await.unwrap();
    }

    // second engine on the same file: the contract is active again
    let store = file_store(&dir);
    let engine: Engine<TestContract> = Engine::new(
        config(2),
        Some(store as Arc<dyn Store<TestContract>>),
    )
    .await
    .unwrap();
    engine.start().await.unwrap();

    wait_until(Duration::from_secs(1), || {
        let engine = &engine;
        async move { engine.is_active("survivor").await.unwrap() }
    })
    .await;

    // the recovered identifier is protected against duplicate enqueue
    let result = engine
        .enqueue(TestContract::expiring_in("survivor", Duration::from_secs(60)))
        .await;
    assert!(matches!(
        result,
        Err(overdue::EngineError::DuplicateContract(_))
    ));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_recovered_expired_contract_fires_and_clears_store() {
    let dir = tempdir().unwrap();

    // simulate a crash: the store still holds an already-expired contract
    {
        let store = file_store(&dir);
        store.enqueue(&TestContract::expired("leftover")).await.unwrap();
    }

    let store = file_store(&dir);
    let engine: Engine<TestContract> = Engine::new(
        config(1),
        Some(store.clone() as Arc<dyn Store<TestContract>>),
    )
    .await
    .unwrap();
    engine.start().await.unwrap();

    // the leftover contract fires and the store ends up empty
    wait_until(Duration::from_secs(2), || {
        let engine = &engine;
        async move { engine.active_count().await.unwrap() == 0 }
    })
    .await;

    wait_until(Duration::from_secs(1), || {
        let store = &store;
        async move { store.load().await.unwrap().is_empty() }
    })
    .await;

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_pruned_recovered_contract_leaves_store_empty() {
    let dir = tempdir().unwrap();

    {
        let store = file_store(&dir);
        store
            .enqueue(&TestContract::expiring_in("regret", Duration::from_secs(60)))
            .await
            .unwrap();
    }

    let store = file_store(&dir);
    let engine: Engine<TestContract> = Engine::new(
        config(1),
        Some(store.clone() as Arc<dyn Store<TestContract>>),
    )
    .await
    .unwrap();
    engine.start().await.unwrap();

    wait_until(Duration::from_secs(1), || {
        let engine = &engine;
        async move { engine.is_active("regret").await.unwrap() }
    })
    .await;

    engine.prune("regret").await.unwrap();

    wait_until(Duration::from_secs(1), || {
        let engine = &engine;
        async move { engine.active_count().await.unwrap() == 0 }
    })
    .await;
    wait_until(Duration::from_secs(1), || {
        let store = &store;
        async move { store.load().await.unwrap().is_empty() }
    })
    .await;

    engine.shutdown().await.unwrap();
}
