//! Pruning tests.
//!
//! A prune must suppress the timeout action whether it lands before the
//! contract reaches a worker, while a worker is watching it, or after the
//! contract already completed.

use overdue::testing::{wait_until, TestContract};
use overdue::{Engine, EngineConfig, Event, EventBus};
use std::time::Duration;

use crate::common::RecordingHandler;

fn config(workers: usize) -> EngineConfig {
    EngineConfig::default()
        .with_workers(workers)
        .with_heartbeat(Duration::from_millis(10))
}

#[tokio::test]
async fn test_prune_before_dispatch_never_fires() {
    let event_bus = EventBus::new();
    let handler = RecordingHandler::new();
    event_bus.register(handler.clone()).await;

    // a single worker pinned to a far-future contract keeps the queue backed up
    let engine = Engine::new(config(1), None)
        .await
        .unwrap()
        .with_event_bus(event_bus);
    engine.start().await.unwrap();

    let blocker = TestContract::expiring_in("blocker", Duration::from_secs(60));
    engine.enqueue(blocker).await.unwrap();

    wait_until(Duration::from_secs(1), || {
        let handler = &handler;
        async move { handler.dispatched_ids().await == vec!["blocker".to_string()] }
    })
    .await;

    let queued = TestContract::expired("queued");
    let probe = queued.clone();
    engine.enqueue(queued).await.unwrap();
    engine.prune("queued").await.unwrap();

    // release the worker so the loop reaches the queued contract
    engine.prune("blocker").await.unwrap();

    wait_until(Duration::from_secs(1), || {
        let engine = &engine;
        async move { engine.active_count().await.unwrap() == 0 }
    })
    .await;

    assert_eq!(probe.fired_count(), 0);
    let events = handler.events().await;
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ContractDropped { id, .. } if id.as_str() == "queued")));
    // the queued contract never reached a worker
    assert_eq!(handler.dispatched_ids().await, vec!["blocker".to_string()]);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_prune_mid_watch_cancels_at_next_tick() {
    let event_bus = EventBus::new();
    let handler = RecordingHandler::new();
    event_bus.register(handler.clone()).await;

    let engine = Engine::new(config(2), None)
        .await
        .unwrap()
        .with_event_bus(event_bus);
    engine.start().await.unwrap();

    let contract = TestContract::expiring_in("watched", Duration::from_millis(500));
    let probe = contract.clone();
    engine.enqueue(contract).await.unwrap();

    wait_until(Duration::from_secs(1), || {
        let handler = &handler;
        async move { !handler.dispatched_ids().await.is_empty() }
    })
    .await;

    engine.prune("watched").await.unwrap();

    wait_until(Duration::from_secs(1), || {
        let engine = &engine;
        async move {
            !engine.is_active("watched").await.unwrap()
                && engine.idle_workers().await.unwrap() == 2
        }
    })
    .await;

    // outlive the original deadline; the action must stay suppressed
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(probe.fired_count(), 0);

    let events = handler.events().await;
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ContractPruned { id, .. } if id.as_str() == "watched")));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_prunes_of_distinct_ids_commute() {
    let engine = Engine::new(config(2), None).await.unwrap();
    engine.start().await.unwrap();

    let one = TestContract::expiring_in("one", Duration::from_secs(60));
    let two = TestContract::expiring_in("two", Duration::from_secs(60));
    let one_probe = one.clone();
    let two_probe = two.clone();

    engine.enqueue(one).await.unwrap();
    engine.enqueue(two).await.unwrap();

    // prune concurrently from two tasks
    let (r1, r2) = tokio::join!(engine.prune("two"), engine.prune("one"));
    r1.unwrap();
    r2.unwrap();

    wait_until(Duration::from_secs(1), || {
        let engine = &engine;
        async move { engine.active_count().await.unwrap() == 0 }
    })
    .await;

    assert_eq!(one_probe.fired_count(), 0);
    assert_eq!(two_probe.fired_count(), 0);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_prune_after_completion_is_harmless() {
    let engine = Engine::new(config(1), None).await.unwrap();
    engine.start().await.unwrap();

    let contract = TestContract::expired("done");
    let probe = contract.clone();
    engine.enqueue(contract).await.unwrap();

    probe.wait_until_fired(Duration::from_secs(1)).await;
    wait_until(Duration::from_secs(1), || {
        let engine = &engine;
        async move { engine.active_count().await.unwrap() == 0 }
    })
    .await;

    engine.prune("done").await.unwrap();

    // the identifier is free again: a new contract under the same id runs
    let reborn = TestContract::expired("done");
    let reborn_probe = reborn.clone();
    engine.enqueue(reborn).await.unwrap();

    reborn_probe.wait_until_fired(Duration::from_secs(1)).await;
    assert_eq!(reborn_probe.fired_count(), 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_identifier_reusable_after_prune() {
    let engine = Engine::new(config(1), None).await.unwrap();
    engine.start().await.unwrap();

    let first = TestContract::expiring_in("cycle", Duration::from_secs(60));
    engine.enqueue(first).await.unwrap();
    engine.prune("cycle").await.unwrap();

    wait_until(Duration::from_secs(1), || {
        let engine = &engine;
        async move { !engine.is_active("cycle").await.unwrap() }
    })
    .await;

    let second = TestContract::expired("cycle");
    let probe = second.clone();
    engine.enqueue(second).await.unwrap();

    probe.wait_until_fired(Duration::from_secs(1)).await;

    engine.shutdown().await.unwrap();
}
