//! Worker-pool saturation tests.
//!
//! Dispatch is FIFO through the pending queue; a saturated pool serializes
//! firing, and the pool always returns to full strength afterwards.

use overdue::testing::{wait_until, TestContract};
use overdue::{Engine, EngineConfig, EventBus};
use std::time::Duration;

use crate::common::RecordingHandler;

fn config(workers: usize, queue_capacity: usize) -> EngineConfig {
    EngineConfig::default()
        .with_workers(workers)
        .with_heartbeat(Duration::from_millis(10))
        .with_queue_capacity(queue_capacity)
}

/// Test: more expired contracts than workers.
///
/// Three already-expired contracts into a pool of one: all three actions
/// eventually fire, one at a time, in enqueue order.
#[tokio::test]
async fn test_three_expired_contracts_through_one_worker() {
    let event_bus = EventBus::new();
    let handler = RecordingHandler::new();
    event_bus.register(handler.clone()).await;

    let engine = Engine::new(config(1, 100), None)
        .await
        .unwrap()
        .with_event_bus(event_bus);
    engine.start().await.unwrap();

    let contracts: Vec<_> = (0..3)
        .map(|i| TestContract::expired(format!("past{}", i)))
        .collect();
    let probes: Vec<_> = contracts.iter().cloned().collect();

    for contract in contracts {
        engine.enqueue(contract).await.unwrap();
    }

    wait_until(Duration::from_secs(2), || {
        let handler = &handler;
        async move { handler.fired_count().await == 3 }
    })
    .await;

    for probe in &probes {
        assert_eq!(probe.fired_count(), 1);
    }

    // FIFO dispatch: one worker means dispatch order is also firing order
    assert_eq!(
        handler.dispatched_ids().await,
        vec!["past0".to_string(), "past1".to_string(), "past2".to_string()]
    );
    assert_eq!(
        handler.fired_ids().await,
        vec!["past0".to_string(), "past1".to_string(), "past2".to_string()]
    );

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_pool_returns_to_full_strength() {
    let engine = Engine::new(config(2, 100), None).await.unwrap();
    engine.start().await.unwrap();

    // a mix of firings and prunes across several cycles
    for round in 0..3 {
        let fired = TestContract::expired(format!("fire-{}", round));
        let pruned = TestContract::expiring_in(format!("prune-{}", round), Duration::from_secs(60));

        engine.enqueue(fired).await.unwrap();
        engine.enqueue(pruned).await.unwrap();
        engine.prune(format!("prune-{}", round)).await.unwrap();

        wait_until(Duration::from_secs(1), || {
            let engine = &engine;
            async move { engine.active_count().await.unwrap() == 0 }
        })
        .await;
    }

    wait_until(Duration::from_secs(1), || {
        let engine = &engine;
        async move { engine.idle_workers().await.unwrap() == 2 }
    })
    .await;

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_full_queue_applies_backpressure() {
    // pool of one, queue of one: the blocker occupies the worker, the first
    // queued contract fills the queue, and a third enqueue must wait
    let engine = Engine::new(config(1, 1), None).await.unwrap();
    engine.start().await.unwrap();

    engine
        .enqueue(TestContract::expiring_in("blocker", Duration::from_secs(60)))
        .await
        .unwrap();

    // wait for the blocker to occupy the only worker
    wait_until(Duration::from_secs(1), || {
        let engine = &engine;
        async move { engine.idle_workers().await.unwrap() == 0 }
    })
    .await;

    engine
        .enqueue(TestContract::expiring_in("queued", Duration::from_secs(60)))
        .await
        .unwrap();

    let third = TestContract::expiring_in("waiting", Duration::from_secs(60));
    let mut blocked = Box::pin(engine.enqueue(third));

    // the enqueue should still be pending after a generous delay
    tokio::select! {
        _ = &mut blocked => panic!("enqueue should block while the queue is full"),
        _ = tokio::time::sleep(Duration::from_millis(200)) => {}
    }

    // freeing the worker drains the queue and unblocks the caller
    engine.prune("blocker").await.unwrap();
    blocked.await.unwrap();

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_firing_delayed_until_worker_frees_up() {
    let engine = Engine::new(config(1, 100), None).await.unwrap();
    engine.start().await.unwrap();

    // the first contract holds the worker well past the second's deadline
    let slow = TestContract::expiring_in("slow", Duration::from_millis(300));
    let starved = TestContract::expired("starved");
    let slow_probe = slow.clone();
    let starved_probe = starved.clone();

    engine.enqueue(slow).await.unwrap();
    engine.enqueue(starved).await.unwrap();

    // while the worker is pinned, the expired contract cannot fire
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(starved_probe.fired_count(), 0);

    slow_probe.wait_until_fired(Duration::from_secs(1)).await;
    starved_probe.wait_until_fired(Duration::from_secs(1)).await;

    engine.shutdown().await.unwrap();
}
