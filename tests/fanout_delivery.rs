//! Integration tests for event fan-out.
//!
//! Verifies the fabric's delivery contract under concurrent consumers:
//! every subscriber sees every event exactly once in production order, and
//! one stalled subscriber throttles the producer without affecting what the
//! others eventually observe.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use keysync::events::{Fabric, LifecycleEvent, Payload};

const EVENTS: u32 = 100;

fn event(n: u32) -> LifecycleEvent {
    LifecycleEvent::success(format!("secret:res/{n:03}"), Payload::new())
}

#[tokio::test]
async fn every_subscriber_observes_the_full_sequence() {
    let fabric = Arc::new(Fabric::new(10));

    let mut consumers = Vec::new();
    for _ in 0..4 {
        let mut sub = fabric.register();
        consumers.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(ev) = sub.recv().await {
                seen.push(ev.resource_id);
            }
            seen
        }));
    }

    let producer = {
        let fabric = Arc::clone(&fabric);
        tokio::spawn(async move {
            for n in 0..EVENTS {
                fabric.publish(event(n)).await;
            }
        })
    };

    producer.await.unwrap();
    drop(fabric);

    let expected: Vec<String> = (0..EVENTS).map(|n| format!("secret:res/{n:03}")).collect();
    for consumer in consumers {
        let seen = tokio::time::timeout(Duration::from_secs(5), consumer)
            .await
            .expect("consumer should drain")
            .unwrap();
        assert_eq!(seen, expected);
    }
}

#[tokio::test]
async fn a_stalled_subscriber_throttles_but_loses_nothing() {
    let fabric = Arc::new(Fabric::new(2));
    let mut stalled = fabric.register();
    let mut live = fabric.register();

    let producer = {
        let fabric = Arc::clone(&fabric);
        tokio::spawn(async move {
            for n in 0..10 {
                fabric.publish(event(n)).await;
            }
        })
    };

    // With a capacity of 2 and nobody draining the stalled queue, the
    // producer cannot be finished yet.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!producer.is_finished());

    // Once the stalled subscriber starts draining, everything flows and
    // both subscribers see the complete, ordered sequence.
    for n in 0..10 {
        let ev = stalled.recv().await.unwrap();
        assert_eq!(ev.resource_id, format!("secret:res/{n:03}"));
        let ev = live.recv().await.unwrap();
        assert_eq!(ev.resource_id, format!("secret:res/{n:03}"));
    }

    tokio::time::timeout(Duration::from_secs(5), producer)
        .await
        .expect("producer should finish once queues drain")
        .unwrap();
}

#[tokio::test]
async fn late_registration_misses_earlier_events() {
    let fabric = Fabric::new(10);
    let mut early = fabric.register();

    fabric.publish(event(0)).await;

    let mut late = fabric.register();
    fabric.publish(event(1)).await;
    drop(fabric);

    assert_eq!(early.recv().await.unwrap().resource_id, "secret:res/000");
    assert_eq!(early.recv().await.unwrap().resource_id, "secret:res/001");
    assert!(early.recv().await.is_none());

    // The late subscriber only sees what was produced after it joined.
    assert_eq!(late.recv().await.unwrap().resource_id, "secret:res/001");
    assert!(late.recv().await.is_none());
}
