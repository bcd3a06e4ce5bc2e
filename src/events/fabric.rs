//! Event distribution fabric.
//!
//! Delivers every published [`LifecycleEvent`] to every registered
//! subscriber over an independent bounded queue. When a queue is full,
//! `publish` awaits until the subscriber drains, so a slow subscriber
//! throttles the upstream watcher instead of losing events. This coupling
//! is deliberate: a permanently stalled subscriber stalls the producer, and
//! the queue capacity is the tunable that bounds how far ahead the producer
//! may run.

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

use super::event::LifecycleEvent;

/// Default per-subscriber queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Fan-out point between the watcher and its subscribers.
///
/// Subscribers call [`Fabric::register`] before production starts; there is
/// no historical replay, so a late registration misses earlier events. Each
/// subscriber observes its own queue in FIFO production order; no ordering
/// is guaranteed *between* subscribers.
pub struct Fabric {
    capacity: usize,
    senders: Mutex<Vec<mpsc::Sender<LifecycleEvent>>>,
}

impl Fabric {
    /// Create a fabric whose subscriber queues hold `capacity` events.
    /// The minimum capacity is 1 (clamped).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            senders: Mutex::new(Vec::new()),
        }
    }

    /// Register a new subscriber and return its delivery queue handle.
    pub fn register(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.senders.lock().push(tx);
        Subscription { rx }
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.senders.lock().len()
    }

    /// Deliver one event to every registered subscriber.
    ///
    /// Awaits on each full queue (backpressure); never drops an event for a
    /// live subscriber. A subscriber whose receiver has been dropped cannot
    /// receive anything and is pruned with a warning.
    pub async fn publish(&self, event: LifecycleEvent) {
        // Snapshot the senders so the lock is not held across an await.
        let senders: Vec<mpsc::Sender<LifecycleEvent>> = self.senders.lock().clone();
        let mut saw_closed = false;
        for tx in &senders {
            if tx.send(event.clone()).await.is_err() {
                saw_closed = true;
            }
        }
        if saw_closed {
            let mut senders = self.senders.lock();
            let before = senders.len();
            senders.retain(|tx| !tx.is_closed());
            warn!(
                pruned = before - senders.len(),
                resource_id = %event.resource_id,
                "dropped subscriber(s) detected during publish; pruned"
            );
        }
    }
}

/// A subscriber's read handle onto its delivery queue.
pub struct Subscription {
    rx: mpsc::Receiver<LifecycleEvent>,
}

impl Subscription {
    /// Receive the next event in production order, or `None` once the
    /// fabric has been dropped and the queue is drained.
    pub async fn recv(&mut self) -> Option<LifecycleEvent> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Payload;
    use std::sync::Arc;
    use std::time::Duration;

    fn event(n: u32) -> LifecycleEvent {
        LifecycleEvent::success(format!("secret:res/{n}"), Payload::new())
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_event_in_order() {
        let fabric = Fabric::new(4);
        let mut subs = vec![fabric.register(), fabric.register(), fabric.register()];

        for n in 0..3 {
            fabric.publish(event(n)).await;
        }
        drop(fabric);

        for sub in &mut subs {
            for n in 0..3 {
                let ev = sub.recv().await.expect("event missing");
                assert_eq!(ev.resource_id, format!("secret:res/{n}"));
            }
            assert!(sub.recv().await.is_none());
        }
    }

    #[tokio::test]
    async fn full_queue_blocks_the_producer() {
        let fabric = Arc::new(Fabric::new(1));
        let mut slow = fabric.register();

        // First publish fills the queue; the second must not complete until
        // the subscriber drains an entry.
        fabric.publish(event(0)).await;

        let publisher = {
            let fabric = Arc::clone(&fabric);
            tokio::spawn(async move { fabric.publish(event(1)).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!publisher.is_finished(), "publish should be backpressured");

        let first = slow.recv().await.unwrap();
        assert_eq!(first.resource_id, "secret:res/0");

        tokio::time::timeout(Duration::from_secs(1), publisher)
            .await
            .expect("publish should unblock once the queue drains")
            .unwrap();
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_corrupt_others() {
        let fabric = Arc::new(Fabric::new(1));
        let mut fast = fabric.register();
        let mut slow = fabric.register();

        let publisher = {
            let fabric = Arc::clone(&fabric);
            tokio::spawn(async move {
                for n in 0..3 {
                    fabric.publish(event(n)).await;
                }
            })
        };

        // Drain both; the fast subscriber still observes the full sequence.
        for n in 0..3 {
            assert_eq!(fast.recv().await.unwrap().resource_id, format!("secret:res/{n}"));
            assert_eq!(slow.recv().await.unwrap().resource_id, format!("secret:res/{n}"));
        }
        publisher.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned() {
        let fabric = Fabric::new(2);
        let sub = fabric.register();
        let mut live = fabric.register();
        assert_eq!(fabric.subscriber_count(), 2);

        drop(sub);
        fabric.publish(event(0)).await;

        assert_eq!(fabric.subscriber_count(), 1);
        assert_eq!(live.recv().await.unwrap().resource_id, "secret:res/0");
    }
}
