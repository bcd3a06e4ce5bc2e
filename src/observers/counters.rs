//! Per-resource attempt counters.
//!
//! Keeps the resource total/success/error counters in sync with the event
//! stream: every observed attempt bumps the total plus the counter matching
//! its outcome.

use std::sync::Arc;

use tracing::debug;

use crate::events::{LifecycleEvent, Outcome, Subscription};
use crate::telemetry::Aggregator;

pub struct CounterObserver {
    aggregator: Arc<Aggregator>,
}

impl CounterObserver {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self { aggregator }
    }

    /// Consume the subscription until the stream ends.
    pub async fn run(self, mut events: Subscription) {
        while let Some(event) = events.recv().await {
            self.observe(&event);
        }
        debug!("counter observer stream ended");
    }

    fn observe(&self, event: &LifecycleEvent) {
        self.aggregator.incr_resource_total(&event.resource_id);
        match event.outcome {
            Outcome::Success => self.aggregator.incr_resource_success(&event.resource_id),
            Outcome::Failure => self.aggregator.incr_resource_error(&event.resource_id),
        }
    }
}
