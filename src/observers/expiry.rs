//! Certificate expiry observer.
//!
//! Watches successful updates for expiry-bearing resources, extracts the
//! `expiration` timestamp (seconds since the Unix epoch) from the payload
//! and exports the seconds remaining as a gauge. A malformed payload is a
//! reportable condition, never a crash: it increments a generic error
//! counter and leaves the gauge untouched.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::events::{LifecycleEvent, Subscription};
use crate::resources::Resource;
use crate::telemetry::Aggregator;

/// Payload field carrying the expiry timestamp.
const EXPIRATION_FIELD: &str = "expiration";

pub struct ExpiryObserver {
    aggregator: Arc<Aggregator>,
    /// Ids of declared resources whose kind bears an expiry timestamp.
    expiry_ids: HashSet<String>,
}

impl ExpiryObserver {
    pub fn new(aggregator: Arc<Aggregator>, resources: &[Resource]) -> Self {
        Self {
            aggregator,
            expiry_ids: resources
                .iter()
                .filter(|r| r.kind.bears_expiry())
                .map(Resource::id)
                .collect(),
        }
    }

    /// Consume the subscription until the stream ends.
    pub async fn run(self, mut events: Subscription) {
        while let Some(event) = events.recv().await {
            self.observe(&event);
        }
        debug!("expiry observer stream ended");
    }

    fn observe(&self, event: &LifecycleEvent) {
        if !event.is_success() || !self.expiry_ids.contains(&event.resource_id) {
            return;
        }

        let expiration = match event.payload.as_ref().and_then(|p| p.get(EXPIRATION_FIELD)) {
            None => {
                self.aggregator.incr_generic_error("no_expiration_in_resource");
                return;
            }
            Some(value) => match value.as_f64() {
                None => {
                    self.aggregator.incr_generic_error("expiration_not_numeric");
                    return;
                }
                Some(expiration) => expiration,
            },
        };

        let now = Utc::now().timestamp() as f64;
        self.aggregator
            .set_resource_expiry(&event.resource_id, expiration - now);
    }
}
