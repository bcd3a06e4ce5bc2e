//! Inbound collaborator seam.
//!
//! The watcher authenticates to the secrets backend, schedules fetch/renew
//! attempts and publishes one [`LifecycleEvent`](crate::events::LifecycleEvent)
//! per attempt into the fabric. That client is out of scope here; this
//! module defines the trait it plugs into plus the bundled
//! [`PipeWatcher`] that attaches to an external fetcher process.

mod pipe;

pub use pipe::{PipeSource, PipeWatcher};

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::events::Fabric;

/// A producer of lifecycle events.
///
/// Implementations must set `retry_count`/`max_retries` faithfully per
/// resource and may call the aggregator's auth counters around their token
/// lifecycle. `run` returns when the event stream ends.
#[async_trait]
pub trait Watcher: Send + Sync {
    /// Display name for logging.
    fn name(&self) -> &str;

    /// Produce events into the fabric until the source is exhausted.
    async fn run(&self, fabric: Arc<Fabric>) -> Result<()>;
}
