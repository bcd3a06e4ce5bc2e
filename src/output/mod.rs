//! Materialization of successful payloads.
//!
//! The coordinator forwards every processed Success payload through an
//! [`OutputPipeline`] of named stages. Stage failures are reported to the
//! aggregator (stage counters plus a `materialization_failed` generic
//! error) and never become new lifecycle events; the one-shot exit status
//! reflects fetch outcomes only.

mod fs;
mod hook;

pub use fs::FileMaterializer;
pub use hook::HookMaterializer;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::events::Payload;
use crate::resources::Resource;
use crate::telemetry::{Aggregator, CounterKind};

/// One named materialization stage (e.g. "write", "exec").
#[async_trait]
pub trait Materializer: Send + Sync {
    /// Stage name used for telemetry labels.
    fn stage(&self) -> &'static str;

    /// Whether this stage applies to the given resource.
    fn applies(&self, _resource: &Resource) -> bool {
        true
    }

    /// Apply the payload for one resource.
    async fn apply(&self, resource: &Resource, payload: &Payload) -> Result<()>;
}

/// Runs the applicable stages for a payload and does the stage accounting.
pub struct OutputPipeline {
    steps: Vec<Arc<dyn Materializer>>,
    aggregator: Arc<Aggregator>,
}

impl OutputPipeline {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self {
            steps: Vec::new(),
            aggregator,
        }
    }

    pub fn with_step(mut self, step: Arc<dyn Materializer>) -> Self {
        self.steps.push(step);
        self
    }

    /// Apply every applicable stage, reporting per-stage counters as it
    /// goes. Returns an error if any stage failed; later stages still run.
    pub async fn apply(&self, resource: &Resource, payload: &Payload) -> Result<()> {
        let id = resource.id();
        let mut failed = Vec::new();

        for step in &self.steps {
            if !step.applies(resource) {
                continue;
            }
            let stage = step.stage();
            self.aggregator.incr_stage(&id, stage, CounterKind::Total);
            match step.apply(resource, payload).await {
                Ok(()) => {
                    self.aggregator.incr_stage(&id, stage, CounterKind::Success);
                }
                Err(err) => {
                    self.aggregator.incr_stage(&id, stage, CounterKind::Error);
                    self.aggregator.incr_generic_error("materialization_failed");
                    warn!(resource_id = %id, stage, "materialization stage failed: {err:#}");
                    failed.push(stage);
                }
            }
        }

        if !failed.is_empty() {
            bail!("stage(s) failed for {id}: {}", failed.join(", "));
        }
        Ok(())
    }
}
