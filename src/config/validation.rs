use anyhow::{bail, Result};
use std::collections::HashSet;

use super::Config;

/// Validate a loaded configuration before the sidecar starts.
pub fn validate(config: &Config) -> Result<()> {
    let mut seen = HashSet::new();
    for resource in &config.resources {
        if resource.path.trim().is_empty() {
            bail!("resource of kind '{}' has an empty path", resource.kind);
        }
        if !seen.insert(resource.id()) {
            bail!("duplicate resource '{}'", resource.id());
        }
    }

    if config.fabric.queue_capacity == 0 {
        bail!("fabric.queueCapacity must be at least 1");
    }
    if config.coordinator.max_inflight == 0 {
        bail!("coordinator.maxInflight must be at least 1");
    }
    if !config.one_shot && config.telemetry.port == 0 {
        bail!("telemetry.port must be non-zero in continuous mode");
    }
    if config.output.dir.trim().is_empty() {
        bail!("output.dir must not be empty");
    }

    Ok(())
}
