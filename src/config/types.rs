use serde::{Deserialize, Serialize};

use super::defaults::*;

// ============================================================================
// Fabric
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricConfig {
    /// Capacity of each subscriber's delivery queue. A full queue blocks
    /// the watcher until the subscriber drains.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

// ============================================================================
// Coordinator
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorConfig {
    /// Bound on concurrently processed events. Size to the expected
    /// resource cardinality.
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_inflight: default_max_inflight(),
        }
    }
}

// ============================================================================
// Telemetry
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryConfig {
    /// Port the `/metrics` endpoint listens on (continuous mode only).
    #[serde(default = "default_telemetry_port")]
    pub port: u16,
    /// Backend role this sidecar authenticates as; attached as a label to
    /// every exported sample.
    #[serde(default = "default_role")]
    pub role: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            port: default_telemetry_port(),
            role: default_role(),
        }
    }
}

// ============================================================================
// Output
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    /// Directory materialized secrets are written under.
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

// ============================================================================
// Watcher
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WatcherConfig {
    /// Fetcher command whose stdout carries the event stream. When unset,
    /// events are read from the sidecar's own stdin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}
