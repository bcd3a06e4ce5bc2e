//! Default values for configuration fields.

use crate::coordinator::DEFAULT_MAX_INFLIGHT;
use crate::events::DEFAULT_QUEUE_CAPACITY;

/// Config file picked up when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "keysync.json";

pub fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

pub fn default_max_inflight() -> usize {
    DEFAULT_MAX_INFLIGHT
}

pub fn default_telemetry_port() -> u16 {
    8099
}

pub fn default_role() -> String {
    "default".to_string()
}

pub fn default_output_dir() -> String {
    "secrets".to_string()
}
