mod defaults;
mod io;
mod types;
mod validation;

pub use defaults::*;
pub use io::*;
pub use types::*;
pub use validation::*;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::resources::Resource;

/// Top-level keysync configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Finite execution mode: terminate once every declared resource
    /// reaches a terminal outcome.
    #[serde(default)]
    pub one_shot: bool,
    /// Resources to keep synchronized.
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub fabric: FabricConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
}

impl Config {
    /// Load configuration from an explicit path, from the default file if
    /// one exists, or fall back to defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        if let Some(path) = path {
            let config = read_config_file(Path::new(path))?;
            info!("loaded configuration from '{path}'");
            return Ok(config);
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            let config = read_config_file(default_path)?;
            info!("loaded configuration from '{DEFAULT_CONFIG_FILE}'");
            return Ok(config);
        }
        Ok(Self::default())
    }
}
