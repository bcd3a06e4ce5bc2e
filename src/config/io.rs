use anyhow::{bail, Context, Result};
use std::path::Path;

use super::Config;

/// Maximum size for a config file (1 MB).
pub const MAX_CONFIG_FILE_BYTES: u64 = 1024 * 1024;

/// Read a configuration file, dispatching on extension (YAML or JSON).
///
/// Security checks, since this process handles secret material:
/// - file size guardrail (`MAX_CONFIG_FILE_BYTES`)
/// - symlinks at the final path component are rejected
pub fn read_config_file(path: &Path) -> Result<Config> {
    let metadata = std::fs::symlink_metadata(path)
        .with_context(|| format!("cannot stat config file '{}'", path.display()))?;

    #[cfg(unix)]
    if metadata.file_type().is_symlink() {
        bail!(
            "config file '{}' is a symlink, refusing to follow",
            path.display()
        );
    }

    if metadata.len() > MAX_CONFIG_FILE_BYTES {
        bail!(
            "config file '{}' is {} bytes, exceeds limit of {} bytes",
            path.display(),
            metadata.len(),
            MAX_CONFIG_FILE_BYTES,
        );
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    let config = match ext {
        "yaml" | "yml" => serde_yaml::from_str(&content)
            .with_context(|| format!("invalid YAML in '{}'", path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in '{}'", path.display()))?,
    };
    Ok(config)
}

/// Write a default configuration file for `config init`.
pub fn write_default(path: &str) -> Result<()> {
    let path = Path::new(path);
    if path.exists() {
        bail!("'{}' already exists, refusing to overwrite", path.display());
    }
    let body = serde_json::to_string_pretty(&Config::default())?;
    std::fs::write(path, body)
        .with_context(|| format!("cannot write '{}'", path.display()))?;
    Ok(())
}
