//! File materialization stage.
//!
//! Writes each payload as a JSON document under the output directory,
//! atomically (temp file + rename) so a scraping consumer never observes a
//! half-written secret. Files are created owner-read/write only.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::Materializer;
use crate::events::Payload;
use crate::resources::Resource;

pub struct FileMaterializer {
    dir: PathBuf,
}

impl FileMaterializer {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create output directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    fn target_path(&self, resource: &Resource) -> PathBuf {
        let name = resource
            .output
            .clone()
            .unwrap_or_else(|| resource.default_output_name());
        self.dir.join(name)
    }
}

#[async_trait]
impl Materializer for FileMaterializer {
    fn stage(&self) -> &'static str {
        "write"
    }

    async fn apply(&self, resource: &Resource, payload: &Payload) -> Result<()> {
        let target = self.target_path(resource);
        let body = serde_json::to_vec_pretty(payload)?;
        write_atomic(&self.dir, &target, &body)
            .with_context(|| format!("cannot write '{}'", target.display()))?;
        debug!(resource_id = %resource.id(), path = %target.display(), "payload written");
        Ok(())
    }
}

fn write_atomic(dir: &Path, target: &Path, body: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(body)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    tmp.persist(target)?;
    Ok(())
}
