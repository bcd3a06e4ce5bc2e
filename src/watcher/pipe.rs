//! Watcher that attaches to an external fetcher process.
//!
//! Reads newline-delimited JSON [`LifecycleEvent`]s from stdin or from the
//! stdout of a configured fetcher command and publishes them into the
//! fabric. A malformed line is counted as a `malformed_event` generic error
//! and skipped; it never tears the stream down.

use std::process::Stdio;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

use super::Watcher;
use crate::events::{Fabric, LifecycleEvent};
use crate::telemetry::Aggregator;

/// Where the event stream comes from.
pub enum PipeSource {
    /// The sidecar's own stdin (the fetcher pipes into us).
    Stdin,
    /// Stdout of a fetcher command we spawn ourselves.
    Command(String),
}

pub struct PipeWatcher {
    source: PipeSource,
    aggregator: Arc<Aggregator>,
}

impl PipeWatcher {
    pub fn new(source: PipeSource, aggregator: Arc<Aggregator>) -> Self {
        Self { source, aggregator }
    }

    async fn pump<R>(&self, reader: R, fabric: Arc<Fabric>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<LifecycleEvent>(line) {
                Ok(event) => fabric.publish(event).await,
                Err(err) => {
                    self.aggregator.incr_generic_error("malformed_event");
                    warn!("skipping malformed event line: {err}");
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Watcher for PipeWatcher {
    fn name(&self) -> &str {
        match self.source {
            PipeSource::Stdin => "pipe(stdin)",
            PipeSource::Command(_) => "pipe(command)",
        }
    }

    async fn run(&self, fabric: Arc<Fabric>) -> Result<()> {
        match &self.source {
            PipeSource::Stdin => {
                info!("reading lifecycle events from stdin");
                self.pump(BufReader::new(tokio::io::stdin()), fabric).await
            }
            PipeSource::Command(command) => {
                // Explicit arg splitting, not shell interpretation.
                let parts: Vec<&str> = command.split_whitespace().collect();
                if parts.is_empty() {
                    bail!("empty watcher command");
                }
                let program = parts[0];

                info!("spawning fetcher '{program}'");
                let mut child = Command::new(program)
                    .args(&parts[1..])
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::inherit())
                    .kill_on_drop(true)
                    .spawn()
                    .with_context(|| format!("cannot spawn fetcher '{program}'"))?;

                let stdout = child
                    .stdout
                    .take()
                    .context("fetcher has no stdout handle")?;
                self.pump(BufReader::new(stdout), fabric).await?;

                let status = child.wait().await?;
                if !status.success() {
                    warn!("fetcher '{program}' exited with {status}");
                }
                Ok(())
            }
        }
    }
}
