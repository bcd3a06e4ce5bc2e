//! Post-update hook stage.
//!
//! Runs the resource's declared hook command with the payload piped to its
//! stdin as JSON. Commands are parsed with explicit argument splitting, not
//! shell interpretation, and are bounded by a timeout.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::Materializer;
use crate::events::Payload;
use crate::resources::Resource;

/// Maximum run time for a post-update hook.
const HOOK_TIMEOUT_SECS: u64 = 30;

pub struct HookMaterializer;

#[async_trait]
impl Materializer for HookMaterializer {
    fn stage(&self) -> &'static str {
        "exec"
    }

    fn applies(&self, resource: &Resource) -> bool {
        resource.exec.is_some()
    }

    async fn apply(&self, resource: &Resource, payload: &Payload) -> Result<()> {
        let Some(command) = resource.exec.as_deref() else {
            return Ok(());
        };

        // Explicit arg splitting, not shell interpretation.
        let parts: Vec<&str> = command.split_whitespace().collect();
        if parts.is_empty() {
            bail!("empty hook command");
        }
        let program = parts[0];
        let args = &parts[1..];

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("cannot spawn hook '{program}'"))?;

        let body = serde_json::to_vec(payload)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&body).await?;
            drop(stdin);
        }

        let output = tokio::time::timeout(
            Duration::from_secs(HOOK_TIMEOUT_SECS),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("hook '{program}' timed out after {HOOK_TIMEOUT_SECS}s"))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "hook '{program}' exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        debug!(resource_id = %resource.id(), hook = program, "post-update hook ran");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceKind;

    fn resource_with_hook(hook: &str) -> Resource {
        let mut resource = Resource::new(ResourceKind::Secret, "platform/db");
        resource.exec = Some(hook.into());
        resource
    }

    #[test]
    fn only_applies_when_a_hook_is_declared() {
        let hook = HookMaterializer;
        assert!(hook.applies(&resource_with_hook("cat")));
        assert!(!hook.applies(&Resource::new(ResourceKind::Secret, "platform/db")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_hook_consumes_the_payload() {
        let hook = HookMaterializer;
        let mut payload = Payload::new();
        payload.insert("k".into(), serde_json::json!("v"));
        hook.apply(&resource_with_hook("cat"), &payload).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_hook_reports_its_status() {
        let hook = HookMaterializer;
        let err = hook
            .apply(&resource_with_hook("false"), &Payload::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }

    #[tokio::test]
    async fn empty_hook_command_is_rejected() {
        let hook = HookMaterializer;
        let err = hook
            .apply(&resource_with_hook("   "), &Payload::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty hook command"));
    }
}
