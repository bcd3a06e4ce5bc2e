//! Declared secret resources.
//!
//! A [`Resource`] is one unit of secret material the sidecar keeps
//! synchronized, declared in configuration at startup. Its identity, the
//! `kind:path` composite returned by [`Resource::id`], is fixed for the
//! process lifetime and is the key every downstream component uses.

use serde::{Deserialize, Serialize};

/// The kind of backend resource a declaration refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Generic key/value secret material.
    Secret,
    /// Certificate issuance; payloads carry an `expiration` timestamp.
    Certificate,
    /// Backend tokens kept renewed on behalf of other processes.
    Token,
}

impl ResourceKind {
    /// Whether success payloads of this kind carry an expiry timestamp the
    /// expiry observer should export.
    pub fn bears_expiry(&self) -> bool {
        matches!(self, ResourceKind::Certificate)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::Secret => "secret",
            ResourceKind::Certificate => "certificate",
            ResourceKind::Token => "token",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "secret" => Ok(Self::Secret),
            "certificate" => Ok(Self::Certificate),
            "token" => Ok(Self::Token),
            _ => Err(format!("invalid resource kind: {s}")),
        }
    }
}

/// One declared resource to keep synchronized.
///
/// The sidecar core never mutates a `Resource`; the run coordinator tracks
/// observed retry counts separately from the declared budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Backend resource kind.
    pub kind: ResourceKind,
    /// Backend path of the resource (e.g. `pki/issue/web`).
    pub path: String,
    /// Retry budget for fetch/renew attempts. `0` means unbounded.
    #[serde(default)]
    pub max_retries: u32,
    /// Override for the materialized file name (defaults to a name derived
    /// from the resource id).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Post-update hook command, run with the payload on stdin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec: Option<String>,
}

impl Resource {
    pub fn new(kind: ResourceKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            max_retries: 0,
            output: None,
            exec: None,
        }
    }

    /// Stable identity: the `kind:path` composite.
    pub fn id(&self) -> String {
        format!("{}:{}", self.kind, self.path)
    }

    /// File name the payload materializes under when no override is set.
    pub fn default_output_name(&self) -> String {
        let sanitized: String = self
            .path
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        format!("{}_{}.json", self.kind, sanitized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_kind_path_composite() {
        let r = Resource::new(ResourceKind::Certificate, "pki/issue/web");
        assert_eq!(r.id(), "certificate:pki/issue/web");
    }

    #[test]
    fn only_certificates_bear_expiry() {
        assert!(ResourceKind::Certificate.bears_expiry());
        assert!(!ResourceKind::Secret.bears_expiry());
        assert!(!ResourceKind::Token.bears_expiry());
    }

    #[test]
    fn default_output_name_flattens_path() {
        let r = Resource::new(ResourceKind::Secret, "platform/db/creds");
        assert_eq!(r.default_output_name(), "secret_platform_db_creds.json");
    }

    #[test]
    fn kind_round_trips_through_display() {
        for kind in [
            ResourceKind::Secret,
            ResourceKind::Certificate,
            ResourceKind::Token,
        ] {
            assert_eq!(kind.to_string().parse::<ResourceKind>(), Ok(kind));
        }
    }
}
