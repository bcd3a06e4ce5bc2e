//! The lifecycle event emitted once per fetch/renew attempt.

use serde::{Deserialize, Serialize};

/// Secret material delivered with a successful attempt, as an ordered
/// mapping of field name to value.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Outcome of a single fetch/renew attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

/// One reported outcome of a fetch-or-renew attempt for a resource.
///
/// Constructed by the watcher, immutable afterwards. The fabric hands every
/// subscriber an independent clone, so subscribers must not assume a shared
/// mutable object. Serde-serializable (camelCase) so the stream can cross a
/// process boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    /// Stable resource identity (`kind:path` composite).
    pub resource_id: String,
    /// Success or failure of this attempt.
    pub outcome: Outcome,
    /// Secret payload. Present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    /// Error context for this attempt. Present only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_error: Option<String>,
    /// Attempts the watcher has made for this resource so far.
    #[serde(default)]
    pub retry_count: u32,
    /// Configured retry budget as the watcher sees it. `0` means unbounded.
    #[serde(default)]
    pub max_retries: u32,
}

impl LifecycleEvent {
    /// A successful attempt carrying the fetched payload.
    pub fn success(resource_id: impl Into<String>, payload: Payload) -> Self {
        Self {
            resource_id: resource_id.into(),
            outcome: Outcome::Success,
            payload: Some(payload),
            attempt_error: None,
            retry_count: 0,
            max_retries: 0,
        }
    }

    /// A failed attempt carrying its error context.
    pub fn failure(resource_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            outcome: Outcome::Failure,
            payload: None,
            attempt_error: Some(error.into()),
            retry_count: 0,
            max_retries: 0,
        }
    }

    /// Attach the watcher's retry bookkeeping.
    pub fn with_retries(mut self, retry_count: u32, max_retries: u32) -> Self {
        self.retry_count = retry_count;
        self.max_retries = max_retries;
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_carries_payload_only() {
        let mut payload = Payload::new();
        payload.insert("token".into(), serde_json::json!("s3cr3t"));
        let ev = LifecycleEvent::success("secret:platform/db", payload);
        assert!(ev.is_success());
        assert!(ev.payload.is_some());
        assert!(ev.attempt_error.is_none());
    }

    #[test]
    fn failure_carries_error_only() {
        let ev = LifecycleEvent::failure("secret:platform/db", "permission denied")
            .with_retries(2, 5);
        assert_eq!(ev.outcome, Outcome::Failure);
        assert!(ev.payload.is_none());
        assert_eq!(ev.attempt_error.as_deref(), Some("permission denied"));
        assert_eq!(ev.retry_count, 2);
        assert_eq!(ev.max_retries, 5);
    }

    #[test]
    fn serde_round_trip_uses_camel_case() {
        let ev = LifecycleEvent::failure("certificate:pki/issue/web", "timeout")
            .with_retries(1, 3);
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["resourceId"], "certificate:pki/issue/web");
        assert_eq!(json["outcome"], "failure");
        assert_eq!(json["retryCount"], 1);
        let back: LifecycleEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.resource_id, ev.resource_id);
        assert_eq!(back.max_retries, 3);
    }
}
