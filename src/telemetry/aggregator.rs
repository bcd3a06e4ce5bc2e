//! Process-wide store of operational counters and gauges.
//!
//! Producers (subscribers, the coordinator, the watcher) call the update
//! API; the exporter pulls point-in-time [`MetricsSnapshot`]s. All state
//! lives behind one read/write lock: any update excludes all readers and
//! other updates, while concurrent snapshots may proceed together.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use thiserror::Error;

/// Set while an [`Aggregator`] is live. Two live instances would both claim
/// ownership of the same exported metric names.
static CLAIMED: AtomicBool = AtomicBool::new(false);

/// Errors from the aggregator's setup contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("a metrics aggregator is already live in this process")]
    AlreadyRegistered,
}

/// Which counter of a total/success/error triple to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    Total,
    Success,
    Error,
}

// ============================================================================
// Descriptors
// ============================================================================

/// Exposition kind of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

/// Fixed description of one metric family the aggregator can emit.
///
/// Stable for the process lifetime and queryable before any data exists, so
/// an exporter can advertise the full schema of an empty process.
#[derive(Debug, Clone, Copy)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub labels: &'static [&'static str],
}

/// Every family this aggregator can ever emit.
pub const DESCRIPTORS: &[MetricDesc] = &[
    MetricDesc {
        name: "keysync_certificate_expiry_gauge",
        help: "Seconds until the most recently observed certificate expiry, per resource",
        kind: MetricKind::Gauge,
        labels: &["resource_id", "role"],
    },
    MetricDesc {
        name: "keysync_resource_total_counter",
        help: "Fetch/renew attempts observed per resource",
        kind: MetricKind::Counter,
        labels: &["resource_id", "role"],
    },
    MetricDesc {
        name: "keysync_resource_success_counter",
        help: "Successful fetch/renew attempts per resource",
        kind: MetricKind::Counter,
        labels: &["resource_id", "role"],
    },
    MetricDesc {
        name: "keysync_resource_error_counter",
        help: "Failed fetch/renew attempts per resource",
        kind: MetricKind::Counter,
        labels: &["resource_id", "role"],
    },
    MetricDesc {
        name: "keysync_stage_total_counter",
        help: "Processing-stage executions per resource and stage",
        kind: MetricKind::Counter,
        labels: &["resource_id", "stage", "role"],
    },
    MetricDesc {
        name: "keysync_stage_success_counter",
        help: "Successful processing-stage executions per resource and stage",
        kind: MetricKind::Counter,
        labels: &["resource_id", "stage", "role"],
    },
    MetricDesc {
        name: "keysync_stage_error_counter",
        help: "Failed processing-stage executions per resource and stage",
        kind: MetricKind::Counter,
        labels: &["resource_id", "stage", "role"],
    },
    MetricDesc {
        name: "keysync_auth_total_counter",
        help: "Backend authentication attempts",
        kind: MetricKind::Counter,
        labels: &["role"],
    },
    MetricDesc {
        name: "keysync_auth_success_counter",
        help: "Successful backend authentication attempts",
        kind: MetricKind::Counter,
        labels: &["role"],
    },
    MetricDesc {
        name: "keysync_auth_error_counter",
        help: "Failed backend authentication attempts",
        kind: MetricKind::Counter,
        labels: &["role"],
    },
    MetricDesc {
        name: "keysync_error_counter",
        help: "Generic errors by reason",
        kind: MetricKind::Counter,
        labels: &["error", "role"],
    },
];

// ============================================================================
// State
// ============================================================================

/// Counters for one named processing stage of one resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounters {
    pub total: u64,
    pub success: u64,
    pub error: u64,
}

/// Global authentication counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthCounters {
    pub total: u64,
    pub success: u64,
    pub error: u64,
}

impl StageCounters {
    fn bump(&mut self, kind: CounterKind) {
        match kind {
            CounterKind::Total => self.total += 1,
            CounterKind::Success => self.success += 1,
            CounterKind::Error => self.error += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MetricsState {
    resource_expiry: BTreeMap<String, f64>,
    resource_totals: BTreeMap<String, u64>,
    resource_successes: BTreeMap<String, u64>,
    resource_errors: BTreeMap<String, u64>,
    stages: BTreeMap<String, BTreeMap<String, StageCounters>>,
    auth: AuthCounters,
    generic_errors: BTreeMap<String, u64>,
}

/// Point-in-time consistent copy of every counter and gauge.
///
/// Keys iterate in sorted order, so renderings are deterministic.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub resource_expiry: BTreeMap<String, f64>,
    pub resource_totals: BTreeMap<String, u64>,
    pub resource_successes: BTreeMap<String, u64>,
    pub resource_errors: BTreeMap<String, u64>,
    pub stages: BTreeMap<String, BTreeMap<String, StageCounters>>,
    pub auth: AuthCounters,
    pub generic_errors: BTreeMap<String, u64>,
}

// ============================================================================
// Aggregator
// ============================================================================

/// Concurrency-safe store of named counters and gauges.
///
/// Construct one per process and pass it (as `Arc<Aggregator>`) to every
/// component that produces or exports telemetry. Constructing a second
/// instance while one is live returns
/// [`TelemetryError::AlreadyRegistered`]; the slot is released when the
/// instance drops.
#[derive(Debug)]
pub struct Aggregator {
    role: String,
    state: RwLock<MetricsState>,
}

impl Aggregator {
    /// Claim the process-wide aggregator slot.
    ///
    /// `role` is attached as a label to every exported sample, identifying
    /// which backend role this sidecar authenticates as.
    pub fn new(role: impl Into<String>) -> Result<Self, TelemetryError> {
        if CLAIMED.swap(true, Ordering::AcqRel) {
            return Err(TelemetryError::AlreadyRegistered);
        }
        Ok(Self {
            role: role.into(),
            state: RwLock::new(MetricsState::default()),
        })
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// The fixed description of every family this aggregator can emit.
    pub fn descriptors(&self) -> &'static [MetricDesc] {
        DESCRIPTORS
    }

    pub fn incr_resource_total(&self, resource_id: &str) {
        let mut state = self.state.write();
        *state.resource_totals.entry(resource_id.to_string()).or_default() += 1;
    }

    pub fn incr_resource_success(&self, resource_id: &str) {
        let mut state = self.state.write();
        *state.resource_successes.entry(resource_id.to_string()).or_default() += 1;
    }

    pub fn incr_resource_error(&self, resource_id: &str) {
        let mut state = self.state.write();
        *state.resource_errors.entry(resource_id.to_string()).or_default() += 1;
    }

    /// Record the latest observed expiry for a resource, in seconds from
    /// now. Last write wins; the gauge may move in either direction.
    pub fn set_resource_expiry(&self, resource_id: &str, seconds: f64) {
        let mut state = self.state.write();
        state.resource_expiry.insert(resource_id.to_string(), seconds);
    }

    /// Bump one counter of a named processing stage (e.g. "write", "exec").
    pub fn incr_stage(&self, resource_id: &str, stage: &str, kind: CounterKind) {
        let mut state = self.state.write();
        state
            .stages
            .entry(resource_id.to_string())
            .or_default()
            .entry(stage.to_string())
            .or_default()
            .bump(kind);
    }

    pub fn incr_auth(&self, kind: CounterKind) {
        let mut state = self.state.write();
        match kind {
            CounterKind::Total => state.auth.total += 1,
            CounterKind::Success => state.auth.success += 1,
            CounterKind::Error => state.auth.error += 1,
        }
    }

    /// Count a generic, non-resource error by reason.
    pub fn incr_generic_error(&self, reason: &str) {
        let mut state = self.state.write();
        *state.generic_errors.entry(reason.to_string()).or_default() += 1;
    }

    /// A point-in-time consistent view of all current values.
    ///
    /// Holds the shared lock only for the duration of the copy; concurrent
    /// snapshots do not exclude each other.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.read();
        MetricsSnapshot {
            resource_expiry: state.resource_expiry.clone(),
            resource_totals: state.resource_totals.clone(),
            resource_successes: state.resource_successes.clone(),
            resource_errors: state.resource_errors.clone(),
            stages: state.stages.clone(),
            auth: state.auth,
            generic_errors: state.generic_errors.clone(),
        }
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        CLAIMED.store(false, Ordering::Release);
    }
}
