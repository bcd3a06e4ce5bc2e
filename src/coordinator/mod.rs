//! Run coordination.
//!
//! A subscriber that tracks which declared resources have not yet reached a
//! terminal outcome and, in one-shot mode, decides when the process
//! terminates and with what exit status. In continuous mode it never
//! terminates on its own; pending-set bookkeeping is skipped entirely and
//! events are only materialized.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::events::{LifecycleEvent, Outcome, Subscription};
use crate::output::OutputPipeline;
use crate::resources::Resource;

/// Default bound on concurrently processed events.
pub const DEFAULT_MAX_INFLIGHT: usize = 32;

/// Execution mode for one process invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Keep synchronizing until a termination signal arrives.
    Continuous,
    /// Terminate once every declared resource reaches a terminal outcome.
    OneShot,
}

/// State of the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// Every declared resource was materialized at least once.
    DrainedOk,
    /// The pending set drained, but at least one resource permanently
    /// exhausted its retry budget.
    DrainedFailed,
}

impl RunState {
    /// Process exit status for this state. `Running` maps to failure: a
    /// one-shot run only returns while still running when its event stream
    /// died with resources unresolved.
    pub fn exit_code(self) -> i32 {
        match self {
            RunState::DrainedOk => 0,
            RunState::Running | RunState::DrainedFailed => 1,
        }
    }
}

/// Pending set, observed retry counts and the permanent-failure flag.
/// Guarded by one mutex held only for the duration of a transition.
struct RunLedger {
    pending: HashSet<String>,
    observed_retries: HashMap<String, u32>,
    failed: bool,
    state: RunState,
}

pub struct RunCoordinator {
    mode: RunMode,
    resources: HashMap<String, Resource>,
    ledger: Mutex<RunLedger>,
    drained: Notify,
    permits: Arc<Semaphore>,
    max_inflight: u32,
    pipeline: Arc<OutputPipeline>,
}

impl RunCoordinator {
    pub fn new(
        mode: RunMode,
        resources: &[Resource],
        pipeline: Arc<OutputPipeline>,
        max_inflight: usize,
    ) -> Self {
        let max_inflight = max_inflight.clamp(1, u32::MAX as usize) as u32;
        let pending = match mode {
            RunMode::OneShot => resources.iter().map(Resource::id).collect(),
            RunMode::Continuous => HashSet::new(),
        };
        Self {
            mode,
            resources: resources.iter().map(|r| (r.id(), r.clone())).collect(),
            ledger: Mutex::new(RunLedger {
                pending,
                observed_retries: HashMap::new(),
                failed: false,
                state: RunState::Running,
            }),
            drained: Notify::new(),
            permits: Arc::new(Semaphore::new(max_inflight as usize)),
            max_inflight,
            pipeline,
        }
    }

    pub fn state(&self) -> RunState {
        self.ledger.lock().state
    }

    /// Consume the event stream until the run reaches a terminal state or
    /// the stream ends. Each event is processed in its own task, bounded by
    /// the in-flight semaphore.
    pub async fn run(self: Arc<Self>, mut events: Subscription) -> RunState {
        if self.mode == RunMode::OneShot && self.ledger.lock().pending.is_empty() {
            info!("nothing to synchronize, exiting");
            self.ledger.lock().state = RunState::DrainedOk;
            return RunState::DrainedOk;
        }

        loop {
            tokio::select! {
                state = self.wait_drained() => {
                    // Let in-flight processors finish before reporting the
                    // terminal state, so shutdown never races a
                    // materialization.
                    let _settled = self.permits.acquire_many(self.max_inflight).await;
                    return state;
                }
                maybe = events.recv() => match maybe {
                    Some(event) => {
                        debug!(resource_id = %event.resource_id, "received an update");
                        let permit = Arc::clone(&self.permits)
                            .acquire_owned()
                            .await
                            .expect("in-flight semaphore is never closed");
                        let coordinator = Arc::clone(&self);
                        tokio::spawn(coordinator.process(event, permit));
                    }
                    None => break,
                },
            }
        }

        // Stream ended: let in-flight tasks settle, then report whatever
        // state the run reached.
        let _settled = self.permits.acquire_many(self.max_inflight).await;
        let state = self.state();
        if self.mode == RunMode::OneShot && state == RunState::Running {
            let unresolved = self.ledger.lock().pending.len();
            warn!(unresolved, "event stream ended before the run drained");
        }
        state
    }

    async fn process(self: Arc<Self>, event: LifecycleEvent, _permit: OwnedSemaphorePermit) {
        if event.is_success() {
            match (self.resources.get(&event.resource_id), &event.payload) {
                (Some(resource), Some(payload)) => {
                    // Materialization happens before the transition and
                    // outside the ledger lock; its failures are reported as
                    // metrics and do not affect the run outcome.
                    if let Err(err) = self.pipeline.apply(resource, payload).await {
                        warn!(resource_id = %event.resource_id, "failed to write out the update: {err:#}");
                    }
                }
                (None, _) => {
                    debug!(resource_id = %event.resource_id, "update for an undeclared resource");
                }
                _ => {}
            }
        }

        if self.mode == RunMode::OneShot {
            if let Some(terminal) = self.transition(&event) {
                match terminal {
                    RunState::DrainedOk => info!("no resources left to process, exiting"),
                    RunState::DrainedFailed => {
                        warn!("no resources left to process, at least one failed permanently")
                    }
                    RunState::Running => {}
                }
                self.drained.notify_waiters();
            }
        }
    }

    /// Apply one event to the ledger. Returns the terminal state if this
    /// event drained the pending set; fires at most once per run.
    fn transition(&self, event: &LifecycleEvent) -> Option<RunState> {
        let mut ledger = self.ledger.lock();
        if ledger.state != RunState::Running {
            return None;
        }

        match event.outcome {
            Outcome::Success => {
                // Materialized at least once; later updates for this
                // resource no longer affect termination.
                ledger.pending.remove(&event.resource_id);
            }
            Outcome::Failure => {
                if ledger.pending.contains(&event.resource_id) {
                    let observed = {
                        let counter = ledger
                            .observed_retries
                            .entry(event.resource_id.clone())
                            .or_insert(0);
                        *counter += 1;
                        *counter
                    };
                    let budget = self
                        .resources
                        .get(&event.resource_id)
                        .map(|r| r.max_retries)
                        .unwrap_or(0);
                    // A non-zero budget is exhausted once observed failures
                    // strictly exceed it; zero retries forever.
                    if budget > 0 && observed > budget {
                        ledger.pending.remove(&event.resource_id);
                        ledger.failed = true;
                        warn!(
                            resource_id = %event.resource_id,
                            observed, budget, "retry budget exhausted"
                        );
                    }
                }
            }
        }

        if ledger.pending.is_empty() {
            let terminal = if ledger.failed {
                RunState::DrainedFailed
            } else {
                RunState::DrainedOk
            };
            ledger.state = terminal;
            Some(terminal)
        } else {
            None
        }
    }

    async fn wait_drained(&self) -> RunState {
        // Register for notification before checking the state, so a
        // transition firing in between is never missed.
        loop {
            let notified = self.drained.notified();
            let state = self.state();
            if state != RunState::Running {
                return state;
            }
            notified.await;
        }
    }
}
