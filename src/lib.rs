//! keysync: a sidecar that keeps locally materialized secrets (files,
//! environment entries, hook invocations) synchronized with a
//! secret-management backend.
//!
//! An external watcher authenticates to the backend and emits one
//! [`LifecycleEvent`](events::LifecycleEvent) per fetch/renew attempt. This
//! crate is everything downstream of that stream: the fan-out
//! [`Fabric`](events::Fabric), the one-shot [`RunCoordinator`](coordinator::RunCoordinator),
//! the [`Aggregator`](telemetry::Aggregator) with its pull-based `/metrics`
//! exposition, and the [`Sidecar`](runtime::Sidecar) runtime that wires them
//! together.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod events;
pub mod logging;
pub mod observers;
pub mod output;
pub mod resources;
pub mod runtime;
pub mod telemetry;
pub mod watcher;

pub use config::Config;
pub use coordinator::{RunCoordinator, RunState};
pub use events::{Fabric, LifecycleEvent, Outcome};
pub use resources::{Resource, ResourceKind};
pub use runtime::Sidecar;
pub use telemetry::Aggregator;
