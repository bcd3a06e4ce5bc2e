//! Operational telemetry: the concurrency-safe aggregator, the text
//! exposition renderer, and the HTTP server an external collector scrapes.

mod aggregator;
mod exporter;
mod server;

pub use aggregator::{
    Aggregator, AuthCounters, CounterKind, MetricDesc, MetricKind, MetricsSnapshot,
    StageCounters, TelemetryError, DESCRIPTORS,
};
pub use exporter::render;
pub use server::{build_routes, serve, TelemetryState};
