//! Event-stream subscribers that keep telemetry in sync.

mod counters;
mod expiry;

pub use counters::CounterObserver;
pub use expiry::ExpiryObserver;
