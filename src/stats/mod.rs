//! Aggregate statistics over the connection registry

pub mod metrics;

pub use metrics::{CounterSnapshot, ServerCounters, StatsCollector, StatsSnapshot};
