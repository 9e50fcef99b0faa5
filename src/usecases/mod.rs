//! Use Cases Layer - Observability Orchestration
//!
//! - `health_aggregator`: liveness/readiness evaluation over dependency probes
//! - `request_instrumenter`: per-request measurement and metric recording

pub mod health_aggregator;
pub mod request_instrumenter;

pub use health_aggregator::{HealthAggregator, HealthError, ProbeThresholds};
pub use request_instrumenter::{ObservedOutcome, RequestInstrumenter};
