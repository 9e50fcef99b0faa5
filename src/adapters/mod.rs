//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Concrete infrastructure behind the ports and use cases:
//! - `http`: axum routes for health, readiness and metrics, plus the request
//!   metrics middleware
//! - `metrics`: Prometheus-backed metric sink and instrument sets
//! - `probes`: dependency probes implementing `ports::DependencyProbe`
//! - `telemetry`: optional OTLP span export

pub mod http;
pub mod metrics;
pub mod probes;
pub mod telemetry;
