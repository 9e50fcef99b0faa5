//! Observ Monit - Library Root
//!
//! Health aggregation and per-request Prometheus instrumentation for HTTP
//! services. Re-exports all modules for integration tests and benchmarks.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
