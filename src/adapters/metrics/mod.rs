//! Metrics Adapters
//!
//! Prometheus-backed metric sink, the summary collector it needs, and the
//! instrument sets registered on it at startup (HTTP and business metrics).

pub mod business;
pub mod http;
pub mod sink;
pub mod summary;

pub use business::UserMetrics;
pub use http::HttpMetrics;
pub use sink::{Instrument, MetricSink, SinkError};
pub use summary::SummaryVec;
