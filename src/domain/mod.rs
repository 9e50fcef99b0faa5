//! Domain layer - Health and request observation models.
//!
//! Pure types and functions with no I/O (hexagonal architecture inner ring).
//! Everything here is testable in isolation.

pub mod classifier;
pub mod health;
pub mod observation;
pub mod query;

pub use classifier::ErrorClassifier;
pub use health::{CheckDetail, HealthResponse, HealthStatus};
pub use observation::{MetricEvent, MetricKind, RequestMeta, RequestObservation};
pub use query::{HasDefaults, ListQuery};
