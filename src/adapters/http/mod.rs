//! HTTP Adapters - axum Routes and Middleware
//!
//! Exposes the health aggregator and the metric sink over HTTP, and wraps
//! every route (including the fallback) in the request metrics middleware.

pub mod extract;
pub mod health;
pub mod metrics;
pub mod middleware;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::Router;

use crate::adapters::metrics::MetricSink;
use crate::usecases::{HealthAggregator, RequestInstrumenter};

/// Paths of the built-in observability endpoints.
#[derive(Debug, Clone)]
pub struct RoutePaths {
    pub health: String,
    pub ready: String,
    pub metrics: String,
}

impl Default for RoutePaths {
    fn default() -> Self {
        Self {
            health: "/health".to_string(),
            ready: "/ready".to_string(),
            metrics: "/metrics".to_string(),
        }
    }
}

/// Merge the observability endpoints into `app` and instrument the result.
///
/// `app` must not carry its own fallback; unmatched requests get a plain
/// 404 that is still measured under the raw request path.
pub fn build_router(
    app: Router,
    aggregator: Arc<HealthAggregator>,
    sink: Arc<MetricSink>,
    instrumenter: Arc<RequestInstrumenter>,
    paths: &RoutePaths,
) -> Router {
    app.merge(health::routes(aggregator, &paths.health, &paths.ready))
        .merge(metrics::routes(sink, &paths.metrics))
        .fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(
            instrumenter,
            middleware::track_metrics,
        ))
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
