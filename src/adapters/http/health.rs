//! Health Check Endpoints - Liveness and Readiness Probes
//!
//! Serves the aggregator's responses as JSON: 200 when healthy, 503 when
//! degraded or unhealthy. Paths come from configuration.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tracing::{debug, info};

use crate::domain::HealthResponse;
use crate::usecases::HealthAggregator;

/// Routes for the liveness and readiness endpoints.
pub fn routes(aggregator: Arc<HealthAggregator>, health_path: &str, ready_path: &str) -> Router {
    info!(
        health_path,
        ready_path,
        "Registering health check routes"
    );

    Router::new()
        .route(health_path, get(liveness))
        .route(ready_path, get(readiness))
        .with_state(aggregator)
}

/// Liveness probe: always healthy while the process runs.
async fn liveness(State(aggregator): State<Arc<HealthAggregator>>) -> impl IntoResponse {
    let response = aggregator.liveness();
    debug!(status = %response.status, endpoint = "liveness", "Health check performed");
    into_http(response)
}

/// Readiness probe: reflects dependency state.
async fn readiness(State(aggregator): State<Arc<HealthAggregator>>) -> impl IntoResponse {
    let response = aggregator.readiness().await;
    debug!(status = %response.status, endpoint = "readiness", "Readiness check performed");
    into_http(response)
}

fn into_http(response: HealthResponse) -> (StatusCode, Json<HealthResponse>) {
    let status =
        StatusCode::from_u16(response.http_status()).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
    (status, Json(response))
}
