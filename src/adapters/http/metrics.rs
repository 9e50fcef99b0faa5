//! Prometheus scrape endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, TextEncoder};
use tracing::error;

use crate::adapters::metrics::MetricSink;

/// Route serving the text exposition of every instrument on `sink`.
pub fn routes(sink: Arc<MetricSink>, metrics_path: &str) -> Router {
    Router::new()
        .route(metrics_path, get(scrape))
        .with_state(sink)
}

async fn scrape(State(sink): State<Arc<MetricSink>>) -> Response {
    match sink.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
