//! Request metrics middleware.
//!
//! Adapts axum requests to the `RequestInstrumenter`: resolves the matched
//! route template, opens a span with the request id, and echoes the id on
//! the response.

use std::sync::Arc;

use axum::body::{Body, HttpBody};
use axum::extract::{MatchedPath, Request, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::domain::RequestMeta;
use crate::usecases::{ObservedOutcome, RequestInstrumenter};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

impl ObservedOutcome for Response {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }

    fn response_bytes(&self) -> u64 {
        body_size(self.body(), self.headers())
    }
}

/// Middleware measuring every request that reaches the router.
///
/// Install with `axum::middleware::from_fn_with_state` via `Router::layer`
/// so unmatched requests (the fallback) are measured too.
pub async fn track_metrics(
    State(instrumenter): State<Arc<RequestInstrumenter>>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);

    let meta = RequestMeta {
        method: request.method().to_string(),
        route: request
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string()),
        path: request.uri().path().to_string(),
        request_bytes: body_size(request.body(), request.headers()),
    };

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %meta.method,
        route = %meta.route_label(),
    );

    let measured = instrumenter.instrument(meta, next.run(request));
    let mut response = tracing::Instrument::instrument(measured, span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Exact body size when known, else the `Content-Length` header, else 0.
fn body_size(body: &Body, headers: &HeaderMap) -> u64 {
    body.size_hint().exact().unwrap_or_else(|| {
        headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    })
}
