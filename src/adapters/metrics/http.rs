//! HTTP Request Instruments - Standard Per-request Metric Set
//!
//! Registers the instruments the request instrumenter records into:
//! request count, latency, body sizes, in-flight gauge and the derived
//! client-error, server-error and slow-request counters.

use prometheus::{HistogramVec, IntCounterVec, IntGauge};

use super::sink::{MetricSink, SinkError};
use super::summary::SummaryVec;
use crate::domain::observation::metric_names::*;

/// Prometheus default latency buckets in seconds.
pub const DEFAULT_DURATION_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

const ROUTE_LABELS: [&str; 3] = ["service", "method", "path"];
const STATUS_LABELS: [&str; 4] = ["service", "method", "path", "status"];
const SLOW_LABELS: [&str; 4] = ["service", "method", "path", "threshold"];

/// Handles to the HTTP instruments.
///
/// All metrics are labeled by route template, never by the raw path, except
/// for requests that matched no route.
#[derive(Clone)]
pub struct HttpMetrics {
    /// Total requests by status.
    pub requests_total: IntCounterVec,
    /// Request latency histogram (seconds).
    pub request_duration: HistogramVec,
    /// Request body size summary (bytes).
    pub request_size: SummaryVec,
    /// Response body size summary (bytes).
    pub response_size: SummaryVec,
    /// Requests currently being handled.
    pub active_requests: IntGauge,
    /// 4xx responses.
    pub client_errors: IntCounterVec,
    /// 5xx responses.
    pub server_errors: IntCounterVec,
    /// Requests slower than the configured threshold.
    pub slow_requests: IntCounterVec,
}

impl HttpMetrics {
    /// Register every HTTP instrument on `sink`.
    ///
    /// # Errors
    /// Fails if any of the names is already registered.
    pub fn register(sink: &mut MetricSink, duration_buckets: Vec<f64>) -> Result<Self, SinkError> {
        let requests_total = sink.register_counter(
            HTTP_REQUESTS_TOTAL,
            "Total number of HTTP requests",
            &STATUS_LABELS,
        )?;

        let request_duration = sink.register_histogram(
            HTTP_REQUEST_DURATION,
            "HTTP request duration in seconds",
            &STATUS_LABELS,
            duration_buckets,
        )?;

        let request_size = sink.register_summary(
            HTTP_REQUEST_SIZE,
            "HTTP request size in bytes",
            &ROUTE_LABELS,
        )?;

        let response_size = sink.register_summary(
            HTTP_RESPONSE_SIZE,
            "HTTP response size in bytes",
            &ROUTE_LABELS,
        )?;

        let active_requests = sink.register_int_gauge(
            HTTP_ACTIVE_CONNECTIONS,
            "Number of HTTP requests currently in flight",
        )?;

        let client_errors = sink.register_counter(
            HTTP_CLIENT_ERRORS,
            "Total number of HTTP 4xx responses",
            &STATUS_LABELS,
        )?;

        let server_errors = sink.register_counter(
            HTTP_SERVER_ERRORS,
            "Total number of HTTP 5xx responses",
            &STATUS_LABELS,
        )?;

        let slow_requests = sink.register_counter(
            HTTP_SLOW_REQUESTS,
            "Total number of HTTP requests slower than the threshold",
            &SLOW_LABELS,
        )?;

        Ok(Self {
            requests_total,
            request_duration,
            request_size,
            response_size,
            active_requests,
            client_errors,
            server_errors,
            slow_requests,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_instruments() {
        let mut sink = MetricSink::new();
        let metrics = HttpMetrics::register(&mut sink, DEFAULT_DURATION_BUCKETS.to_vec()).unwrap();

        assert!(sink.instrument(HTTP_REQUESTS_TOTAL).is_some());
        assert!(sink.instrument(HTTP_SLOW_REQUESTS).is_some());
        assert_eq!(metrics.active_requests.get(), 0);

        let text = sink.render().unwrap();
        for name in [
            HTTP_REQUESTS_TOTAL,
            HTTP_REQUEST_DURATION,
            HTTP_REQUEST_SIZE,
            HTTP_RESPONSE_SIZE,
            HTTP_CLIENT_ERRORS,
            HTTP_SERVER_ERRORS,
            HTTP_SLOW_REQUESTS,
        ] {
            assert!(text.contains(&format!("# TYPE {name}")), "missing {name}");
        }
    }

    #[test]
    fn test_in_flight_gauge_keeps_dashboard_name() {
        let mut sink = MetricSink::new();
        HttpMetrics::register(&mut sink, DEFAULT_DURATION_BUCKETS.to_vec()).unwrap();

        let text = sink.render().unwrap();
        assert!(text.contains("# TYPE http_active_connections gauge"));
        assert!(text.contains("http_active_connections 0"));
    }

    #[test]
    fn test_register_twice_fails() {
        let mut sink = MetricSink::new();
        HttpMetrics::register(&mut sink, DEFAULT_DURATION_BUCKETS.to_vec()).unwrap();
        assert!(HttpMetrics::register(&mut sink, DEFAULT_DURATION_BUCKETS.to_vec()).is_err());
    }
}
