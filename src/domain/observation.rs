//! Per-request observation records and the metric events derived from them.
//!
//! A `RequestObservation` lives only for the duration of one request. It is
//! turned into a list of `MetricEvent`s that the metric sink applies; events
//! are never stored.

use std::time::Duration;

/// Names of the HTTP instruments. Registration and recording share these.
pub mod metric_names {
    pub const HTTP_REQUESTS_TOTAL: &str = "http_request_total";
    pub const HTTP_REQUEST_DURATION: &str = "http_request_duration_seconds";
    pub const HTTP_REQUEST_SIZE: &str = "http_request_size_bytes";
    pub const HTTP_RESPONSE_SIZE: &str = "http_response_size_bytes";
    pub const HTTP_ACTIVE_CONNECTIONS: &str = "http_active_connections";
    pub const HTTP_CLIENT_ERRORS: &str = "http_client_errors_total";
    pub const HTTP_SERVER_ERRORS: &str = "http_server_errors_total";
    pub const HTTP_SLOW_REQUESTS: &str = "http_slow_requests_total";
}

/// How an event mutates its instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Add `value` to a counter.
    Increment,
    /// Record `value` into a histogram or summary.
    Observe,
    /// Overwrite a gauge with `value`.
    Set,
}

/// One labeled mutation of a named instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvent {
    pub name: &'static str,
    pub labels: Vec<(&'static str, String)>,
    pub value: f64,
    pub kind: MetricKind,
}

impl MetricEvent {
    pub fn increment(name: &'static str, labels: Vec<(&'static str, String)>) -> Self {
        Self {
            name,
            labels,
            value: 1.0,
            kind: MetricKind::Increment,
        }
    }

    pub fn observe(
        name: &'static str,
        labels: Vec<(&'static str, String)>,
        value: f64,
    ) -> Self {
        Self {
            name,
            labels,
            value,
            kind: MetricKind::Observe,
        }
    }

    pub fn set(
        name: &'static str,
        labels: Vec<(&'static str, String)>,
        value: f64,
    ) -> Self {
        Self {
            name,
            labels,
            value,
            kind: MetricKind::Set,
        }
    }

    /// Value of the label `name`, if present.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Request attributes known before the handler runs.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    /// HTTP method, e.g. `GET`.
    pub method: String,
    /// Registered route template (`/users/:id`), `None` if nothing matched.
    pub route: Option<String>,
    /// Literal request path (`/users/42`).
    pub path: String,
    /// Request body size, best effort.
    pub request_bytes: u64,
}

impl RequestMeta {
    /// Label used for the `path` dimension.
    ///
    /// The route template bounds cardinality to the number of registered
    /// routes. The raw path is used only when no route matched, which is the
    /// single place unbounded values may reach the metrics backend.
    pub fn route_label(&self) -> &str {
        match self.route.as_deref() {
            Some(route) if !route.is_empty() => route,
            _ => &self.path,
        }
    }
}

/// Everything measured about one finished request.
#[derive(Debug, Clone)]
pub struct RequestObservation {
    pub service: String,
    pub method: String,
    pub route: String,
    pub status: u16,
    pub elapsed: Duration,
    pub request_bytes: u64,
    pub response_bytes: u64,
}

impl RequestObservation {
    pub fn new(
        service: &str,
        meta: &RequestMeta,
        status: u16,
        elapsed: Duration,
        response_bytes: u64,
    ) -> Self {
        Self {
            service: service.to_string(),
            method: meta.method.clone(),
            route: meta.route_label().to_string(),
            status,
            elapsed,
            request_bytes: meta.request_bytes,
            response_bytes,
        }
    }

    /// `service, method, path` label set.
    pub fn route_labels(&self) -> Vec<(&'static str, String)> {
        vec![
            ("service", self.service.clone()),
            ("method", self.method.clone()),
            ("path", self.route.clone()),
        ]
    }

    /// `service, method, path, status` label set.
    pub fn status_labels(&self) -> Vec<(&'static str, String)> {
        let mut labels = self.route_labels();
        labels.push(("status", self.status.to_string()));
        labels
    }

    /// Primary events: total count, duration, request and response size.
    #[allow(clippy::cast_precision_loss)]
    pub fn events(&self) -> Vec<MetricEvent> {
        use metric_names::*;

        vec![
            MetricEvent::increment(HTTP_REQUESTS_TOTAL, self.status_labels()),
            MetricEvent::observe(
                HTTP_REQUEST_DURATION,
                self.status_labels(),
                self.elapsed.as_secs_f64(),
            ),
            MetricEvent::observe(
                HTTP_REQUEST_SIZE,
                self.route_labels(),
                self.request_bytes as f64,
            ),
            MetricEvent::observe(
                HTTP_RESPONSE_SIZE,
                self.route_labels(),
                self.response_bytes as f64,
            ),
        ]
    }
}
