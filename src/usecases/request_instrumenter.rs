//! Request Instrumenter - Per-request Metrics Bracket
//!
//! Wraps the inner handler future: tracks the in-flight gauge, measures
//! latency, records the primary request metrics plus the classifier's
//! derived events, and hands the handler's output back untouched.
//!
//! The in-flight gauge is held by a drop guard, so it is released on the
//! happy path, on panic unwinding and when the request future is dropped
//! mid-flight (client disconnect, timeout layer).

use std::future::Future;
use std::sync::Arc;

use prometheus::IntGauge;
use tokio::time::Instant;
use tracing::trace;

use crate::adapters::metrics::{Instrument, MetricSink, SinkError};
use crate::domain::observation::metric_names;
use crate::domain::{ErrorClassifier, RequestMeta, RequestObservation};

/// What the instrumenter needs to know about a handler's output.
pub trait ObservedOutcome {
    /// Final HTTP status code.
    fn status_code(&self) -> u16;

    /// Response body size, best effort.
    fn response_bytes(&self) -> u64 {
        0
    }
}

impl<T: ObservedOutcome, E: ObservedOutcome> ObservedOutcome for Result<T, E> {
    fn status_code(&self) -> u16 {
        match self {
            Ok(v) => v.status_code(),
            Err(e) => e.status_code(),
        }
    }

    fn response_bytes(&self) -> u64 {
        match self {
            Ok(v) => v.response_bytes(),
            Err(e) => e.response_bytes(),
        }
    }
}

/// Increments the in-flight gauge on creation and decrements it on drop.
struct InFlightGuard<'a> {
    gauge: &'a IntGauge,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(gauge: &'a IntGauge) -> Self {
        gauge.inc();
        Self { gauge }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

/// Measures every request and records into the shared metric sink.
pub struct RequestInstrumenter {
    sink: Arc<MetricSink>,
    classifier: ErrorClassifier,
    service: String,
    active: IntGauge,
}

impl RequestInstrumenter {
    /// Create an instrumenter over a sink that already holds the HTTP
    /// instruments.
    ///
    /// # Errors
    /// Returns `SinkError::MissingInstrument` if the in-flight gauge is not
    /// registered on `sink` as an integer gauge.
    pub fn new(
        sink: Arc<MetricSink>,
        service: impl Into<String>,
        classifier: ErrorClassifier,
    ) -> Result<Self, SinkError> {
        let active = match sink.instrument(metric_names::HTTP_ACTIVE_CONNECTIONS) {
            Some(Instrument::IntGauge(gauge)) => gauge.clone(),
            _ => {
                return Err(SinkError::MissingInstrument(
                    metric_names::HTTP_ACTIVE_CONNECTIONS.to_string(),
                ));
            }
        };
        Ok(Self {
            sink,
            classifier,
            service: service.into(),
            active,
        })
    }

    pub fn sink(&self) -> &Arc<MetricSink> {
        &self.sink
    }

    pub const fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Run `handler` inside the measurement bracket and return its output.
    pub async fn instrument<F>(&self, meta: RequestMeta, handler: F) -> F::Output
    where
        F: Future,
        F::Output: ObservedOutcome,
    {
        let start = Instant::now();
        let _in_flight = InFlightGuard::acquire(&self.active);

        let outcome = handler.await;

        let observation = RequestObservation::new(
            &self.service,
            &meta,
            outcome.status_code(),
            start.elapsed(),
            outcome.response_bytes(),
        );
        self.record(&observation);

        outcome
    }

    /// Record the primary and derived events of a finished request.
    pub fn record(&self, observation: &RequestObservation) {
        for event in observation.events() {
            self.sink.record(&event);
        }
        for event in self.classifier.classify(observation) {
            self.sink.record(&event);
        }

        trace!(
            method = %observation.method,
            route = %observation.route,
            status = observation.status,
            elapsed_ms = observation.elapsed.as_millis() as u64,
            "Request recorded"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;
    use crate::adapters::metrics::http::{DEFAULT_DURATION_BUCKETS, HttpMetrics};

    #[derive(Debug, PartialEq)]
    struct Reply {
        status: u16,
        body: &'static str,
    }

    impl ObservedOutcome for Reply {
        fn status_code(&self) -> u16 {
            self.status
        }

        fn response_bytes(&self) -> u64 {
            self.body.len() as u64
        }
    }

    #[derive(Debug, PartialEq)]
    struct Failure(u16);

    impl ObservedOutcome for Failure {
        fn status_code(&self) -> u16 {
            self.0
        }
    }

    fn setup() -> (RequestInstrumenter, HttpMetrics) {
        let mut sink = MetricSink::new();
        let metrics = HttpMetrics::register(&mut sink, DEFAULT_DURATION_BUCKETS.to_vec()).unwrap();
        let instrumenter =
            RequestInstrumenter::new(Arc::new(sink), "users", ErrorClassifier::default()).unwrap();
        (instrumenter, metrics)
    }

    fn meta(route: Option<&str>, path: &str) -> RequestMeta {
        RequestMeta {
            method: "GET".to_string(),
            route: route.map(str::to_string),
            path: path.to_string(),
            request_bytes: 12,
        }
    }

    #[tokio::test]
    async fn test_records_route_template() {
        let (instrumenter, metrics) = setup();

        let reply = instrumenter
            .instrument(meta(Some("/users/:id"), "/users/42"), async {
                Reply {
                    status: 200,
                    body: "hello",
                }
            })
            .await;

        assert_eq!(reply.status, 200);
        assert_eq!(
            metrics
                .requests_total
                .with_label_values(&["users", "GET", "/users/:id", "200"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .requests_total
                .with_label_values(&["users", "GET", "/users/42", "200"])
                .get(),
            0
        );
        let size = metrics
            .response_size
            .with_label_values(&["users", "GET", "/users/:id"]);
        assert_eq!(size.sample_count(), 1);
        assert!((size.sample_sum() - 5.0).abs() < f64::EPSILON);
        assert_eq!(metrics.active_requests.get(), 0);
    }

    #[tokio::test]
    async fn test_unmatched_route_uses_raw_path() {
        let (instrumenter, metrics) = setup();

        instrumenter
            .instrument(meta(None, "/does-not-exist"), async {
                Reply {
                    status: 404,
                    body: "",
                }
            })
            .await;

        assert_eq!(
            metrics
                .requests_total
                .with_label_values(&["users", "GET", "/does-not-exist", "404"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .client_errors
                .with_label_values(&["users", "GET", "/does-not-exist", "404"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_handler_error_is_returned_unchanged() {
        let (instrumenter, metrics) = setup();

        let result: Result<Reply, Failure> = instrumenter
            .instrument(meta(Some("/users"), "/users"), async { Err(Failure(503)) })
            .await;

        assert_eq!(result, Err(Failure(503)));
        assert_eq!(
            metrics
                .server_errors
                .with_label_values(&["users", "GET", "/users", "503"])
                .get(),
            1
        );
        assert_eq!(metrics.active_requests.get(), 0);
    }

    #[tokio::test]
    async fn test_gauge_tracks_in_flight_requests() {
        let (instrumenter, metrics) = setup();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let mut request = task::spawn(instrumenter.instrument(meta(Some("/slow"), "/slow"), async {
            rx.await.ok();
            Reply {
                status: 200,
                body: "",
            }
        }));

        assert_pending!(request.poll());
        assert_eq!(metrics.active_requests.get(), 1);

        tx.send(()).unwrap();
        assert!(request.is_woken());
        assert_ready!(request.poll());
        assert_eq!(metrics.active_requests.get(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_request_releases_gauge() {
        let (instrumenter, metrics) = setup();

        let never = instrumenter.instrument(meta(Some("/hang"), "/hang"), async {
            std::future::pending::<()>().await;
            Reply {
                status: 200,
                body: "",
            }
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), never).await;

        assert!(timed_out.is_err());
        assert_eq!(metrics.active_requests.get(), 0);
        assert_eq!(
            metrics
                .requests_total
                .with_label_values(&["users", "GET", "/hang", "200"])
                .get(),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_request_emits_one_slow_event() {
        let (instrumenter, metrics) = setup();

        instrumenter
            .instrument(meta(Some("/report"), "/report"), async {
                tokio::time::sleep(Duration::from_millis(1200)).await;
                Reply {
                    status: 200,
                    body: "ok",
                }
            })
            .await;

        assert_eq!(
            metrics
                .slow_requests
                .with_label_values(&["users", "GET", "/report", "1s"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .request_duration
                .with_label_values(&["users", "GET", "/report", "200"])
                .get_sample_count(),
            1
        );
    }

    #[test]
    fn test_new_without_in_flight_gauge_fails() {
        let sink = Arc::new(MetricSink::new());

        let result = RequestInstrumenter::new(sink, "users", ErrorClassifier::default());

        assert!(matches!(
            result,
            Err(SinkError::MissingInstrument(name)) if name == metric_names::HTTP_ACTIVE_CONNECTIONS
        ));
    }

    #[test]
    fn test_new_rejects_in_flight_name_of_wrong_kind() {
        let mut sink = MetricSink::new();
        sink.register_counter(metric_names::HTTP_ACTIVE_CONNECTIONS, "Wrong kind", &["service"])
            .unwrap();

        let result = RequestInstrumenter::new(Arc::new(sink), "users", ErrorClassifier::default());

        assert!(matches!(result, Err(SinkError::MissingInstrument(_))));
    }
}
