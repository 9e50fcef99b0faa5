//! Error Classifier - Secondary Events for Failed and Slow Requests
//!
//! Pure mapping from a finished request to zero or more extra counter
//! increments. The three predicates are independent: one request can be
//! both a server error and slow.

use std::time::Duration;

use super::observation::{MetricEvent, RequestObservation, metric_names};

/// Default duration above which a request counts as slow.
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_secs(1);

/// Classifies finished requests into client-error, server-error and
/// slow-request events.
#[derive(Debug, Clone, Copy)]
pub struct ErrorClassifier {
    slow_threshold: Duration,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SLOW_THRESHOLD)
    }
}

impl ErrorClassifier {
    pub const fn new(slow_threshold: Duration) -> Self {
        Self { slow_threshold }
    }

    pub const fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }

    pub fn is_client_error(status: u16) -> bool {
        (400..500).contains(&status)
    }

    pub const fn is_server_error(status: u16) -> bool {
        status >= 500
    }

    pub fn is_slow(&self, elapsed: Duration) -> bool {
        elapsed > self.slow_threshold
    }

    /// Derive secondary events for `observation`.
    pub fn classify(&self, observation: &RequestObservation) -> Vec<MetricEvent> {
        let mut events = Vec::new();

        if Self::is_client_error(observation.status) {
            events.push(MetricEvent::increment(
                metric_names::HTTP_CLIENT_ERRORS,
                observation.status_labels(),
            ));
        }
        if Self::is_server_error(observation.status) {
            events.push(MetricEvent::increment(
                metric_names::HTTP_SERVER_ERRORS,
                observation.status_labels(),
            ));
        }
        if self.is_slow(observation.elapsed) {
            let mut labels = observation.route_labels();
            labels.push(("threshold", threshold_label(self.slow_threshold)));
            events.push(MetricEvent::increment(
                metric_names::HTTP_SLOW_REQUESTS,
                labels,
            ));
        }

        events
    }
}

/// Render a threshold as `1s`, `2.5s` or `500ms`.
pub fn threshold_label(threshold: Duration) -> String {
    let millis = threshold.as_millis();
    if millis >= 1000 {
        if millis % 1000 == 0 {
            format!("{}s", millis / 1000)
        } else {
            format!("{}s", threshold.as_secs_f64())
        }
    } else {
        format!("{millis}ms")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(status: u16, elapsed: Duration) -> RequestObservation {
        RequestObservation {
            service: "svc".to_string(),
            method: "POST".to_string(),
            route: "/users".to_string(),
            status,
            elapsed,
            request_bytes: 0,
            response_bytes: 0,
        }
    }

    #[test]
    fn test_success_fast_yields_nothing() {
        let classifier = ErrorClassifier::default();
        let events = classifier.classify(&observation(200, Duration::from_millis(20)));
        assert!(events.is_empty());
    }

    #[test]
    fn test_client_error() {
        let classifier = ErrorClassifier::default();
        for status in [400, 404, 499] {
            let events = classifier.classify(&observation(status, Duration::ZERO));
            assert_eq!(events.len(), 1, "status {status}");
            assert_eq!(events[0].name, metric_names::HTTP_CLIENT_ERRORS);
            assert_eq!(events[0].label("status"), Some(status.to_string().as_str()));
        }
    }

    #[test]
    fn test_server_error() {
        let classifier = ErrorClassifier::default();
        let events = classifier.classify(&observation(503, Duration::ZERO));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, metric_names::HTTP_SERVER_ERRORS);
    }

    #[test]
    fn test_boundaries_are_not_errors() {
        let classifier = ErrorClassifier::default();
        assert!(classifier.classify(&observation(399, Duration::ZERO)).is_empty());
        assert!(!ErrorClassifier::is_client_error(500));
        assert!(ErrorClassifier::is_server_error(500));
    }

    #[test]
    fn test_slow_and_server_error_are_independent() {
        let classifier = ErrorClassifier::default();
        let events = classifier.classify(&observation(500, Duration::from_millis(1500)));

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, metric_names::HTTP_SERVER_ERRORS);
        assert_eq!(events[1].name, metric_names::HTTP_SLOW_REQUESTS);
        assert_eq!(events[1].label("threshold"), Some("1s"));
        assert!(events[1].label("status").is_none());
    }

    #[test]
    fn test_exact_threshold_is_not_slow() {
        let classifier = ErrorClassifier::default();
        assert!(classifier.classify(&observation(200, DEFAULT_SLOW_THRESHOLD)).is_empty());
    }

    #[test]
    fn test_threshold_label_formats() {
        assert_eq!(threshold_label(Duration::from_secs(1)), "1s");
        assert_eq!(threshold_label(Duration::from_millis(2500)), "2.5s");
        assert_eq!(threshold_label(Duration::from_millis(500)), "500ms");
    }
}
