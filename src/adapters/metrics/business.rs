//! Business metrics for the users resource.

use prometheus::{HistogramVec, IntCounterVec};

use super::sink::{MetricSink, SinkError};

/// Buckets for database query latency in seconds.
pub const DB_QUERY_BUCKETS: [f64; 8] = [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0];

/// Counters for user lifecycle events and a database latency histogram,
/// all prefixed with a namespace (e.g. `users_service_users_created_total`).
#[derive(Clone)]
pub struct UserMetrics {
    pub users_created: IntCounterVec,
    pub users_deleted: IntCounterVec,
    pub users_updated: IntCounterVec,
    /// Query latency by operation (`insert`, `select`, ...).
    pub db_query_duration: HistogramVec,
}

impl UserMetrics {
    /// Register the user metrics under `namespace`.
    ///
    /// # Errors
    /// Fails if the names clash with existing instruments.
    pub fn register(sink: &mut MetricSink, namespace: &str) -> Result<Self, SinkError> {
        let prefix = metric_prefix(namespace);

        Ok(Self {
            users_created: sink.register_counter(
                &format!("{prefix}users_created_total"),
                "Total number of users created",
                &[],
            )?,
            users_deleted: sink.register_counter(
                &format!("{prefix}users_deleted_total"),
                "Total number of users deleted",
                &[],
            )?,
            users_updated: sink.register_counter(
                &format!("{prefix}users_updated_total"),
                "Total number of users updated",
                &[],
            )?,
            db_query_duration: sink.register_histogram(
                &format!("{prefix}database_query_duration_seconds"),
                "Duration of database queries in seconds",
                &["operation"],
                DB_QUERY_BUCKETS.to_vec(),
            )?,
        })
    }

    pub fn user_created(&self) {
        self.users_created.with_label_values(&[]).inc();
    }

    pub fn user_deleted(&self) {
        self.users_deleted.with_label_values(&[]).inc();
    }

    pub fn user_updated(&self) {
        self.users_updated.with_label_values(&[]).inc();
    }

    pub fn observe_query(&self, operation: &str, seconds: f64) {
        self.db_query_duration
            .with_label_values(&[operation])
            .observe(seconds);
    }
}

/// `users-service` becomes `users_service_`; empty stays empty.
fn metric_prefix(namespace: &str) -> String {
    if namespace.is_empty() {
        return String::new();
    }
    let cleaned: String = namespace
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{cleaned}_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_sanitizes_namespace() {
        assert_eq!(metric_prefix("users-service"), "users_service_");
        assert_eq!(metric_prefix(""), "");
    }

    #[test]
    fn test_user_counters_render_with_namespace() {
        let mut sink = MetricSink::new();
        let metrics = UserMetrics::register(&mut sink, "users-service").unwrap();

        metrics.user_created();
        metrics.user_created();
        metrics.user_deleted();
        metrics.observe_query("insert", 0.004);

        let text = sink.render().unwrap();
        assert!(text.contains("users_service_users_created_total 2"));
        assert!(text.contains("users_service_users_deleted_total 1"));
        assert!(text.contains("# TYPE users_service_users_updated_total counter"));
        assert!(text.contains(
            "users_service_database_query_duration_seconds_count{operation=\"insert\"} 1"
        ));
    }
}
