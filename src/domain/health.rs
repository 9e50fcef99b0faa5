//! Health status types shared by the aggregator and the HTTP adapters.
//!
//! A `HealthResponse` is built fresh for every liveness/readiness call and
//! never mutated afterwards. Its JSON shape is the public contract of the
//! `/health` and `/ready` endpoints.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Three-valued service status.
///
/// Variant order is the severity order: `Healthy < Degraded < Unhealthy`.
/// Aggregation takes the maximum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// HTTP status code reported for this status: 200 only when healthy.
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Healthy => 200,
            Self::Degraded | Self::Unhealthy => 503,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Result of probing a single dependency.
#[derive(Debug, Clone, Serialize)]
pub struct CheckDetail {
    /// Status of this dependency.
    pub status: HealthStatus,
    /// Time spent waiting on the probe, including a timeout.
    #[serde(rename = "response_time_ms", serialize_with = "serialize_millis")]
    pub response_time: Duration,
    /// Human readable summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error text when the probe failed or timed out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Probe statistics snapshot, only for fast successful pings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

impl CheckDetail {
    pub fn healthy(
        response_time: Duration,
        details: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            status: HealthStatus::Healthy,
            response_time,
            message: Some("dependency is healthy".to_string()),
            error: None,
            details: (!details.is_empty()).then_some(details),
        }
    }

    pub fn degraded(response_time: Duration, threshold: Duration) -> Self {
        Self {
            status: HealthStatus::Degraded,
            response_time,
            message: Some(format!(
                "dependency responded slowly (over {}ms)",
                threshold.as_millis()
            )),
            error: None,
            details: None,
        }
    }

    pub fn unhealthy(response_time: Duration, error: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            response_time,
            message: Some("dependency is unreachable".to_string()),
            error: Some(error.into()),
            details: None,
        }
    }
}

/// Top-level body of a liveness or readiness answer.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub service: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Per-dependency results, absent when nothing was probed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<BTreeMap<String, CheckDetail>>,
}

impl HealthResponse {
    /// Response with no dependency checks.
    pub fn healthy(service: &str, version: &str) -> Self {
        Self {
            status: HealthStatus::Healthy,
            timestamp: Utc::now(),
            service: service.to_string(),
            version: version.to_string(),
            checks: None,
        }
    }

    /// Response whose status is the most severe of `checks`.
    pub fn from_checks(
        service: &str,
        version: &str,
        checks: BTreeMap<String, CheckDetail>,
    ) -> Self {
        let status = aggregate(checks.values().map(|c| c.status));
        Self {
            status,
            timestamp: Utc::now(),
            service: service.to_string(),
            version: version.to_string(),
            checks: (!checks.is_empty()).then_some(checks),
        }
    }

    pub const fn http_status(&self) -> u16 {
        self.status.http_status()
    }
}

/// Fold statuses into the most severe one. Empty input is healthy.
pub fn aggregate(statuses: impl IntoIterator<Item = HealthStatus>) -> HealthStatus {
    statuses
        .into_iter()
        .fold(HealthStatus::Healthy, HealthStatus::max)
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(HealthStatus::Healthy < HealthStatus::Degraded);
        assert!(HealthStatus::Degraded < HealthStatus::Unhealthy);
    }

    #[test]
    fn test_aggregate_empty_is_healthy() {
        assert_eq!(aggregate([]), HealthStatus::Healthy);
    }

    #[test]
    fn test_aggregate_never_moves_down() {
        let status = aggregate([
            HealthStatus::Healthy,
            HealthStatus::Unhealthy,
            HealthStatus::Degraded,
            HealthStatus::Healthy,
        ]);
        assert_eq!(status, HealthStatus::Unhealthy);
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(HealthStatus::Healthy.http_status(), 200);
        assert_eq!(HealthStatus::Degraded.http_status(), 503);
        assert_eq!(HealthStatus::Unhealthy.http_status(), 503);
    }

    #[test]
    fn test_response_json_without_checks() {
        let response = HealthResponse::healthy("users-service", "1.0.0");
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "users-service");
        assert_eq!(json["version"], "1.0.0");
        assert!(json.get("checks").is_none());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_check_detail_json_shape() {
        let mut checks = BTreeMap::new();
        checks.insert(
            "db".to_string(),
            CheckDetail::unhealthy(Duration::from_millis(12), "connection refused"),
        );
        let response = HealthResponse::from_checks("svc", "", checks);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "unhealthy");
        assert!(json.get("version").is_none());
        assert_eq!(json["checks"]["db"]["status"], "unhealthy");
        assert_eq!(json["checks"]["db"]["response_time_ms"], 12);
        assert_eq!(json["checks"]["db"]["error"], "connection refused");
        assert!(json["checks"]["db"].get("details").is_none());
    }

    #[test]
    fn test_healthy_detail_drops_empty_stats() {
        let detail = CheckDetail::healthy(Duration::from_millis(3), HashMap::new());
        assert!(detail.details.is_none());
        assert!(detail.error.is_none());
    }
}
