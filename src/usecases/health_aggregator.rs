//! Health Aggregator - Liveness and Readiness Evaluation
//!
//! Owns the named dependency probes and folds their results into a single
//! three-valued status. Liveness never touches a probe. Readiness pings
//! every probe concurrently, each bounded by the probe timeout, and never
//! propagates a probe failure: it is absorbed into the `CheckDetail`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::domain::health::{CheckDetail, HealthResponse};
use crate::ports::DependencyProbe;

/// Default budget for a single probe ping.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default latency above which a successful ping counts as degraded.
pub const DEFAULT_PROBE_SLOW_THRESHOLD: Duration = Duration::from_secs(1);

/// Errors raised while configuring the aggregator.
#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("a probe named {0} is already registered")]
    DuplicateProbe(String),
}

/// Timing limits applied to every probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbeThresholds {
    /// Ping budget; exceeding it is treated as a failure.
    pub timeout: Duration,
    /// Successful pings slower than this are degraded.
    pub slow: Duration,
}

impl Default for ProbeThresholds {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PROBE_TIMEOUT,
            slow: DEFAULT_PROBE_SLOW_THRESHOLD,
        }
    }
}

/// Computes liveness and readiness responses for one service.
pub struct HealthAggregator {
    service: String,
    version: String,
    thresholds: ProbeThresholds,
    /// Registration order is kept for log output.
    probes: Vec<(String, Arc<dyn DependencyProbe>)>,
}

impl HealthAggregator {
    /// Create an aggregator with no probes and default thresholds.
    pub fn new(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
            thresholds: ProbeThresholds::default(),
            probes: Vec::new(),
        }
    }

    /// Replace the probe thresholds.
    #[must_use]
    pub const fn with_thresholds(mut self, thresholds: ProbeThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// Attach a probe under a unique name.
    ///
    /// # Errors
    /// Duplicate names are rejected; the first registration is kept.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        probe: Arc<dyn DependencyProbe>,
    ) -> Result<(), HealthError> {
        let name = name.into();
        if self.probes.iter().any(|(existing, _)| *existing == name) {
            return Err(HealthError::DuplicateProbe(name));
        }
        debug!(probe = %name, "Dependency probe registered");
        self.probes.push((name, probe));
        Ok(())
    }

    /// Liveness: healthy whenever the process can answer. No I/O.
    pub fn liveness(&self) -> HealthResponse {
        HealthResponse::healthy(&self.service, &self.version)
    }

    /// Readiness: the most severe status across all probes.
    ///
    /// With no probes this is identical to `liveness`. Every call is an
    /// independent evaluation.
    #[instrument(skip(self), fields(service = %self.service, probes = self.probes.len()))]
    pub async fn readiness(&self) -> HealthResponse {
        if self.probes.is_empty() {
            return self.liveness();
        }

        let results = join_all(
            self.probes
                .iter()
                .map(|(name, probe)| self.check(name, probe.as_ref())),
        )
        .await;

        let checks: BTreeMap<String, CheckDetail> = self
            .probes
            .iter()
            .map(|(name, _)| name.clone())
            .zip(results)
            .collect();

        let response = HealthResponse::from_checks(&self.service, &self.version, checks);
        debug!(status = %response.status, "Readiness evaluated");
        response
    }

    /// Ping one probe and classify the outcome.
    async fn check(&self, name: &str, probe: &dyn DependencyProbe) -> CheckDetail {
        let ProbeThresholds { timeout, slow } = self.thresholds;
        let start = Instant::now();
        let outcome = tokio::time::timeout(timeout, probe.ping(timeout)).await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(())) if elapsed > slow => {
                warn!(
                    probe = name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Dependency responded slowly"
                );
                CheckDetail::degraded(elapsed, slow)
            }
            Ok(Ok(())) => CheckDetail::healthy(elapsed, probe.stats()),
            Ok(Err(e)) => {
                warn!(probe = name, error = %e, "Dependency ping failed");
                CheckDetail::unhealthy(elapsed, e.to_string())
            }
            Err(_) => {
                warn!(
                    probe = name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Dependency ping timed out"
                );
                CheckDetail::unhealthy(
                    elapsed,
                    format!("ping timed out after {}ms", timeout.as_millis()),
                )
            }
        }
    }
}
