//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`, then applies
//! environment variable overrides. Every field has a default so an empty
//! file (or no file) yields a runnable service.

pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::adapters::metrics::http::DEFAULT_DURATION_BUCKETS;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Service identity and bind address.
    pub service: ServiceConfig,
    /// Logging, endpoint paths and thresholds.
    pub observability: ObservabilityConfig,
    /// Dependencies checked by the readiness endpoint.
    pub probes: Vec<ProbeConfig>,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Name used in health responses and the `service` metric label.
    pub name: String,
    /// Version reported by the health endpoints.
    pub version: String,
    pub host: String,
    pub port: u16,
    /// Deployment environment (development, staging, production).
    pub environment: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "observ-monit".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            environment: "development".to_string(),
        }
    }
}

impl ServiceConfig {
    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line (production).
    #[default]
    Json,
    /// Human-readable lines (development).
    Console,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "console" => Ok(Self::Console),
            other => anyhow::bail!("unknown log format {other:?}, expected json or console"),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter (trace, debug, info, warn, error). `RUST_LOG` wins.
    pub log_level: String,
    pub log_format: LogFormat,
    pub health_path: String,
    pub ready_path: String,
    pub metrics_path: String,
    /// Requests slower than this are counted as slow.
    pub slow_request_threshold_ms: u64,
    /// Ping budget for each readiness probe.
    pub probe_timeout_ms: u64,
    /// Successful pings slower than this report degraded.
    pub probe_slow_threshold_ms: u64,
    /// Request duration histogram buckets in seconds.
    pub duration_buckets: Vec<f64>,
    /// Prefix for the business metrics.
    pub metrics_namespace: String,
    /// Export spans over OTLP.
    pub tracing_enabled: bool,
    /// OTLP gRPC collector endpoint.
    pub otlp_endpoint: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            health_path: "/health".to_string(),
            ready_path: "/ready".to_string(),
            metrics_path: "/metrics".to_string(),
            slow_request_threshold_ms: 1000,
            probe_timeout_ms: 2000,
            probe_slow_threshold_ms: 1000,
            duration_buckets: DEFAULT_DURATION_BUCKETS.to_vec(),
            metrics_namespace: "users_service".to_string(),
            tracing_enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub const fn slow_request_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_request_threshold_ms)
    }

    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub const fn probe_slow_threshold(&self) -> Duration {
        Duration::from_millis(self.probe_slow_threshold_ms)
    }
}

/// A TCP dependency checked on readiness.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Key in the readiness `checks` map.
    pub name: String,
    /// `host:port` to connect to.
    pub address: String,
}
