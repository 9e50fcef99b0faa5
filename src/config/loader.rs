//! Configuration Loader - File Loading, Overrides and Validation
//!
//! Handles loading `config.toml`, applying environment overrides,
//! validating all parameters, and providing clear error messages for
//! misconfiguration.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};

use super::AppConfig;

/// Load, override and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - An environment override is malformed
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
    let path = Path::new(path);

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    finish(parse_config(&content)?)
}

/// Like `load_config`, but a missing file yields the defaults.
///
/// # Errors
/// Same as `load_config` for every failure other than a missing file.
pub fn load_config_or_default(path: &str) -> Result<AppConfig> {
    if Path::new(path).exists() {
        load_config(path)
    } else {
        finish(AppConfig::default())
    }
}

fn finish(mut config: AppConfig) -> Result<AppConfig> {
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse TOML content without overrides or validation.
///
/// # Errors
/// Fails on malformed TOML or mistyped fields.
pub fn parse_config(content: &str) -> Result<AppConfig> {
    toml::from_str(content).context("Failed to parse config.toml")
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Recognized: `SERVICE_HOST`, `SERVICE_PORT`, `ENVIRONMENT`, `LOG_LEVEL`,
/// `LOG_FORMAT`, `HEALTH_PATH`, `READY_PATH`, `METRICS_PATH`,
/// `TRACING_ENABLED`, `OTLP_ENDPOINT`.
///
/// # Errors
/// Fails if `SERVICE_PORT`, `LOG_FORMAT` or `TRACING_ENABLED` cannot be parsed.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let service = &mut config.service;
    let observability = &mut config.observability;

    if let Some(host) = lookup("SERVICE_HOST") {
        service.host = host;
    }
    if let Some(port) = lookup("SERVICE_PORT") {
        service.port = port
            .parse()
            .with_context(|| format!("SERVICE_PORT is not a valid port: {port}"))?;
    }
    if let Some(environment) = lookup("ENVIRONMENT") {
        service.environment = environment;
    }
    if let Some(level) = lookup("LOG_LEVEL") {
        observability.log_level = level;
    }
    if let Some(format) = lookup("LOG_FORMAT") {
        observability.log_format = format.parse().context("Invalid LOG_FORMAT")?;
    }
    if let Some(path) = lookup("HEALTH_PATH") {
        observability.health_path = path;
    }
    if let Some(path) = lookup("READY_PATH") {
        observability.ready_path = path;
    }
    if let Some(path) = lookup("METRICS_PATH") {
        observability.metrics_path = path;
    }
    if let Some(enabled) = lookup("TRACING_ENABLED") {
        observability.tracing_enabled = enabled
            .parse()
            .with_context(|| format!("TRACING_ENABLED must be true or false, got {enabled}"))?;
    }
    if let Some(endpoint) = lookup("OTLP_ENDPOINT") {
        observability.otlp_endpoint = endpoint;
    }
    Ok(())
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-empty service identity
/// - Absolute, distinct endpoint paths
/// - Positive thresholds, probe slow threshold below the probe timeout
/// - An http(s) OTLP endpoint when tracing is enabled
/// - Strictly increasing histogram buckets
/// - Unique, non-empty probe definitions
///
/// # Errors
/// Returns the first violated rule.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    anyhow::ensure!(
        !config.service.name.trim().is_empty(),
        "service.name must not be empty"
    );
    anyhow::ensure!(config.service.port > 0, "service.port must be non-zero");

    let obs = &config.observability;
    let paths = [
        ("health_path", &obs.health_path),
        ("ready_path", &obs.ready_path),
        ("metrics_path", &obs.metrics_path),
    ];
    for (field, path) in paths {
        anyhow::ensure!(
            path.starts_with('/'),
            "observability.{field} must start with '/', got {path:?}"
        );
    }
    let distinct: HashSet<&String> = paths.iter().map(|(_, p)| *p).collect();
    anyhow::ensure!(
        distinct.len() == paths.len(),
        "health_path, ready_path and metrics_path must be distinct"
    );

    anyhow::ensure!(
        obs.slow_request_threshold_ms > 0,
        "slow_request_threshold_ms must be positive"
    );
    anyhow::ensure!(obs.probe_timeout_ms > 0, "probe_timeout_ms must be positive");
    anyhow::ensure!(
        obs.probe_slow_threshold_ms > 0,
        "probe_slow_threshold_ms must be positive"
    );
    anyhow::ensure!(
        obs.probe_slow_threshold_ms < obs.probe_timeout_ms,
        "probe_slow_threshold_ms ({}) must be below probe_timeout_ms ({})",
        obs.probe_slow_threshold_ms,
        obs.probe_timeout_ms
    );

    if obs.tracing_enabled {
        anyhow::ensure!(
            obs.otlp_endpoint.starts_with("http://") || obs.otlp_endpoint.starts_with("https://"),
            "otlp_endpoint must be an http(s) URL when tracing is enabled, got {:?}",
            obs.otlp_endpoint
        );
    }

    anyhow::ensure!(
        !obs.duration_buckets.is_empty(),
        "duration_buckets must not be empty"
    );
    anyhow::ensure!(
        obs.duration_buckets.windows(2).all(|w| w[0] < w[1]),
        "duration_buckets must be strictly increasing, got {:?}",
        obs.duration_buckets
    );

    let mut names = HashSet::new();
    for (i, probe) in config.probes.iter().enumerate() {
        anyhow::ensure!(!probe.name.is_empty(), "Probe {i} has an empty name");
        anyhow::ensure!(
            !probe.address.is_empty(),
            "Probe {} has an empty address",
            probe.name
        );
        anyhow::ensure!(
            names.insert(probe.name.as_str()),
            "Probe name {} is configured twice",
            probe.name
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::LogFormat;

    const SAMPLE: &str = r#"
[service]
name = "users-api"
version = "1.4.2"
port = 9000

[observability]
log_format = "console"
slow_request_threshold_ms = 250

[[probes]]
name = "db"
address = "127.0.0.1:5432"
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = load_config("nonexistent.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config_or_default("definitely-not-here.toml").unwrap();
        assert!(!config.service.name.is_empty());
    }

    #[test]
    fn test_parse_fills_unset_fields() {
        let config = parse_config(SAMPLE).unwrap();

        assert_eq!(config.service.name, "users-api");
        assert_eq!(config.service.port, 9000);
        assert_eq!(config.service.host, "0.0.0.0");
        assert_eq!(config.observability.log_format, LogFormat::Console);
        assert_eq!(config.observability.slow_request_threshold_ms, 250);
        assert_eq!(config.observability.probe_timeout_ms, 2000);
        assert_eq!(config.observability.health_path, "/health");
        assert_eq!(config.probes.len(), 1);
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_empty_file_is_valid() {
        let config = parse_config("").unwrap();
        validate_config(&config).unwrap();
        assert_eq!(config.service.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_env_overrides_win() {
        let mut config = parse_config(SAMPLE).unwrap();
        apply_env_overrides(
            &mut config,
            env(&[
                ("SERVICE_PORT", "7070"),
                ("LOG_FORMAT", "json"),
                ("METRICS_PATH", "/internal/metrics"),
                ("ENVIRONMENT", "production"),
            ]),
        )
        .unwrap();

        assert_eq!(config.service.port, 7070);
        assert_eq!(config.service.environment, "production");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.metrics_path, "/internal/metrics");
    }

    #[test]
    fn test_bad_port_override_is_rejected() {
        let mut config = AppConfig::default();
        let result = apply_env_overrides(&mut config, env(&[("SERVICE_PORT", "eighty")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_log_format_is_rejected() {
        assert!(parse_config("[observability]\nlog_format = \"xml\"").is_err());
    }

    #[test]
    fn test_relative_path_is_rejected() {
        let mut config = AppConfig::default();
        config.observability.ready_path = "ready".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_colliding_paths_are_rejected() {
        let mut config = AppConfig::default();
        config.observability.ready_path = config.observability.health_path.clone();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_unsorted_buckets_are_rejected() {
        let mut config = AppConfig::default();
        config.observability.duration_buckets = vec![0.1, 0.05, 1.0];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_duplicate_probe_names_are_rejected() {
        let config = parse_config(
            r#"
[[probes]]
name = "db"
address = "a:1"

[[probes]]
name = "db"
address = "b:2"
"#,
        )
        .unwrap();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_slow_threshold_at_or_above_timeout_is_rejected() {
        let mut config = AppConfig::default();
        config.observability.probe_timeout_ms = 500;

        config.observability.probe_slow_threshold_ms = 500;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("probe_slow_threshold_ms (500)"));

        config.observability.probe_slow_threshold_ms = 800;
        assert!(validate_config(&config).is_err());

        config.observability.probe_slow_threshold_ms = 499;
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_tracing_is_off_by_default() {
        let config = parse_config("").unwrap();
        assert!(!config.observability.tracing_enabled);
        assert_eq!(config.observability.otlp_endpoint, "http://localhost:4317");
    }

    #[test]
    fn test_tracing_env_overrides() {
        let mut config = AppConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("TRACING_ENABLED", "true"),
                ("OTLP_ENDPOINT", "http://collector:4317"),
            ]),
        )
        .unwrap();

        assert!(config.observability.tracing_enabled);
        assert_eq!(config.observability.otlp_endpoint, "http://collector:4317");
        validate_config(&config).unwrap();

        let result = apply_env_overrides(&mut config, env(&[("TRACING_ENABLED", "yes")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_enabled_tracing_needs_http_endpoint() {
        let mut config = parse_config(
            r#"
[observability]
tracing_enabled = true
otlp_endpoint = "collector:4317"
"#,
        )
        .unwrap();
        assert!(validate_config(&config).is_err());

        config.observability.tracing_enabled = false;
        validate_config(&config).unwrap();
    }
}
