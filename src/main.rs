//! Observ Monit - Entry Point
//!
//! Serves health, readiness and Prometheus endpoints, every request
//! measured by the metrics middleware. Host services mount their own
//! routes through `build_router`. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml (path from OBSERV_CONFIG) + env overrides + validate
//! 2. Init tracing (JSON or console logs, optional OTLP span export)
//! 3. Register HTTP and business instruments on the metric sink
//! 4. Build the health aggregator with the configured TCP probes
//! 5. Build the router and the request instrumenter
//! 6. Serve until SIGINT, drain in-flight requests, flush spans

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use observ_monit::adapters::http::{RoutePaths, build_router};
use observ_monit::adapters::metrics::{HttpMetrics, MetricSink, UserMetrics};
use observ_monit::adapters::probes::TcpProbe;
use observ_monit::adapters::telemetry::Telemetry;
use observ_monit::config::{self, AppConfig, LogFormat};
use observ_monit::domain::ErrorClassifier;
use observ_monit::usecases::{HealthAggregator, ProbeThresholds, RequestInstrumenter};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path =
        std::env::var("OBSERV_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = config::loader::load_config_or_default(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured logging ────────────────────
    let telemetry = Telemetry::init(&config).context("Failed to initialize span export")?;
    init_tracing(&config, &telemetry);

    info!(
        name = %config.service.name,
        version = %config.service.version,
        environment = %config.service.environment,
        config = %config_path,
        probes = config.probes.len(),
        span_export = telemetry.is_enabled(),
        "Starting service"
    );

    // ── 3. Metric sink and instruments ──────────────────────
    let mut sink = MetricSink::new();
    HttpMetrics::register(&mut sink, config.observability.duration_buckets.clone())
        .context("Failed to register HTTP metrics")?;
    // Business instruments show up (HELP/TYPE only) before the first write.
    UserMetrics::register(&mut sink, &config.observability.metrics_namespace)
        .context("Failed to register business metrics")?;
    let sink = Arc::new(sink);

    // ── 4. Health aggregator with dependency probes ─────────
    let aggregator = Arc::new(build_aggregator(&config)?);

    // ── 5. Router + request instrumenter ────────────────────
    let instrumenter = Arc::new(
        RequestInstrumenter::new(
            Arc::clone(&sink),
            config.service.name.clone(),
            ErrorClassifier::new(config.observability.slow_request_threshold()),
        )
        .context("Failed to build request instrumenter")?,
    );
    let paths = RoutePaths {
        health: config.observability.health_path.clone(),
        ready: config.observability.ready_path.clone(),
        metrics: config.observability.metrics_path.clone(),
    };
    let app = build_router(Router::new(), aggregator, sink, instrumenter, &paths);

    // ── 6. Serve until SIGINT ───────────────────────────────
    let address = config.service.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!(
        address = %address,
        health = %paths.health,
        ready = %paths.ready,
        metrics = %paths.metrics,
        "HTTP server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    telemetry.shutdown();
    info!("Shutdown complete");
    Ok(())
}

/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(config: &AppConfig, telemetry: &Telemetry) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let fmt_layer = match config.observability.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Console => tracing_subscriber::fmt::layer().with_target(false).boxed(),
    };
    let otel_layer = telemetry
        .tracer()
        .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(fmt_layer)
        .init();
}

fn build_aggregator(config: &AppConfig) -> Result<HealthAggregator> {
    let thresholds = ProbeThresholds {
        timeout: config.observability.probe_timeout(),
        slow: config.observability.probe_slow_threshold(),
    };
    let mut aggregator =
        HealthAggregator::new(config.service.name.clone(), config.service.version.clone())
            .with_thresholds(thresholds);

    for probe in &config.probes {
        aggregator
            .register(probe.name.clone(), Arc::new(TcpProbe::new(probe.address.clone())))
            .context("Failed to register dependency probe")?;
        info!(probe = %probe.name, address = %probe.address, "Dependency probe configured");
    }
    if config.probes.is_empty() {
        warn!("No dependency probes configured, readiness reports healthy");
    }
    Ok(aggregator)
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for SIGINT, serving until killed");
        std::future::pending::<()>().await;
    }
    info!("SIGINT received, draining in-flight requests");
}
