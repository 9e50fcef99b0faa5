//! OpenTelemetry Span Export - OTLP/gRPC Tracer Provider
//!
//! When `observability.tracing_enabled` is set, spans recorded through
//! `tracing` are also exported to an OTLP collector, tagged with the
//! service name, version and environment. Disabled by default.

use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::{Resource, runtime};
use tracing::{info, warn};

use crate::config::AppConfig;

/// Owns the tracer provider for the life of the process.
///
/// Call `shutdown` once the server has stopped so buffered spans are
/// flushed to the collector.
#[derive(Debug, Default)]
pub struct Telemetry {
    provider: Option<TracerProvider>,
    service: String,
}

impl Telemetry {
    /// Build the OTLP exporter and install the global tracer provider.
    ///
    /// Returns a no-op handle when tracing is disabled. Must run inside a
    /// tokio runtime, the batch exporter spawns onto it.
    ///
    /// # Errors
    /// Fails if the OTLP exporter cannot be built for the endpoint.
    pub fn init(config: &AppConfig) -> Result<Self> {
        let obs = &config.observability;
        if !obs.tracing_enabled {
            return Ok(Self::default());
        }

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(obs.otlp_endpoint.clone())
            .build()
            .with_context(|| format!("Failed to build OTLP exporter for {}", obs.otlp_endpoint))?;

        let provider = TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_sampler(Sampler::AlwaysOn)
            .with_resource(resource(config))
            .build();
        global::set_tracer_provider(provider.clone());

        Ok(Self {
            provider: Some(provider),
            service: config.service.name.clone(),
        })
    }

    /// Tracer for the `tracing-opentelemetry` layer, if export is enabled.
    pub fn tracer(&self) -> Option<Tracer> {
        self.provider
            .as_ref()
            .map(|provider| provider.tracer(self.service.clone()))
    }

    pub const fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Flush pending spans and stop the exporter.
    pub fn shutdown(self) {
        let Some(provider) = self.provider else {
            return;
        };
        match provider.shutdown() {
            Ok(()) => info!("Span exporter flushed"),
            Err(e) => warn!(error = %e, "Span exporter shutdown failed"),
        }
    }
}

/// Resource attributes attached to every exported span.
fn resource(config: &AppConfig) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", config.service.name.clone()),
        KeyValue::new("service.version", config.service.version.clone()),
        KeyValue::new("deployment.environment", config.service.environment.clone()),
    ])
}
