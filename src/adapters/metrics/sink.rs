//! Metric Sink - Process-wide Prometheus Instrument Registry
//!
//! Owns every named instrument of the process and renders them in the
//! Prometheus text exposition format. Instruments are registered once at
//! startup through `&mut self`; afterwards the sink is shared behind an
//! `Arc` and all mutation goes through lock-free prometheus atomics.

use std::collections::{BTreeMap, HashMap};

use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use tracing::debug;

use super::summary::SummaryVec;
use crate::domain::{MetricEvent, MetricKind};

/// Errors raised while registering instruments.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("instrument {0} is already registered")]
    DuplicateInstrument(String),
    #[error("instrument {0} is not registered as an integer gauge")]
    MissingInstrument(String),
    #[error("prometheus registry rejected instrument: {0}")]
    Registry(#[from] prometheus::Error),
}

/// A registered instrument.
#[derive(Clone)]
pub enum Instrument {
    Counter(IntCounterVec),
    Gauge(GaugeVec),
    IntGauge(IntGauge),
    Histogram(HistogramVec),
    Summary(SummaryVec),
}

impl Instrument {
    const fn type_name(&self) -> &'static str {
        match self {
            Self::Counter(_) => "counter",
            Self::Gauge(_) | Self::IntGauge(_) => "gauge",
            Self::Histogram(_) => "histogram",
            Self::Summary(_) => "summary",
        }
    }
}

struct Entry {
    help: String,
    instrument: Instrument,
}

/// Registry of named, labeled instruments.
///
/// Instrument identity is `(name, label schema)`. Recording with an unknown
/// name, the wrong instrument kind, or a label set of the wrong cardinality
/// panics: those are programming errors in the caller.
pub struct MetricSink {
    registry: Registry,
    entries: BTreeMap<String, Entry>,
}

impl Default for MetricSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSink {
    /// Create a sink backed by a fresh registry.
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    /// Create a sink backed by an existing registry.
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            entries: BTreeMap::new(),
        }
    }

    /// Underlying prometheus registry.
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    // ── Registration (startup only) ─────────────────────────

    /// Register a monotonic counter.
    ///
    /// # Errors
    /// Fails if `name` is taken or invalid.
    pub fn register_counter(
        &mut self,
        name: &str,
        help: &str,
        labels: &[&str],
    ) -> Result<IntCounterVec, SinkError> {
        let counter = IntCounterVec::new(Opts::new(name, help), labels)?;
        self.insert(name, help, Instrument::Counter(counter.clone()))?;
        Ok(counter)
    }

    /// Register a labeled floating-point gauge.
    ///
    /// # Errors
    /// Fails if `name` is taken or invalid.
    pub fn register_gauge(
        &mut self,
        name: &str,
        help: &str,
        labels: &[&str],
    ) -> Result<GaugeVec, SinkError> {
        let gauge = GaugeVec::new(Opts::new(name, help), labels)?;
        self.insert(name, help, Instrument::Gauge(gauge.clone()))?;
        Ok(gauge)
    }

    /// Register an unlabeled integer gauge (e.g. in-flight requests).
    ///
    /// # Errors
    /// Fails if `name` is taken or invalid.
    pub fn register_int_gauge(
        &mut self,
        name: &str,
        help: &str,
    ) -> Result<IntGauge, SinkError> {
        let gauge = IntGauge::new(name, help)?;
        self.insert(name, help, Instrument::IntGauge(gauge.clone()))?;
        Ok(gauge)
    }

    /// Register a histogram with fixed bucket boundaries.
    ///
    /// # Errors
    /// Fails if `name` is taken, invalid, or buckets are not increasing.
    pub fn register_histogram(
        &mut self,
        name: &str,
        help: &str,
        labels: &[&str],
        buckets: Vec<f64>,
    ) -> Result<HistogramVec, SinkError> {
        let histogram = HistogramVec::new(HistogramOpts::new(name, help).buckets(buckets), labels)?;
        self.insert(name, help, Instrument::Histogram(histogram.clone()))?;
        Ok(histogram)
    }

    /// Register a sum/count summary.
    ///
    /// # Errors
    /// Fails if `name` is taken or invalid.
    pub fn register_summary(
        &mut self,
        name: &str,
        help: &str,
        labels: &[&str],
    ) -> Result<SummaryVec, SinkError> {
        let summary = SummaryVec::new(name, help, labels)?;
        self.insert(name, help, Instrument::Summary(summary.clone()))?;
        Ok(summary)
    }

    fn insert(&mut self, name: &str, help: &str, instrument: Instrument) -> Result<(), SinkError> {
        if self.entries.contains_key(name) {
            return Err(SinkError::DuplicateInstrument(name.to_string()));
        }

        let collector: Box<dyn Collector> = match &instrument {
            Instrument::Counter(c) => Box::new(c.clone()),
            Instrument::Gauge(g) => Box::new(g.clone()),
            Instrument::IntGauge(g) => Box::new(g.clone()),
            Instrument::Histogram(h) => Box::new(h.clone()),
            Instrument::Summary(s) => Box::new(s.clone()),
        };
        self.registry.register(collector)?;

        debug!(instrument = name, kind = instrument.type_name(), "Instrument registered");
        self.entries.insert(
            name.to_string(),
            Entry {
                help: help.to_string(),
                instrument,
            },
        );
        Ok(())
    }

    // ── Recording (any thread, no external locking) ──────────

    /// Look up an instrument by name.
    pub fn instrument(&self, name: &str) -> Option<&Instrument> {
        self.entries.get(name).map(|e| &e.instrument)
    }

    fn expect_instrument(&self, name: &str) -> &Instrument {
        match self.instrument(name) {
            Some(instrument) => instrument,
            None => panic!("metric instrument {name} is not registered"),
        }
    }

    /// Increment a counter by one.
    ///
    /// # Panics
    /// Panics if `name` is not a registered counter or the label count is
    /// wrong.
    pub fn increment(&self, name: &str, labels: &[&str]) {
        match self.expect_instrument(name) {
            Instrument::Counter(c) => c.with_label_values(labels).inc(),
            other => panic!("{name} is a {}, not a counter", other.type_name()),
        }
    }

    /// Record a value into a histogram or summary.
    ///
    /// # Panics
    /// Panics if `name` is not a registered histogram/summary or the label
    /// count is wrong.
    pub fn observe(&self, name: &str, labels: &[&str], value: f64) {
        match self.expect_instrument(name) {
            Instrument::Histogram(h) => h.with_label_values(labels).observe(value),
            Instrument::Summary(s) => s.with_label_values(labels).observe(value),
            other => panic!("{name} is a {}, not a distribution", other.type_name()),
        }
    }

    /// Overwrite a gauge.
    ///
    /// # Panics
    /// Panics if `name` is not a registered gauge or the label count is
    /// wrong.
    #[allow(clippy::cast_possible_truncation)]
    pub fn set(&self, name: &str, labels: &[&str], value: f64) {
        match self.expect_instrument(name) {
            Instrument::Gauge(g) => g.with_label_values(labels).set(value),
            Instrument::IntGauge(g) if labels.is_empty() => g.set(value as i64),
            other => panic!("{name} is a {}, not a settable gauge", other.type_name()),
        }
    }

    /// Increment an integer gauge.
    ///
    /// # Panics
    /// Panics if `name` is not a registered integer gauge.
    pub fn inc(&self, name: &str) {
        self.int_gauge(name).inc();
    }

    /// Decrement an integer gauge.
    ///
    /// # Panics
    /// Panics if `name` is not a registered integer gauge.
    pub fn dec(&self, name: &str) {
        self.int_gauge(name).dec();
    }

    /// Handle to a registered integer gauge.
    ///
    /// # Panics
    /// Panics if `name` is not a registered integer gauge.
    pub fn int_gauge(&self, name: &str) -> &IntGauge {
        match self.expect_instrument(name) {
            Instrument::IntGauge(g) => g,
            other => panic!("{name} is a {}, not an integer gauge", other.type_name()),
        }
    }

    /// Apply a derived metric event.
    ///
    /// # Panics
    /// Panics if the event does not fit the registered instrument.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn record(&self, event: &MetricEvent) {
        let labels: HashMap<&str, &str> = event
            .labels
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();

        match (event.kind, self.expect_instrument(event.name)) {
            (MetricKind::Increment, Instrument::Counter(c)) => {
                c.with(&labels).inc_by(event.value.max(0.0) as u64);
            }
            (MetricKind::Increment, Instrument::IntGauge(g)) => g.add(event.value as i64),
            (MetricKind::Observe, Instrument::Histogram(h)) => h.with(&labels).observe(event.value),
            (MetricKind::Observe, Instrument::Summary(s)) => s.with(&labels).observe(event.value),
            (MetricKind::Set, Instrument::Gauge(g)) => g.with(&labels).set(event.value),
            (MetricKind::Set, Instrument::IntGauge(g)) => g.set(event.value as i64),
            (kind, other) => panic!(
                "cannot apply {kind:?} to {} {}",
                other.type_name(),
                event.name
            ),
        }
    }

    // ── Rendering ───────────────────────────────────────────

    /// Snapshot of all instruments that hold at least one value.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render every instrument in the text exposition format.
    ///
    /// Instruments without observations still emit their HELP/TYPE header.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut families = self.gather();
        families.retain(|f| !f.get_metric().is_empty());
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        let mut output = String::from_utf8(buffer)?;

        for (name, entry) in &self.entries {
            if families.iter().any(|f| f.get_name() == name) {
                continue;
            }
            output.push_str(&format!(
                "# HELP {name} {}\n# TYPE {name} {}\n",
                escape_help(&entry.help),
                entry.instrument.type_name()
            ));
        }

        Ok(output)
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', r"\\").replace('\n', r"\n")
}
