//! Labeled sum/count summary collector.
//!
//! The prometheus crate ships no summary type, so this collector keeps a
//! sample count and sample sum per label set and exports them as a
//! `summary` family without quantiles. Used for request/response sizes
//! where only the mean matters.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use prometheus::core::{Collector, Desc};
use prometheus::proto::{self, LabelPair, MetricFamily, MetricType};

/// Point-in-time count and sum of one label set.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Snapshot {
    count: u64,
    sum: f64,
}

/// Sample count and sum for one label set, updated and read together so
/// every export satisfies `sum / count` for the same set of samples.
#[derive(Debug, Default)]
struct SummaryCell {
    state: Mutex<Snapshot>,
}

impl SummaryCell {
    fn observe(&self, value: f64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.count += 1;
        state.sum += value;
    }

    fn snapshot(&self) -> Snapshot {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct SummaryCore {
    desc: Desc,
    label_names: Vec<String>,
    cells: RwLock<BTreeMap<Vec<String>, Arc<SummaryCell>>>,
}

/// Handle to one label set of a `SummaryVec`.
#[derive(Debug, Clone)]
pub struct Summary {
    cell: Arc<SummaryCell>,
}

impl Summary {
    pub fn observe(&self, value: f64) {
        self.cell.observe(value);
    }

    pub fn sample_count(&self) -> u64 {
        self.cell.snapshot().count
    }

    pub fn sample_sum(&self) -> f64 {
        self.cell.snapshot().sum
    }
}

/// A summary partitioned by a fixed label schema.
///
/// Cheap to clone; clones share the same cells.
#[derive(Clone)]
pub struct SummaryVec {
    core: Arc<SummaryCore>,
}

impl SummaryVec {
    /// Create a summary vector with the given label schema.
    ///
    /// # Errors
    /// Returns an error if the name or label names are not valid metric
    /// identifiers.
    pub fn new(name: &str, help: &str, label_names: &[&str]) -> prometheus::Result<Self> {
        let label_names: Vec<String> = label_names.iter().map(|l| (*l).to_string()).collect();
        let desc = Desc::new(
            name.to_string(),
            help.to_string(),
            label_names.clone(),
            HashMap::new(),
        )?;

        Ok(Self {
            core: Arc::new(SummaryCore {
                desc,
                label_names,
                cells: RwLock::new(BTreeMap::new()),
            }),
        })
    }

    /// Summary for label values given in schema order.
    ///
    /// # Panics
    /// Panics if the number of values differs from the label schema.
    pub fn with_label_values(&self, values: &[&str]) -> Summary {
        assert_eq!(
            values.len(),
            self.core.label_names.len(),
            "inconsistent label cardinality for {}: expected {} values, got {}",
            self.core.desc.fq_name,
            self.core.label_names.len(),
            values.len(),
        );
        let key: Vec<String> = values.iter().map(|v| (*v).to_string()).collect();
        self.cell_for(key)
    }

    /// Summary for a label map keyed by label name.
    ///
    /// # Panics
    /// Panics if the map does not contain exactly the schema's labels.
    pub fn with(&self, labels: &HashMap<&str, &str>) -> Summary {
        assert_eq!(
            labels.len(),
            self.core.label_names.len(),
            "inconsistent label cardinality for {}",
            self.core.desc.fq_name,
        );
        let key = self
            .core
            .label_names
            .iter()
            .map(|name| match labels.get(name.as_str()) {
                Some(value) => (*value).to_string(),
                None => panic!(
                    "label {name} missing for {}",
                    self.core.desc.fq_name
                ),
            })
            .collect();
        self.cell_for(key)
    }

    fn cell_for(&self, key: Vec<String>) -> Summary {
        {
            let cells = self
                .core
                .cells
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(cell) = cells.get(&key) {
                return Summary {
                    cell: Arc::clone(cell),
                };
            }
        }

        let mut cells = self
            .core
            .cells
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let cell = cells.entry(key).or_default();
        Summary {
            cell: Arc::clone(cell),
        }
    }
}

impl Collector for SummaryVec {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.core.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let cells = self
            .core
            .cells
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if cells.is_empty() {
            return Vec::new();
        }

        let mut metrics = Vec::with_capacity(cells.len());
        for (values, cell) in cells.iter() {
            let mut pairs: Vec<LabelPair> = self
                .core
                .label_names
                .iter()
                .zip(values)
                .map(|(name, value)| {
                    let mut pair = LabelPair::default();
                    pair.set_name(name.clone());
                    pair.set_value(value.clone());
                    pair
                })
                .collect();
            pairs.sort_by(|a, b| a.get_name().cmp(b.get_name()));

            let Snapshot { count, sum } = cell.snapshot();
            let mut summary = proto::Summary::default();
            summary.set_sample_count(count);
            summary.set_sample_sum(sum);

            let mut metric = proto::Metric::default();
            metric.set_label(pairs.into());
            metric.set_summary(summary);
            metrics.push(metric);
        }

        let mut family = MetricFamily::default();
        family.set_name(self.core.desc.fq_name.clone());
        family.set_help(self.core.desc.help.clone());
        family.set_field_type(MetricType::SUMMARY);
        family.set_metric(metrics.into());
        vec![family]
    }
}
