//! The result tree: branch → segment → metric kind → metric → outcome.
//!
//! [`ResultTreeBuilder`] creates every slot up front from the configuration,
//! fills slots as metrics are processed, and only hands out the
//! [`ResultTree`] once no slot is left pending.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::config::{AnalysisConfig, HistogramKind};
use super::stats::{ConfidenceInterval, EffectSize, TestStatistic, WelchResult};
use super::uplift::{ThresholdUplift, UpliftCurve};
use crate::error::{AnalysisError, Result};
use crate::histogram::density::Distribution;
use crate::histogram::moments::Moments;
use crate::histogram::quantiles::QuantilePoint;
use crate::histogram::CategoricalHistogram;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Histogram,
    Categorical,
    Event,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Histogram => write!(f, "histogram"),
            MetricKind::Categorical => write!(f, "categorical"),
            MetricKind::Event => write!(f, "event"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisTests {
    pub welch_t: WelchResult,
    pub cohens_d: EffectSize,
    /// Placeholders; always zeroed with `implemented == false`.
    pub mann_whitney_u: TestStatistic,
    pub chi_squared: TestStatistic,
    pub kolmogorov_smirnov: TestStatistic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UpliftOutcome {
    Computed(UpliftCurve),
    Failed { error: String },
}

/// Treatment-vs-control fields. Absent on the control branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub tests: HypothesisTests,
    pub mean_uplift_percent: f64,
    pub quantile_uplift: Vec<ThresholdUplift>,
    pub uplift: UpliftOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericalResult {
    pub mean: f64,
    pub variance: f64,
    pub std: f64,
    pub n: u64,
    pub se: f64,
    pub confidence: ConfidenceInterval,
    pub pdf: Distribution,
    pub quantiles: Vec<QuantilePoint>,
    /// Buckets dropped by phantom-bucket cleanup.
    pub removed_buckets: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
}

impl NumericalResult {
    pub fn moments(&self) -> Moments {
        Moments {
            mean: self.mean,
            variance: self.variance,
            std: self.std,
            n: self.n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MetricResult {
    Numerical(NumericalResult),
    Categorical(CategoricalHistogram),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "lowercase")]
pub enum MetricSlot {
    Pending,
    Done(MetricResult),
    Failed { error: String },
}

pub type MetricTable = IndexMap<String, MetricSlot>;
pub type SegmentResults = IndexMap<MetricKind, MetricTable>;
pub type BranchResults = IndexMap<String, SegmentResults>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTree {
    pub slug: String,
    pub control: String,
    /// Milliseconds since the Unix epoch.
    pub generated_at: i64,
    pub branches: IndexMap<String, BranchResults>,
}

impl ResultTree {
    pub fn get(&self, branch: &str, segment: &str, kind: MetricKind, metric: &str) -> Option<&MetricSlot> {
        self.branches.get(branch)?.get(segment)?.get(&kind)?.get(metric)
    }

    pub fn numerical(
        &self,
        branch: &str,
        segment: &str,
        kind: MetricKind,
        metric: &str,
    ) -> Option<&NumericalResult> {
        match self.get(branch, segment, kind, metric)? {
            MetricSlot::Done(MetricResult::Numerical(r)) => Some(r),
            _ => None,
        }
    }

    /// `(branch, segment, kind, metric, error)` for every failed slot.
    pub fn failures(&self) -> Vec<(&str, &str, MetricKind, &str, &str)> {
        let mut out = Vec::new();
        for (branch, segments) in &self.branches {
            for (segment, kinds) in segments {
                for (kind, metrics) in kinds {
                    for (metric, slot) in metrics {
                        if let MetricSlot::Failed { error } = slot {
                            out.push((
                                branch.as_str(),
                                segment.as_str(),
                                *kind,
                                metric.as_str(),
                                error.as_str(),
                            ));
                        }
                    }
                }
            }
        }
        out
    }
}

/// Resolves a metric name to the kind it was configured with.
pub fn metric_kind(config: &AnalysisConfig, metric: &str) -> Option<MetricKind> {
    if let Some(kind) = config.histograms.get(metric) {
        return Some(match kind {
            HistogramKind::Numerical => MetricKind::Histogram,
            HistogramKind::Categorical { .. } => MetricKind::Categorical,
        });
    }
    config.events.get(metric).map(|_| MetricKind::Event)
}

pub struct ResultTreeBuilder {
    tree: ResultTree,
}

impl ResultTreeBuilder {
    /// Pre-keys every (branch, segment, kind, metric) slot as pending.
    pub fn new(config: &AnalysisConfig) -> Self {
        let mut template = SegmentResults::new();
        for kind in [MetricKind::Histogram, MetricKind::Categorical, MetricKind::Event] {
            template.insert(kind, MetricTable::new());
        }
        for name in config.histograms.keys().chain(config.events.keys()) {
            if let Some(kind) = metric_kind(config, name) {
                if let Some(table) = template.get_mut(&kind) {
                    table.insert(name.clone(), MetricSlot::Pending);
                }
            }
        }

        let branches: IndexMap<String, BranchResults> = config
            .branches
            .iter()
            .map(|branch| {
                let segments: BranchResults = config
                    .segments
                    .iter()
                    .map(|segment| (segment.clone(), template.clone()))
                    .collect();
                (branch.clone(), segments)
            })
            .collect();

        Self {
            tree: ResultTree {
                slug: config.slug.clone(),
                control: config.control().to_string(),
                generated_at: chrono::Utc::now().timestamp_millis(),
                branches,
            },
        }
    }

    pub fn slot(&self, branch: &str, segment: &str, kind: MetricKind, metric: &str) -> Option<&MetricSlot> {
        self.tree.get(branch, segment, kind, metric)
    }

    pub fn numerical(
        &self,
        branch: &str,
        segment: &str,
        kind: MetricKind,
        metric: &str,
    ) -> Option<&NumericalResult> {
        self.tree.numerical(branch, segment, kind, metric)
    }

    /// Stores a metric outcome. Failures are recorded in the slot; writing to
    /// a slot the configuration never declared is fatal.
    pub fn record(
        &mut self,
        branch: &str,
        segment: &str,
        kind: MetricKind,
        metric: &str,
        outcome: Result<MetricResult>,
    ) -> Result<()> {
        let slot = self
            .tree
            .branches
            .get_mut(branch)
            .and_then(|s| s.get_mut(segment))
            .and_then(|k| k.get_mut(&kind))
            .and_then(|m| m.get_mut(metric))
            .ok_or_else(|| {
                AnalysisError::UnknownMetric(format!("{}/{}/{}/{}", branch, segment, kind, metric))
            })?;

        *slot = match outcome {
            Ok(result) => MetricSlot::Done(result),
            Err(e) => MetricSlot::Failed {
                error: e.to_string(),
            },
        };
        Ok(())
    }

    /// Returns the tree once every slot holds a result or a failure.
    pub fn finish(self) -> Result<ResultTree> {
        for (branch, segments) in &self.tree.branches {
            for (segment, kinds) in segments {
                for (kind, metrics) in kinds {
                    if let Some(metric) = metrics
                        .iter()
                        .find(|(_, slot)| matches!(slot, MetricSlot::Pending))
                        .map(|(name, _)| name)
                    {
                        return Err(AnalysisError::Incomplete(format!(
                            "{}/{}/{}/{} was never computed",
                            branch, segment, kind, metric
                        )));
                    }
                }
            }
        }
        Ok(self.tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AnalysisConfig {
        AnalysisConfig::from_json(
            r#"{
                "slug": "exp",
                "branches": ["control", "treatment"],
                "segments": ["All", "Linux"],
                "histograms": {
                    "fcp": {"kind": "numerical"},
                    "gfx": {"kind": "categorical", "labels": ["a"]}
                },
                "events": {"load": [0, 100]}
            }"#,
        )
        .unwrap()
    }

    fn categorical() -> MetricResult {
        MetricResult::Categorical(CategoricalHistogram::default())
    }

    #[test]
    fn new_tree_is_fully_keyed_and_pending() {
        let b = ResultTreeBuilder::new(&config());
        for branch in ["control", "treatment"] {
            for segment in ["All", "Linux"] {
                assert_eq!(
                    b.slot(branch, segment, MetricKind::Histogram, "fcp"),
                    Some(&MetricSlot::Pending)
                );
                assert_eq!(
                    b.slot(branch, segment, MetricKind::Categorical, "gfx"),
                    Some(&MetricSlot::Pending)
                );
                assert_eq!(
                    b.slot(branch, segment, MetricKind::Event, "load"),
                    Some(&MetricSlot::Pending)
                );
            }
        }
        assert!(b.slot("control", "All", MetricKind::Event, "fcp").is_none());
    }

    #[test]
    fn finish_rejects_pending_slots() {
        let mut b = ResultTreeBuilder::new(&config());
        b.record("control", "All", MetricKind::Categorical, "gfx", Ok(categorical()))
            .unwrap();
        let err = b.finish().unwrap_err();
        assert!(matches!(err, AnalysisError::Incomplete(_)));
    }

    #[test]
    fn record_unknown_slot_is_fatal() {
        let mut b = ResultTreeBuilder::new(&config());
        let err = b
            .record("other", "All", MetricKind::Histogram, "fcp", Ok(categorical()))
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn failures_are_recorded_and_listed() {
        let c = config();
        let mut b = ResultTreeBuilder::new(&c);
        for branch in &c.branches {
            for segment in &c.segments {
                for (kind, metric) in [
                    (MetricKind::Histogram, "fcp"),
                    (MetricKind::Categorical, "gfx"),
                    (MetricKind::Event, "load"),
                ] {
                    let outcome = if branch == "treatment" && segment == "Linux" && metric == "fcp" {
                        Err(AnalysisError::EmptyHistogram)
                    } else {
                        Ok(categorical())
                    };
                    b.record(branch, segment, kind, metric, outcome).unwrap();
                }
            }
        }
        let tree = b.finish().unwrap();
        let failures = tree.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "treatment");
        assert_eq!(failures[0].3, "fcp");
        assert_eq!(failures[0].4, "Histogram has zero total count");
        assert_eq!(tree.control, "control");
    }

    #[test]
    fn metric_kind_resolves_configuration() {
        let c = config();
        assert_eq!(metric_kind(&c, "fcp"), Some(MetricKind::Histogram));
        assert_eq!(metric_kind(&c, "gfx"), Some(MetricKind::Categorical));
        assert_eq!(metric_kind(&c, "load"), Some(MetricKind::Event));
        assert_eq!(metric_kind(&c, "nope"), None);
    }

    #[test]
    fn slots_serialize_with_status_tags() {
        let slot = MetricSlot::Failed {
            error: "boom".to_string(),
        };
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["result"]["error"], "boom");

        let json = serde_json::to_value(MetricSlot::Done(categorical())).unwrap();
        assert_eq!(json["status"], "done");
        assert_eq!(json["result"]["kind"], "categorical");
    }
}
