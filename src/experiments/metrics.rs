//! The analysis pass for an experiment.
//!
//! One sweep over branches × segments × metrics fills a [`ResultTree`]. The
//! control branch is processed first so every later branch can be compared
//! against its already-computed summary. Per-metric failures land in their
//! slot and the sweep carries on; configuration-level failures abort it.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::config::{AnalysisConfig, EventRange, HistogramKind, UpliftSettings};
use super::results::{
    Comparison, HypothesisTests, MetricKind, MetricResult, NumericalResult, ResultTree,
    ResultTreeBuilder, UpliftOutcome,
};
use super::samples::{filter_to_range, BucketLayout};
use super::stats;
use super::uplift::{quantile_grid, relative_change_percent, spline_uplift, threshold_uplift};
use crate::error::{AnalysisError, Result};
use crate::histogram::cleanup::{label_categorical, remove_phantom_buckets};
use crate::histogram::moments::{bucket_moments, sample_moments, Moments};
use crate::histogram::density::{self, Distribution};
use crate::histogram::quantiles::{histogram_quantiles, sample_quantiles, QuantilePoint};
use crate::histogram::Histogram;
use crate::telemetry::TelemetrySource;

// ── Pure summaries ──────────────────────────────────────────────────

fn summary(
    moments: Moments,
    pdf: Distribution,
    quantiles: Vec<QuantilePoint>,
    removed_buckets: usize,
    confidence_level: f64,
) -> NumericalResult {
    NumericalResult {
        mean: moments.mean,
        variance: moments.variance,
        std: moments.std,
        n: moments.n,
        se: moments.standard_error(),
        confidence: stats::confidence_interval(&moments, confidence_level),
        pdf,
        quantiles,
        removed_buckets,
        comparison: None,
    }
}

/// Cleans, summarizes and takes quantiles of one numerical histogram.
/// Moments, density and quantiles all see the cleaned histogram.
pub fn summarize_histogram(
    histogram: &Histogram,
    thresholds: &[f64],
    confidence_level: f64,
) -> Result<NumericalResult> {
    let (cleaned, removed) = remove_phantom_buckets(histogram);
    let moments = bucket_moments(cleaned.bins(), cleaned.counts())?;
    let pdf = density::estimate(&cleaned)?;
    let quantiles = histogram_quantiles(&pdf.values, &pdf.cdf, thresholds);
    Ok(summary(moments, pdf, quantiles, removed, confidence_level))
}

/// Summarizes already range-filtered event samples. Moments and quantiles
/// come from the raw samples; the density comes from `layout`.
pub fn summarize_samples(
    samples: &[f64],
    layout: &BucketLayout,
    thresholds: &[f64],
    confidence_level: f64,
) -> Result<NumericalResult> {
    let moments = sample_moments(samples)?;
    let pdf = density::estimate(&layout.bucketize(samples)?)?;
    let quantiles = sample_quantiles(samples, thresholds);
    Ok(summary(moments, pdf, quantiles, 0, confidence_level))
}

/// Treatment-vs-control statistics for one metric.
///
/// A spline that cannot be fitted only fails the uplift curve; the rest of
/// the comparison is still returned.
pub fn compare(
    metric: &str,
    treatment: &NumericalResult,
    control: &NumericalResult,
    settings: &UpliftSettings,
    grid: &[f64],
) -> Result<Comparison> {
    let (t, c) = (treatment.moments(), control.moments());
    let welch_t = stats::welch_t_test(&t, &c);
    let tests = HypothesisTests {
        cohens_d: stats::effect_size(&t, &c, welch_t.p_value),
        welch_t,
        mann_whitney_u: stats::mann_whitney_u(&treatment.pdf, &control.pdf),
        chi_squared: stats::chi_squared(&treatment.pdf, &control.pdf),
        kolmogorov_smirnov: stats::kolmogorov_smirnov(&treatment.pdf, &control.pdf),
    };

    let quantile_uplift = threshold_uplift(metric, &control.quantiles, &treatment.quantiles)?;
    let uplift = match spline_uplift(&control.quantiles, &treatment.quantiles, settings.degree, grid) {
        Ok(curve) => UpliftOutcome::Computed(curve),
        Err(e) => {
            warn!(metric, error = %e, "uplift curve unavailable");
            UpliftOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    Ok(Comparison {
        tests,
        mean_uplift_percent: relative_change_percent(treatment.mean, control.mean),
        quantile_uplift,
        uplift,
    })
}

// ── Sweep ───────────────────────────────────────────────────────────

struct Sweep<'a, S: ?Sized> {
    config: &'a AnalysisConfig,
    source: &'a S,
    grid: Vec<f64>,
    /// Event bucket layouts keyed by (segment, metric), set by the first
    /// branch that produces samples.
    layouts: HashMap<(String, String), BucketLayout>,
    builder: ResultTreeBuilder,
}

impl<'a, S: TelemetrySource + ?Sized> Sweep<'a, S> {
    fn missing(branch: &str, segment: &str, metric: &str) -> AnalysisError {
        AnalysisError::MissingData {
            branch: branch.to_string(),
            segment: segment.to_string(),
            metric: metric.to_string(),
        }
    }

    fn with_comparison(
        &self,
        kind: MetricKind,
        branch: &str,
        segment: &str,
        metric: &str,
        mut result: NumericalResult,
    ) -> Result<NumericalResult> {
        if self.config.is_control(branch) {
            return Ok(result);
        }
        let control = self
            .builder
            .numerical(self.config.control(), segment, kind, metric)
            .ok_or_else(|| AnalysisError::ControlUnavailable {
                segment: segment.to_string(),
                metric: metric.to_string(),
            })?;
        result.comparison = Some(compare(
            metric,
            &result,
            control,
            &self.config.uplift,
            &self.grid,
        )?);
        Ok(result)
    }

    fn numerical(&self, branch: &str, segment: &str, metric: &str) -> Result<MetricResult> {
        let raw = self
            .source
            .histogram(branch, segment, metric)
            .ok_or_else(|| Self::missing(branch, segment, metric))?;
        let histogram = Histogram::try_from(raw)?;
        let result = summarize_histogram(
            &histogram,
            &self.config.quantiles,
            self.config.confidence_level,
        )?;
        if result.removed_buckets > 0 {
            warn!(
                branch,
                segment,
                metric,
                removed = result.removed_buckets,
                "dropped phantom buckets"
            );
        }
        let result = self.with_comparison(MetricKind::Histogram, branch, segment, metric, result)?;
        Ok(MetricResult::Numerical(result))
    }

    fn categorical(
        &self,
        branch: &str,
        segment: &str,
        metric: &str,
        labels: &[String],
    ) -> Result<MetricResult> {
        let raw = self
            .source
            .histogram(branch, segment, metric)
            .ok_or_else(|| Self::missing(branch, segment, metric))?;
        let histogram = Histogram::try_from(raw)?;
        Ok(MetricResult::Categorical(label_categorical(
            metric, &histogram, labels,
        )?))
    }

    fn event(
        &mut self,
        branch: &str,
        segment: &str,
        metric: &str,
        range: EventRange,
    ) -> Result<MetricResult> {
        let raw = self
            .source
            .samples(branch, segment, metric)
            .ok_or_else(|| Self::missing(branch, segment, metric))?;
        let samples = filter_to_range(&raw, range);
        if samples.is_empty() {
            return Err(AnalysisError::NoSamples {
                min: range.min(),
                max: range.max(),
            });
        }

        let key = (segment.to_string(), metric.to_string());
        let layout = match self.layouts.get(&key) {
            Some(layout) => *layout,
            None => {
                let layout = BucketLayout::from_samples(&samples, self.config.event_bins)?;
                debug!(segment, metric, buckets = layout.buckets, "event bucket layout fixed");
                self.layouts.insert(key, layout);
                layout
            }
        };

        let result = summarize_samples(
            &samples,
            &layout,
            &self.config.quantiles,
            self.config.confidence_level,
        )?;
        let result = self.with_comparison(MetricKind::Event, branch, segment, metric, result)?;
        Ok(MetricResult::Numerical(result))
    }

    fn store(
        &mut self,
        branch: &str,
        segment: &str,
        kind: MetricKind,
        metric: &str,
        outcome: Result<MetricResult>,
    ) -> Result<()> {
        match &outcome {
            Err(e) if e.is_fatal() => return Err(e.clone()),
            Err(e) => warn!(branch, segment, %kind, metric, error = %e, "metric failed"),
            Ok(_) => debug!(branch, segment, %kind, metric, "metric computed"),
        }
        self.builder.record(branch, segment, kind, metric, outcome)
    }

    fn run(mut self) -> Result<ResultTree> {
        let config = self.config;
        for branch in &config.branches {
            info!(
                slug = %config.slug,
                branch = %branch,
                control = config.is_control(branch),
                "analyzing branch"
            );
            for segment in &config.segments {
                for (metric, kind) in &config.histograms {
                    let (kind, outcome) = match kind {
                        HistogramKind::Numerical => {
                            (MetricKind::Histogram, self.numerical(branch, segment, metric))
                        }
                        HistogramKind::Categorical { labels } => (
                            MetricKind::Categorical,
                            self.categorical(branch, segment, metric, labels),
                        ),
                    };
                    self.store(branch, segment, kind, metric, outcome)?;
                }
                for (metric, range) in &config.events {
                    let outcome = self.event(branch, segment, metric, *range);
                    self.store(branch, segment, MetricKind::Event, metric, outcome)?;
                }
            }
        }
        self.builder.finish()
    }
}

/// Runs the full analysis for `config` against `source`.
///
/// Returns an error only for problems that invalidate the whole run (bad
/// configuration, categorical labels that do not fit the data). Anything
/// scoped to one metric is recorded as a failed slot in the tree.
pub fn analyze<S: TelemetrySource + ?Sized>(config: &AnalysisConfig, source: &S) -> Result<ResultTree> {
    config.validate()?;
    let settings = &config.uplift;
    let sweep = Sweep {
        config,
        source,
        grid: quantile_grid(settings.grid_start, settings.grid_end, settings.grid_step),
        layouts: HashMap::new(),
        builder: ResultTreeBuilder::new(config),
    };
    let tree = sweep.run()?;

    let failed = tree.failures().len();
    if failed > 0 {
        warn!(slug = %tree.slug, failed, "analysis finished with failed metrics");
    } else {
        info!(slug = %tree.slug, "analysis finished");
    }
    Ok(tree)
}
