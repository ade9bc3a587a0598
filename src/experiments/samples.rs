//! Row-level event samples: range filtering and conversion to histograms.

use serde::{Deserialize, Serialize};

use super::config::EventRange;
use crate::error::{AnalysisError, Result};
use crate::histogram::Histogram;

/// Keeps finite samples inside the inclusive range.
pub fn filter_to_range(samples: &[f64], range: EventRange) -> Vec<f64> {
    samples
        .iter()
        .copied()
        .filter(|s| s.is_finite() && range.contains(*s))
        .collect()
}

/// Upper bound on the bucket count of an event-sample histogram.
pub const MAX_EVENT_BINS: usize = 10_000;

/// Equal-width bucket layout for turning samples into a histogram.
///
/// The first branch processed for a (segment, metric) establishes the layout
/// and later branches reuse it so their densities line up bucket for bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketLayout {
    pub start: f64,
    pub width: f64,
    pub buckets: usize,
}

impl BucketLayout {
    /// Spans `[min, max]` of the samples with `buckets` buckets, or with
    /// Sturges' rule (`ceil(log2 n) + 1`) when `buckets` is `None`.
    pub fn from_samples(samples: &[f64], buckets: Option<usize>) -> Result<Self> {
        if samples.is_empty() {
            return Err(AnalysisError::EmptyHistogram);
        }
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !min.is_finite() || !max.is_finite() {
            return Err(AnalysisError::NonFinite(if min.is_finite() { max } else { min }));
        }

        if max == min {
            return Ok(Self {
                start: min,
                width: 0.0,
                buckets: 1,
            });
        }

        let requested = buckets.unwrap_or_else(|| (samples.len() as f64).log2().ceil() as usize + 1);
        if requested > MAX_EVENT_BINS {
            return Err(AnalysisError::Config(format!(
                "event histogram needs at most {} buckets, got {}",
                MAX_EVENT_BINS, requested
            )));
        }

        // Halve the bucket count until every edge is distinct. Narrow spans
        // far from zero cannot be split finer than the float spacing.
        let mut layout = Self::spanning(min, max, requested.max(1));
        while layout.buckets > 1 && !layout.has_distinct_edges() {
            layout = Self::spanning(min, max, layout.buckets / 2);
        }
        Ok(layout)
    }

    fn spanning(min: f64, max: f64, buckets: usize) -> Self {
        Self {
            start: min,
            width: (max - min) / buckets as f64,
            buckets,
        }
    }

    fn has_distinct_edges(&self) -> bool {
        self.edges().windows(2).all(|w| w[0] < w[1])
    }

    /// Left edge of each bucket.
    pub fn edges(&self) -> Vec<f64> {
        (0..self.buckets)
            .map(|i| self.start + i as f64 * self.width)
            .collect()
    }

    fn index_of(&self, value: f64) -> usize {
        if self.width == 0.0 || value <= self.start {
            return 0;
        }
        let idx = ((value - self.start) / self.width).floor() as usize;
        idx.min(self.buckets - 1)
    }

    /// Counts samples per bucket, keyed by left edge. Samples outside the
    /// layout land in the first or last bucket. Empty buckets are kept.
    pub fn bucketize(&self, samples: &[f64]) -> Result<Histogram> {
        let mut counts = vec![0u64; self.buckets];
        for &s in samples {
            counts[self.index_of(s)] += 1;
        }
        Histogram::new(self.edges(), counts)
    }
}
