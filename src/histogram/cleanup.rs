//! Bucket cleanup applied before density estimation.

use super::{CategoricalBucket, CategoricalHistogram, Histogram};
use crate::error::{AnalysisError, Result};

/// Both neighbours must have at least this many samples before a bucket can
/// be considered a phantom.
pub const PHANTOM_NEIGHBOUR_MIN_COUNT: u64 = 1000;

/// A phantom bucket holds under this percentage of each neighbour's count.
pub const PHANTOM_MAX_PERCENT: u64 = 1;

/// Drops spurious interior buckets some clients report: a bucket whose
/// neighbours both hold thousands of samples while it holds under 1% of
/// each of them. Neighbours are read from the input, not the partially
/// cleaned output. Returns the cleaned histogram and the number of buckets
/// removed.
pub fn remove_phantom_buckets(histogram: &Histogram) -> (Histogram, usize) {
    let counts = histogram.counts();
    if counts.len() < 3 {
        return (histogram.clone(), 0);
    }

    let is_phantom = |i: usize| -> bool {
        if i == 0 || i + 1 >= counts.len() {
            return false;
        }
        let (left, count, right) = (counts[i - 1], counts[i], counts[i + 1]);
        left >= PHANTOM_NEIGHBOUR_MIN_COUNT
            && right >= PHANTOM_NEIGHBOUR_MIN_COUNT
            && count.saturating_mul(100) < left.saturating_mul(PHANTOM_MAX_PERCENT)
            && count.saturating_mul(100) < right.saturating_mul(PHANTOM_MAX_PERCENT)
    };

    let cleaned = histogram.retain(|i| !is_phantom(i));
    let removed = histogram.len() - cleaned.len();
    (cleaned, removed)
}

/// Maps raw bucket indices to configured labels.
///
/// A trailing overflow bucket is dropped when its count is zero and there is
/// exactly one label fewer than buckets. Any bucket without a label is a
/// configuration error.
pub fn label_categorical(
    metric: &str,
    histogram: &Histogram,
    labels: &[String],
) -> Result<CategoricalHistogram> {
    if labels.is_empty() {
        return Err(AnalysisError::MissingLabels(metric.to_string()));
    }

    let mut pairs: Vec<(f64, u64)> = histogram
        .bins()
        .iter()
        .copied()
        .zip(histogram.counts().iter().copied())
        .collect();

    if labels.len() + 1 == pairs.len() && pairs.last().is_some_and(|&(_, c)| c == 0) {
        pairs.pop();
    }

    let mismatch = || AnalysisError::LabelMismatch {
        metric: metric.to_string(),
        labels: labels.len(),
        buckets: histogram.len(),
    };

    let buckets = pairs
        .into_iter()
        .map(|(bin, count)| {
            if bin < 0.0 || bin.fract() != 0.0 {
                return Err(mismatch());
            }
            let label = labels.get(bin as usize).ok_or_else(mismatch)?;
            Ok(CategoricalBucket {
                label: label.clone(),
                count,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CategoricalHistogram { buckets })
}
