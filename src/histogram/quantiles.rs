//! Quantile extraction.
//!
//! Results are ordered `(threshold, value)` pairs rather than maps keyed by
//! float thresholds, so iteration order is stable and two branches can be
//! compared point by point.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantilePoint {
    pub threshold: f64,
    pub value: f64,
}

/// Walks the CDF and resolves each threshold to the first bucket whose
/// cumulative mass strictly exceeds it. Thresholds the scan never exceeds
/// (for example `1.0`) take the final bucket's value.
///
/// `thresholds` must be sorted ascending. The answer is always an existing
/// bucket value; nothing is interpolated between buckets, which coarsens
/// resolution for wide buckets.
pub fn histogram_quantiles(values: &[f64], cdf: &[f64], thresholds: &[f64]) -> Vec<QuantilePoint> {
    debug_assert_eq!(values.len(), cdf.len());
    let Some(&last) = values.last() else {
        return Vec::new();
    };

    let mut idx = 0;
    thresholds
        .iter()
        .map(|&threshold| {
            while idx < cdf.len() && cdf[idx] <= threshold {
                idx += 1;
            }
            let value = values.get(idx).copied().unwrap_or(last);
            QuantilePoint { threshold, value }
        })
        .collect()
}

/// Quantiles of raw samples, linearly interpolated between order statistics.
pub fn sample_quantiles(samples: &[f64], thresholds: &[f64]) -> Vec<QuantilePoint> {
    if samples.is_empty() {
        return Vec::new();
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();

    thresholds
        .iter()
        .map(|&threshold| {
            let rank = threshold.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = (lower + 1).min(n - 1);
            let fraction = rank - lower as f64;
            let value = sorted[lower] + fraction * (sorted[upper] - sorted[lower]);
            QuantilePoint { threshold, value }
        })
        .collect()
}

/// True when both curves carry the same thresholds in the same order.
pub fn same_thresholds(a: &[QuantilePoint], b: &[QuantilePoint]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.threshold == y.threshold)
}
