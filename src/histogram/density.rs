//! Probability mass and cumulative distribution over histogram buckets.

use serde::{Deserialize, Serialize};

use super::Histogram;
use crate::error::{AnalysisError, Result};

/// Density and CDF, index-aligned with `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Distribution {
    pub values: Vec<f64>,
    pub density: Vec<f64>,
    pub cdf: Vec<f64>,
}

/// Normalizes counts to a probability mass per bucket and the running CDF.
///
/// The CDF is computed from integer running totals, so its last entry is
/// exactly `1.0` and repeated thresholds resolve deterministically.
/// Outlier cleanup must run before this step.
pub fn estimate(histogram: &Histogram) -> Result<Distribution> {
    let n = histogram.total();
    if n == 0 {
        return Err(AnalysisError::EmptyHistogram);
    }
    let n_f = n as f64;

    let density = histogram
        .counts()
        .iter()
        .map(|&c| c as f64 / n_f)
        .collect();

    let mut running: u64 = 0;
    let cdf = histogram
        .counts()
        .iter()
        .map(|&c| {
            running += c;
            running as f64 / n_f
        })
        .collect();

    Ok(Distribution {
        values: histogram.bins().to_vec(),
        density,
        cdf,
    })
}
