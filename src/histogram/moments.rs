//! Mean, variance and standard deviation of discretized distributions.
//!
//! All moments divide by `n` (population convention), for histograms and raw
//! samples alike, so every branch in a comparison is summarised the same way.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    pub mean: f64,
    pub variance: f64,
    pub std: f64,
    pub n: u64,
}

impl Moments {
    /// Standard error of the mean, `std / sqrt(n)`.
    pub fn standard_error(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        self.std / (self.n as f64).sqrt()
    }
}

/// Moments of a histogram given as aligned `bins`/`counts`.
///
/// Rejects mismatched lengths and zero total count instead of returning NaN.
pub fn bucket_moments(bins: &[f64], counts: &[u64]) -> Result<Moments> {
    if bins.len() != counts.len() {
        return Err(AnalysisError::LengthMismatch {
            bins: bins.len(),
            counts: counts.len(),
        });
    }

    let n: u64 = counts.iter().sum();
    if n == 0 {
        return Err(AnalysisError::EmptyHistogram);
    }
    let n_f = n as f64;

    let mean = bins
        .iter()
        .zip(counts)
        .map(|(&b, &c)| b * c as f64)
        .sum::<f64>()
        / n_f;
    let variance = bins
        .iter()
        .zip(counts)
        .map(|(&b, &c)| c as f64 * (b - mean).powi(2))
        .sum::<f64>()
        / n_f;

    finite_moments(mean, variance, n)
}

/// Moments of raw samples, each sample weighted once.
pub fn sample_moments(samples: &[f64]) -> Result<Moments> {
    if samples.is_empty() {
        return Err(AnalysisError::EmptyHistogram);
    }
    if let Some(&bad) = samples.iter().find(|s| !s.is_finite()) {
        return Err(AnalysisError::NonFinite(bad));
    }

    let n = samples.len();
    let mean = samples.iter().sum::<f64>() / n as f64;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;

    finite_moments(mean, variance, n as u64)
}

/// Sums that overflow surface as an error instead of an infinite mean.
fn finite_moments(mean: f64, variance: f64, n: u64) -> Result<Moments> {
    if !mean.is_finite() {
        return Err(AnalysisError::NonFinite(mean));
    }
    if !variance.is_finite() {
        return Err(AnalysisError::NonFinite(variance));
    }
    Ok(Moments {
        mean,
        variance,
        std: variance.sqrt(),
        n,
    })
}
