//! Histogram types and the per-histogram pipeline stages.
//!
//! A [`Histogram`] is always sorted ascending by bucket value with unique
//! buckets and `bins.len() == counts.len()`. Every stage that drops buckets
//! goes through [`Histogram::retain`] so bins and counts stay aligned.

pub mod cleanup;
pub mod density;
pub mod moments;
pub mod quantiles;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Wire form of a histogram as supplied by the telemetry collaborator.
/// Unvalidated; may be unsorted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawHistogram {
    pub bins: Vec<f64>,
    pub counts: Vec<u64>,
}

/// Validated numerical histogram.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawHistogram", into = "RawHistogram")]
pub struct Histogram {
    bins: Vec<f64>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Validates lengths, rejects non-finite and duplicate buckets, and sorts
    /// the pairs ascending by bucket value.
    pub fn new(bins: Vec<f64>, counts: Vec<u64>) -> Result<Self> {
        if bins.len() != counts.len() {
            return Err(AnalysisError::LengthMismatch {
                bins: bins.len(),
                counts: counts.len(),
            });
        }
        if let Some(&bad) = bins.iter().find(|b| !b.is_finite()) {
            return Err(AnalysisError::NonFinite(bad));
        }

        let mut pairs: Vec<(f64, u64)> = bins.into_iter().zip(counts).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        if let Some(w) = pairs.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(AnalysisError::DuplicateBucket(w[0].0));
        }

        let (bins, counts) = pairs.into_iter().unzip();
        Ok(Self { bins, counts })
    }

    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Keeps the buckets whose index satisfies `keep`, dropping bin and count
    /// together.
    pub fn retain<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(usize) -> bool,
    {
        let (bins, counts) = self
            .bins
            .iter()
            .zip(&self.counts)
            .enumerate()
            .filter(|(i, _)| keep(*i))
            .map(|(_, (&b, &c))| (b, c))
            .unzip();
        Self { bins, counts }
    }
}

impl TryFrom<RawHistogram> for Histogram {
    type Error = AnalysisError;

    fn try_from(raw: RawHistogram) -> Result<Self> {
        Histogram::new(raw.bins, raw.counts)
    }
}

impl From<Histogram> for RawHistogram {
    fn from(h: Histogram) -> Self {
        RawHistogram {
            bins: h.bins,
            counts: h.counts,
        }
    }
}

/// One labelled bucket of a categorical histogram.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoricalBucket {
    pub label: String,
    pub count: u64,
}

/// Categorical histograms carry raw label/count pairs only. No moments,
/// density or quantiles are defined for them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CategoricalHistogram {
    pub buckets: Vec<CategoricalBucket>,
}

impl CategoricalHistogram {
    pub fn total(&self) -> u64 {
        self.buckets.iter().map(|b| b.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sorts_pairs_by_bucket() {
        let h = Histogram::new(vec![300.0, 100.0, 200.0], vec![20, 50, 30]).unwrap();
        assert_eq!(h.bins(), &[100.0, 200.0, 300.0]);
        assert_eq!(h.counts(), &[50, 30, 20]);
    }

    #[test]
    fn new_rejects_length_mismatch() {
        let err = Histogram::new(vec![1.0, 2.0], vec![1]).unwrap_err();
        assert_eq!(err, AnalysisError::LengthMismatch { bins: 2, counts: 1 });
    }

    #[test]
    fn new_rejects_duplicate_buckets() {
        let err = Histogram::new(vec![1.0, 2.0, 1.0], vec![1, 1, 1]).unwrap_err();
        assert_eq!(err, AnalysisError::DuplicateBucket(1.0));
    }

    #[test]
    fn new_rejects_nan_bucket() {
        assert!(Histogram::new(vec![1.0, f64::NAN], vec![1, 1]).is_err());
    }

    #[test]
    fn zero_counts_are_allowed() {
        let h = Histogram::new(vec![0.0, 1.0], vec![0, 0]).unwrap();
        assert_eq!(h.total(), 0);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn retain_drops_bins_and_counts_together() {
        let h = Histogram::new(vec![1.0, 2.0, 3.0], vec![10, 20, 30]).unwrap();
        let kept = h.retain(|i| i != 1);
        assert_eq!(kept.bins(), &[1.0, 3.0]);
        assert_eq!(kept.counts(), &[10, 30]);
    }

    #[test]
    fn deserialize_validates() {
        let ok: Histogram = serde_json::from_str(r#"{"bins":[2,1],"counts":[3,4]}"#).unwrap();
        assert_eq!(ok.bins(), &[1.0, 2.0]);
        let bad = serde_json::from_str::<Histogram>(r#"{"bins":[1],"counts":[3,4]}"#);
        assert!(bad.is_err());
    }
}
