//! Interface to the telemetry collaborator.
//!
//! Acquisition, SQL templating and caching live outside this crate. The
//! engine only asks a [`TelemetrySource`] for already-materialized data per
//! (branch, segment, metric).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::histogram::RawHistogram;

pub trait TelemetrySource {
    /// Aggregated `(bins, counts)` for a histogram metric, or `None` when the
    /// source has no data for that slot.
    fn histogram(&self, branch: &str, segment: &str, metric: &str) -> Option<RawHistogram>;

    /// Row-level samples for an event metric, unfiltered.
    fn samples(&self, branch: &str, segment: &str, metric: &str) -> Option<Vec<f64>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentTelemetry {
    #[serde(default)]
    pub histograms: IndexMap<String, RawHistogram>,
    #[serde(default)]
    pub events: IndexMap<String, Vec<f64>>,
}

/// Telemetry held in memory, keyed branch → segment.
///
/// The JSON form mirrors the nesting:
/// `{"branches": {"control": {"All": {"histograms": {...}, "events": {...}}}}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryTelemetry {
    #[serde(default)]
    pub branches: IndexMap<String, IndexMap<String, SegmentTelemetry>>,
}

impl InMemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn segment_mut(&mut self, branch: &str, segment: &str) -> &mut SegmentTelemetry {
        self.branches
            .entry(branch.to_string())
            .or_default()
            .entry(segment.to_string())
            .or_default()
    }

    pub fn insert_histogram(
        &mut self,
        branch: &str,
        segment: &str,
        metric: &str,
        bins: Vec<f64>,
        counts: Vec<u64>,
    ) -> &mut Self {
        self.segment_mut(branch, segment)
            .histograms
            .insert(metric.to_string(), RawHistogram { bins, counts });
        self
    }

    pub fn insert_samples(
        &mut self,
        branch: &str,
        segment: &str,
        metric: &str,
        samples: Vec<f64>,
    ) -> &mut Self {
        self.segment_mut(branch, segment)
            .events
            .insert(metric.to_string(), samples);
        self
    }

    fn segment(&self, branch: &str, segment: &str) -> Option<&SegmentTelemetry> {
        self.branches.get(branch)?.get(segment)
    }
}

impl TelemetrySource for InMemoryTelemetry {
    fn histogram(&self, branch: &str, segment: &str, metric: &str) -> Option<RawHistogram> {
        self.segment(branch, segment)?.histograms.get(metric).cloned()
    }

    fn samples(&self, branch: &str, segment: &str, metric: &str) -> Option<Vec<f64>> {
        self.segment(branch, segment)?.events.get(metric).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_data_is_returned_per_slot() {
        let mut t = InMemoryTelemetry::new();
        t.insert_histogram("control", "All", "fcp", vec![1.0], vec![3])
            .insert_samples("control", "Linux", "load", vec![1.5, 2.5]);

        assert_eq!(t.histogram("control", "All", "fcp").unwrap().counts, vec![3]);
        assert_eq!(t.samples("control", "Linux", "load"), Some(vec![1.5, 2.5]));
        assert!(t.histogram("control", "Linux", "fcp").is_none());
        assert!(t.samples("treatment", "All", "load").is_none());
    }

    #[test]
    fn deserializes_nested_json() {
        let t: InMemoryTelemetry = serde_json::from_str(
            r#"{"branches": {"control": {"All": {"histograms": {"fcp": {"bins": [1, 2], "counts": [4, 5]}}}}}}"#,
        )
        .unwrap();
        let h = t.histogram("control", "All", "fcp").unwrap();
        assert_eq!(h.bins, vec![1.0, 2.0]);
        assert!(t.samples("control", "All", "fcp").is_none());
    }

    #[test]
    fn from_file_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let mut t = InMemoryTelemetry::new();
        t.insert_samples("b", "All", "m", vec![1.0]);
        std::fs::write(&path, serde_json::to_string(&t).unwrap()).unwrap();

        let loaded = InMemoryTelemetry::from_file(&path).unwrap();
        assert_eq!(loaded.samples("b", "All", "m"), Some(vec![1.0]));
    }
}
