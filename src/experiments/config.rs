use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::samples::MAX_EVENT_BINS;
use super::uplift::{grid_len, MAX_GRID_POINTS};
use crate::error::{AnalysisError, Result};
use crate::spline::SplineDegree;

fn default_segments() -> Vec<String> {
    vec!["All".to_string()]
}

fn default_quantiles() -> Vec<f64> {
    vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 0.95, 0.99, 1.0]
}

fn default_confidence_level() -> f64 {
    0.95
}

fn default_grid_start() -> f64 {
    0.1
}

fn default_grid_end() -> f64 {
    0.9
}

fn default_grid_step() -> f64 {
    0.01
}

/// Which moment-free representation a histogram metric uses.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HistogramKind {
    Numerical,
    /// Bucket `i` of the raw histogram carries `labels[i]`.
    Categorical { labels: Vec<String> },
}

/// Inclusive value range kept for an event metric, written as `[min, max]`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct EventRange(pub f64, pub f64);

impl EventRange {
    pub fn min(&self) -> f64 {
        self.0
    }

    pub fn max(&self) -> f64 {
        self.1
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.0 && value <= self.1
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UpliftSettings {
    #[serde(default)]
    pub degree: SplineDegree,
    #[serde(default = "default_grid_start")]
    pub grid_start: f64,
    #[serde(default = "default_grid_end")]
    pub grid_end: f64,
    #[serde(default = "default_grid_step")]
    pub grid_step: f64,
}

impl Default for UpliftSettings {
    fn default() -> Self {
        Self {
            degree: SplineDegree::default(),
            grid_start: default_grid_start(),
            grid_end: default_grid_end(),
            grid_step: default_grid_step(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AnalysisConfig {
    pub slug: String,
    /// Branch slugs; the first one is the control.
    pub branches: Vec<String>,
    #[serde(default = "default_segments")]
    pub segments: Vec<String>,
    #[serde(default)]
    pub histograms: IndexMap<String, HistogramKind>,
    #[serde(default, alias = "pageload_event_fields")]
    pub events: IndexMap<String, EventRange>,
    #[serde(default = "default_quantiles")]
    pub quantiles: Vec<f64>,
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    #[serde(default)]
    pub uplift: UpliftSettings,
    /// Bucket count for event-sample histograms; Sturges' rule when unset.
    #[serde(default)]
    pub event_bins: Option<usize>,
}

impl AnalysisConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// The first configured branch. Empty only for an unvalidated config.
    pub fn control(&self) -> &str {
        self.branches.first().map(String::as_str).unwrap_or("")
    }

    pub fn is_control(&self, branch: &str) -> bool {
        self.branches.first().is_some_and(|c| c == branch)
    }

    pub fn validate(&self) -> Result<()> {
        if self.branches.is_empty() {
            return Err(AnalysisError::Config(
                "at least one branch is required; the first is the control".to_string(),
            ));
        }
        if let Some(dup) = first_duplicate(&self.branches) {
            return Err(AnalysisError::Config(format!("duplicate branch: {}", dup)));
        }
        if self.segments.is_empty() {
            return Err(AnalysisError::Config("segments must not be empty".to_string()));
        }
        if let Some(dup) = first_duplicate(&self.segments) {
            return Err(AnalysisError::Config(format!("duplicate segment: {}", dup)));
        }
        if self.histograms.is_empty() && self.events.is_empty() {
            return Err(AnalysisError::Config(
                "no histograms or events configured".to_string(),
            ));
        }
        if let Some(name) = self.histograms.keys().find(|k| self.events.contains_key(*k)) {
            return Err(AnalysisError::Config(format!(
                "metric {} is configured as both histogram and event",
                name
            )));
        }

        if self.quantiles.is_empty() {
            return Err(AnalysisError::Config("quantiles must not be empty".to_string()));
        }
        if self.quantiles.iter().any(|q| !(*q > 0.0 && *q <= 1.0)) {
            return Err(AnalysisError::Config(
                "quantile thresholds must be in (0, 1]".to_string(),
            ));
        }
        if self.quantiles.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AnalysisError::Config(
                "quantile thresholds must be strictly increasing".to_string(),
            ));
        }

        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(AnalysisError::Config(
                "confidence_level must be in (0, 1) exclusive".to_string(),
            ));
        }

        for (name, kind) in &self.histograms {
            if let HistogramKind::Categorical { labels } = kind {
                if labels.is_empty() {
                    return Err(AnalysisError::MissingLabels(name.clone()));
                }
            }
        }
        for (name, range) in &self.events {
            if !(range.min().is_finite() && range.max().is_finite()) || range.min() > range.max() {
                return Err(AnalysisError::Config(format!(
                    "event {} has invalid range [{}, {}]",
                    name,
                    range.min(),
                    range.max()
                )));
            }
        }
        if let Some(bins) = self.event_bins {
            if bins == 0 || bins > MAX_EVENT_BINS {
                return Err(AnalysisError::Config(format!(
                    "event_bins must be between 1 and {}, got {}",
                    MAX_EVENT_BINS, bins
                )));
            }
        }

        let u = &self.uplift;
        if !(u.grid_start >= 0.0 && u.grid_end <= 1.0) {
            return Err(AnalysisError::Config(
                "uplift grid must satisfy 0 <= grid_start <= grid_end <= 1".to_string(),
            ));
        }
        if grid_len(u.grid_start, u.grid_end, u.grid_step).is_none() {
            return Err(AnalysisError::Config(format!(
                "uplift grid from {} to {} by {} must be non-empty with a positive step and at most {} points",
                u.grid_start, u.grid_end, u.grid_step, MAX_GRID_POINTS
            )));
        }

        Ok(())
    }
}

fn first_duplicate(names: &[String]) -> Option<&str> {
    names
        .iter()
        .enumerate()
        .find(|(i, n)| names[..*i].contains(n))
        .map(|(_, n)| n.as_str())
}
