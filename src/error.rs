use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Bins/counts length mismatch: {bins} bins, {counts} counts")]
    LengthMismatch { bins: usize, counts: usize },

    #[error("Histogram has zero total count")]
    EmptyHistogram,

    #[error("Duplicate bucket value: {0}")]
    DuplicateBucket(f64),

    #[error("Non-finite value in input: {0}")]
    NonFinite(f64),

    #[error("No samples left after filtering to [{min}, {max}]")]
    NoSamples { min: f64, max: f64 },

    #[error("Degenerate spline fit: {distinct} distinct x value(s), need at least 2")]
    DegenerateSpline { distinct: usize },

    #[error("Quantile thresholds differ between branch and control for {0}")]
    QuantileKeyMismatch(String),

    #[error("Missing telemetry for branch {branch}, segment {segment}, metric {metric}")]
    MissingData {
        branch: String,
        segment: String,
        metric: String,
    },

    #[error("Control result unavailable for segment {segment}, metric {metric}")]
    ControlUnavailable { segment: String, metric: String },

    #[error("Missing label mapping for categorical histogram: {0}")]
    MissingLabels(String),

    #[error("Label mapping for {metric} has {labels} labels but histogram has {buckets} buckets")]
    LabelMismatch {
        metric: String,
        labels: usize,
        buckets: usize,
    },

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Result tree incomplete: {0}")]
    Incomplete(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

impl From<std::io::Error> for AnalysisError {
    fn from(e: std::io::Error) -> Self {
        AnalysisError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(e: serde_json::Error) -> Self {
        AnalysisError::Json(e.to_string())
    }
}

impl AnalysisError {
    /// Configuration errors leave the result tree structurally incomplete and
    /// abort the run. Everything else is recorded against the single metric
    /// that produced it.
    pub fn is_fatal(&self) -> bool {
        match self {
            AnalysisError::MissingLabels(_) => true,
            AnalysisError::LabelMismatch { .. } => true,
            AnalysisError::UnknownMetric(_) => true,
            AnalysisError::Config(_) => true,
            AnalysisError::Incomplete(_) => true,
            AnalysisError::Io(_) => true,
            AnalysisError::Json(_) => true,
            AnalysisError::LengthMismatch { .. } => false,
            AnalysisError::EmptyHistogram => false,
            AnalysisError::DuplicateBucket(_) => false,
            AnalysisError::NonFinite(_) => false,
            AnalysisError::NoSamples { .. } => false,
            AnalysisError::DegenerateSpline { .. } => false,
            AnalysisError::QuantileKeyMismatch(_) => false,
            AnalysisError::MissingData { .. } => false,
            AnalysisError::ControlUnavailable { .. } => false,
        }
    }
}
