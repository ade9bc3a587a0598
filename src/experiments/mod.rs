pub mod config;
pub mod metrics;
pub mod report;
pub mod results;
pub mod samples;
pub mod stats;
pub mod uplift;

pub use config::{AnalysisConfig, EventRange, HistogramKind, UpliftSettings};
pub use metrics::{analyze, compare, summarize_histogram, summarize_samples};
pub use report::{format_p_value, mean_comparison, render_table, MeanComparisonRow};
pub use results::{
    Comparison, HypothesisTests, MetricKind, MetricResult, MetricSlot, NumericalResult,
    ResultTree, ResultTreeBuilder, UpliftOutcome,
};
