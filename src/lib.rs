//! Statistics engine for comparing telemetry distributions between the
//! branches of an A/B experiment.
//!
//! Per branch, segment and metric the engine reduces a bucketed histogram
//! (or raw event samples) to moments, a density/CDF and quantiles, then
//! compares every treatment branch with the control: Welch's t-test,
//! Cohen's d and a spline-interpolated quantile uplift curve. Results are
//! collected in a [`ResultTree`].

pub mod error;
pub mod experiments;
pub mod histogram;
pub mod spline;
pub mod telemetry;

pub use error::{AnalysisError, Result};
pub use experiments::{analyze, AnalysisConfig, MetricKind, MetricSlot, ResultTree};
pub use histogram::{CategoricalHistogram, Histogram, RawHistogram};
pub use spline::{Spline, SplineDegree};
pub use telemetry::{InMemoryTelemetry, TelemetrySource};
