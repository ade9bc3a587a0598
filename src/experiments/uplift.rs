//! Treatment-vs-control uplift of quantile functions.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::histogram::quantiles::{same_thresholds, QuantilePoint};
use crate::spline::{Spline, SplineDegree};

/// Uplift curve on the shared quantile grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpliftCurve {
    pub grid: Vec<f64>,
    pub diff: Vec<f64>,
    pub uplift_percent: Vec<f64>,
    /// Largest `|diff|` on the grid, for symmetric chart scaling.
    pub max_abs_diff: f64,
    pub max_abs_uplift_percent: f64,
}

/// Pointwise comparison at one configured threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdUplift {
    pub threshold: f64,
    pub diff: f64,
    pub uplift_percent: f64,
}

/// `(treatment - control) / control * 100`, or 0 when the control is 0.
pub fn relative_change_percent(treatment: f64, control: f64) -> f64 {
    if control == 0.0 {
        return 0.0;
    }
    (treatment - control) / control * 100.0
}

/// Upper bound on uplift grid size.
pub const MAX_GRID_POINTS: usize = 10_000;

/// Number of points `quantile_grid` produces, or `None` when the range is
/// empty, the step is not positive, or the grid would exceed
/// [`MAX_GRID_POINTS`].
pub fn grid_len(start: f64, end: f64, step: f64) -> Option<usize> {
    if !(step > 0.0) || !(end >= start) {
        return None;
    }
    // Small slack so 0.1..=0.9 by 0.01 keeps its last point.
    let intervals = ((end - start) / step + 1e-9).floor();
    if !(intervals < MAX_GRID_POINTS as f64) {
        return None;
    }
    Some(intervals as usize + 1)
}

/// Evenly spaced grid from `start` to `end` inclusive. Points are computed
/// as `start + i * step` so the grid does not drift. Grids [`grid_len`]
/// rejects come back empty.
pub fn quantile_grid(start: f64, end: f64, step: f64) -> Vec<f64> {
    let Some(len) = grid_len(start, end, step) else {
        return Vec::new();
    };
    (0..len).map(|i| start + i as f64 * step).collect()
}

fn curve_points(points: &[QuantilePoint]) -> Vec<(f64, f64)> {
    points.iter().map(|p| (p.threshold, p.value)).collect()
}

/// Fits one spline per branch over `(threshold, value)` and compares the two
/// curves at every grid point.
pub fn spline_uplift(
    control: &[QuantilePoint],
    treatment: &[QuantilePoint],
    degree: SplineDegree,
    grid: &[f64],
) -> Result<UpliftCurve> {
    let control_fit = Spline::fit(&curve_points(control), degree)?;
    let treatment_fit = Spline::fit(&curve_points(treatment), degree)?;

    let mut diff = Vec::with_capacity(grid.len());
    let mut uplift_percent = Vec::with_capacity(grid.len());
    for &q in grid {
        let c = control_fit.evaluate(q);
        let t = treatment_fit.evaluate(q);
        diff.push(t - c);
        uplift_percent.push(relative_change_percent(t, c));
    }

    let max_abs = |values: &[f64]| values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    Ok(UpliftCurve {
        grid: grid.to_vec(),
        max_abs_diff: max_abs(&diff),
        max_abs_uplift_percent: max_abs(&uplift_percent),
        diff,
        uplift_percent,
    })
}

/// Compares two quantile curves at their shared thresholds. The thresholds
/// must match exactly, in order.
pub fn threshold_uplift(
    metric: &str,
    control: &[QuantilePoint],
    treatment: &[QuantilePoint],
) -> Result<Vec<ThresholdUplift>> {
    if !same_thresholds(control, treatment) {
        return Err(AnalysisError::QuantileKeyMismatch(metric.to_string()));
    }
    Ok(control
        .iter()
        .zip(treatment)
        .map(|(c, t)| ThresholdUplift {
            threshold: c.threshold,
            diff: t.value - c.value,
            uplift_percent: relative_change_percent(t.value, c.value),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(values: &[(f64, f64)]) -> Vec<QuantilePoint> {
        values
            .iter()
            .map(|&(threshold, value)| QuantilePoint { threshold, value })
            .collect()
    }

    #[test]
    fn default_grid_has_81_points() {
        let grid = quantile_grid(0.1, 0.9, 0.01);
        assert_eq!(grid.len(), 81);
        assert!((grid[0] - 0.1).abs() < 1e-12);
        assert!((grid[80] - 0.9).abs() < 1e-9);
    }

    #[test]
    fn oversized_grid_is_refused() {
        assert_eq!(grid_len(0.0, 1.0, 1e-300), None);
        assert!(quantile_grid(0.0, 1.0, 1e-300).is_empty());
        assert_eq!(grid_len(0.0, 1.0, 0.001), Some(1001));
        assert_eq!(grid_len(0.0, 1.0, 1e-5), None);
        assert_eq!(grid_len(0.1, 0.9, 0.01), Some(81));
    }

    #[test]
    fn grid_with_bad_step_is_empty() {
        assert!(quantile_grid(0.1, 0.9, 0.0).is_empty());
        assert!(quantile_grid(0.9, 0.1, 0.1).is_empty());
    }

    #[test]
    fn identical_curves_have_zero_uplift() {
        let c = curve(&[(0.1, 10.0), (0.5, 20.0), (0.9, 50.0), (1.0, 90.0)]);
        let grid = quantile_grid(0.1, 0.9, 0.05);
        for degree in [SplineDegree::Linear, SplineDegree::Cubic] {
            let u = spline_uplift(&c, &c, degree, &grid).unwrap();
            assert!(u.diff.iter().all(|&d| d == 0.0));
            assert!(u.uplift_percent.iter().all(|&p| p == 0.0));
            assert_eq!(u.max_abs_diff, 0.0);
        }
    }

    #[test]
    fn constant_shift_gives_constant_diff() {
        let c = curve(&[(0.1, 100.0), (0.5, 200.0), (0.9, 400.0)]);
        let t = curve(&[(0.1, 110.0), (0.5, 210.0), (0.9, 410.0)]);
        let grid = [0.1, 0.3, 0.5, 0.9];
        let u = spline_uplift(&c, &t, SplineDegree::Linear, &grid).unwrap();
        for d in &u.diff {
            assert!((d - 10.0).abs() < 1e-9, "diff={:?}", u.diff);
        }
        assert!((u.uplift_percent[0] - 10.0).abs() < 1e-9);
        assert!((u.uplift_percent[2] - 5.0).abs() < 1e-9);
        assert!((u.max_abs_uplift_percent - 10.0).abs() < 1e-9);
    }

    #[test]
    fn zero_control_value_reports_zero_percent() {
        let c = curve(&[(0.1, 0.0), (0.9, 0.0)]);
        let t = curve(&[(0.1, 5.0), (0.9, 5.0)]);
        let u = spline_uplift(&c, &t, SplineDegree::Linear, &[0.5]).unwrap();
        assert_eq!(u.diff, vec![5.0]);
        assert_eq!(u.uplift_percent, vec![0.0]);
    }

    #[test]
    fn degenerate_curve_is_named_failure() {
        let c = curve(&[(0.5, 1.0)]);
        let err = spline_uplift(&c, &c, SplineDegree::Cubic, &[0.5]).unwrap_err();
        assert_eq!(err, AnalysisError::DegenerateSpline { distinct: 1 });
    }

    #[test]
    fn threshold_uplift_compares_pointwise() {
        let c = curve(&[(0.5, 200.0), (1.0, 300.0)]);
        let t = curve(&[(0.5, 100.0), (1.0, 300.0)]);
        let u = threshold_uplift("fcp", &c, &t).unwrap();
        assert_eq!(u[0].diff, -100.0);
        assert_eq!(u[0].uplift_percent, -50.0);
        assert_eq!(u[1].diff, 0.0);
    }

    #[test]
    fn threshold_uplift_rejects_mismatched_keys() {
        let c = curve(&[(0.5, 1.0)]);
        let t = curve(&[(0.6, 1.0)]);
        let err = threshold_uplift("fcp", &c, &t).unwrap_err();
        assert_eq!(err, AnalysisError::QuantileKeyMismatch("fcp".to_string()));
    }

    #[test]
    fn relative_change_guards_zero() {
        assert_eq!(relative_change_percent(5.0, 0.0), 0.0);
        assert_eq!(relative_change_percent(150.0, 100.0), 50.0);
    }
}
