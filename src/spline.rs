//! One-dimensional interpolating splines over quantile functions.
//!
//! Fits pass through every (de-duplicated) knot. Degree 1 is piecewise
//! linear; degree 3 is a natural cubic spline (zero second derivative at both
//! ends). Evaluation outside the knot range clamps to the end knots.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SplineDegree {
    #[default]
    Linear,
    Cubic,
}

impl TryFrom<u8> for SplineDegree {
    type Error = String;

    fn try_from(degree: u8) -> std::result::Result<Self, Self::Error> {
        match degree {
            1 => Ok(SplineDegree::Linear),
            3 => Ok(SplineDegree::Cubic),
            other => Err(format!("spline degree must be 1 or 3, got {}", other)),
        }
    }
}

impl From<SplineDegree> for u8 {
    fn from(degree: SplineDegree) -> Self {
        match degree {
            SplineDegree::Linear => 1,
            SplineDegree::Cubic => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Spline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at the knots; all zero for the linear fit.
    y2: Vec<f64>,
}

impl Spline {
    /// Fits a spline through `points`. Points are sorted by x and duplicate x
    /// values collapse to the last y seen. Fewer than two distinct x values
    /// is a [`AnalysisError::DegenerateSpline`].
    pub fn fit(points: &[(f64, f64)], degree: SplineDegree) -> Result<Self> {
        if let Some(&(x, y)) = points.iter().find(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(AnalysisError::NonFinite(if x.is_finite() { y } else { x }));
        }

        let (xs, ys) = strictly_increasing(points);
        if xs.len() < 2 {
            return Err(AnalysisError::DegenerateSpline { distinct: xs.len() });
        }

        let y2 = match degree {
            SplineDegree::Linear => vec![0.0; xs.len()],
            SplineDegree::Cubic => natural_second_derivatives(&xs, &ys),
        };

        Ok(Self { xs, ys, y2 })
    }

    pub fn knots(&self) -> &[f64] {
        &self.xs
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let last = self.xs.len() - 1;
        let x = x.clamp(self.xs[0], self.xs[last]);

        // Index of the right knot of the bracketing interval.
        let hi = self.xs.partition_point(|&k| k < x).clamp(1, last);
        let lo = hi - 1;

        let h = self.xs[hi] - self.xs[lo];
        let a = (self.xs[hi] - x) / h;
        let b = (x - self.xs[lo]) / h;

        a * self.ys[lo]
            + b * self.ys[hi]
            + ((a.powi(3) - a) * self.y2[lo] + (b.powi(3) - b) * self.y2[hi]) * h * h / 6.0
    }
}

fn strictly_increasing(points: &[(f64, f64)]) -> (Vec<f64>, Vec<f64>) {
    let mut sorted = points.to_vec();
    // Stable sort keeps input order among equal x, so "last wins" is well defined.
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut xs: Vec<f64> = Vec::with_capacity(sorted.len());
    let mut ys: Vec<f64> = Vec::with_capacity(sorted.len());
    for (x, y) in sorted {
        if xs.last() == Some(&x) {
            if let Some(prev) = ys.last_mut() {
                *prev = y;
            }
        } else {
            xs.push(x);
            ys.push(y);
        }
    }
    (xs, ys)
}

/// Tridiagonal solve for the natural cubic spline's second derivatives.
fn natural_second_derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut y2 = vec![0.0; n];
    let mut u = vec![0.0; n];

    for i in 1..n - 1 {
        let sig = (xs[i] - xs[i - 1]) / (xs[i + 1] - xs[i - 1]);
        let p = sig * y2[i - 1] + 2.0;
        y2[i] = (sig - 1.0) / p;
        let slope_diff =
            (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i]) - (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1]);
        u[i] = (6.0 * slope_diff / (xs[i + 1] - xs[i - 1]) - sig * u[i - 1]) / p;
    }

    y2[n - 1] = 0.0;
    for k in (0..n - 1).rev() {
        y2[k] = y2[k] * y2[k + 1] + u[k];
    }
    y2
}
