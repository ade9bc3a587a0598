//! Display-ready rows for the per-branch mean comparison table.

use serde::Serialize;

use super::results::{MetricKind, MetricSlot, NumericalResult, ResultTree};
use crate::error::{AnalysisError, Result};

/// One formatted table row. Comparison columns are empty for the control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeanComparisonRow {
    pub branch: String,
    pub mean: String,
    pub uplift: String,
    pub se: String,
    pub std: String,
    pub t: String,
    pub p: String,
    pub lower: String,
    pub upper: String,
    pub effect: String,
}

const COLUMNS: [&str; 10] = [
    "branch", "mean", "uplift", "se", "std", "t", "p", "lower", "upper", "effect",
];

impl MeanComparisonRow {
    fn cells(&self) -> [&str; 10] {
        [
            self.branch.as_str(),
            self.mean.as_str(),
            self.uplift.as_str(),
            self.se.as_str(),
            self.std.as_str(),
            self.t.as_str(),
            self.p.as_str(),
            self.lower.as_str(),
            self.upper.as_str(),
            self.effect.as_str(),
        ]
    }
}

fn one_decimal(x: f64) -> String {
    format!("{:.1}", x)
}

/// Formats a p-value with one significant digit, switching to scientific
/// notation below `1e-4` (`0.04`, `0.0003`, `2e-07`).
pub fn format_p_value(p: f64) -> String {
    if !p.is_finite() {
        return format!("{}", p);
    }
    if p == 0.0 {
        return "0".to_string();
    }

    let sci = format!("{:.0e}", p);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return sci;
    };

    if (-4..1).contains(&exp) {
        format!("{:.*}", (-exp) as usize, p)
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    }
}

fn find_numerical<'a>(
    tree: &'a ResultTree,
    branch: &str,
    segment: &str,
    metric: &str,
) -> Option<&'a NumericalResult> {
    [MetricKind::Histogram, MetricKind::Event]
        .into_iter()
        .find_map(|kind| tree.numerical(branch, segment, kind, metric))
}

fn is_known(tree: &ResultTree, segment: &str, metric: &str) -> bool {
    tree.branches.values().any(|segments| {
        segments
            .get(segment)
            .is_some_and(|kinds| kinds.values().any(|m| m.contains_key(metric)))
    })
}

/// Builds one row per branch that has a numerical result for `metric` in
/// `segment`, control first. Branches whose slot failed are left out.
pub fn mean_comparison(
    tree: &ResultTree,
    segment: &str,
    metric: &str,
) -> Result<Vec<MeanComparisonRow>> {
    if !is_known(tree, segment, metric) {
        return Err(AnalysisError::UnknownMetric(format!("{}/{}", segment, metric)));
    }
    if find_numerical(tree, &tree.control, segment, metric).is_none() {
        return Err(AnalysisError::ControlUnavailable {
            segment: segment.to_string(),
            metric: metric.to_string(),
        });
    }

    let mut rows = Vec::new();
    for branch in tree.branches.keys() {
        let Some(result) = find_numerical(tree, branch, segment, metric) else {
            continue;
        };
        let comparison = result.comparison.as_ref();
        rows.push(MeanComparisonRow {
            branch: branch.clone(),
            mean: one_decimal(result.mean),
            uplift: comparison
                .map(|c| one_decimal(c.mean_uplift_percent))
                .unwrap_or_default(),
            se: one_decimal(result.se),
            std: one_decimal(result.std),
            t: comparison
                .map(|c| one_decimal(c.tests.welch_t.t))
                .unwrap_or_default(),
            p: comparison
                .map(|c| format_p_value(c.tests.welch_t.p_value))
                .unwrap_or_default(),
            lower: one_decimal(result.confidence.lower),
            upper: one_decimal(result.confidence.upper),
            effect: comparison
                .map(|c| c.tests.cohens_d.label.to_string())
                .unwrap_or_default(),
        });
    }
    Ok(rows)
}

/// Renders rows as a left-aligned plain-text table with a header line.
pub fn render_table(rows: &[MeanComparisonRow]) -> String {
    let mut widths = COLUMNS.map(str::len);
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.cells()) {
            *w = (*w).max(cell.len());
        }
    }

    let line = |cells: [&str; 10]| -> String {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(COLUMNS);
    for row in rows {
        out.push('\n');
        out.push_str(&line(row.cells()));
    }
    out
}

/// Counts of slots by status, for a one-line run summary.
pub fn slot_counts(tree: &ResultTree) -> (usize, usize) {
    let mut done = 0;
    let mut failed = 0;
    for segments in tree.branches.values() {
        for kinds in segments.values() {
            for slot in kinds.values().flat_map(|m| m.values()) {
                match slot {
                    MetricSlot::Done(_) => done += 1,
                    MetricSlot::Failed { .. } => failed += 1,
                    MetricSlot::Pending => {}
                }
            }
        }
    }
    (done, failed)
}
