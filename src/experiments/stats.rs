use serde::{Deserialize, Serialize};

use crate::histogram::density::Distribution;
use crate::histogram::moments::Moments;

/// p-values at or above this are not significant and suppress the effect label.
pub const EFFECT_SIGNIFICANCE_P: f64 = 0.001;

/// `|d|` at or below this is a small effect.
pub const EFFECT_SMALL_MAX: f64 = 0.05;

/// `|d|` at or below this (and above small) is a medium effect.
pub const EFFECT_MEDIUM_MAX: f64 = 0.1;

// ── Result Structs ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WelchResult {
    pub t: f64,
    pub df: f64,
    pub p_value: f64,
}

impl WelchResult {
    fn neutral() -> Self {
        Self {
            t: 0.0,
            df: 0.0,
            p_value: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectLabel {
    None,
    Small,
    Medium,
    Large,
}

impl std::fmt::Display for EffectLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectLabel::None => write!(f, "None"),
            EffectLabel::Small => write!(f, "Small"),
            EffectLabel::Medium => write!(f, "Medium"),
            EffectLabel::Large => write!(f, "Large"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectSize {
    pub d: f64,
    pub label: EffectLabel,
}

/// Score and p-value of a test that has no implementation yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TestStatistic {
    pub score: f64,
    pub p_value: f64,
    pub implemented: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub level: f64,
    pub lower: f64,
    pub upper: f64,
}

// ── Welch's T-Test ──────────────────────────────────────────────────

/// Welch's t-test from per-arm summaries (unequal variance, unequal n).
///
/// `t` is positive when `treatment` has the larger mean. Arms with fewer than
/// two observations, or a zero pooled standard error, yield the neutral
/// result `t = 0, p = 1`.
pub fn welch_t_test(treatment: &Moments, control: &Moments) -> WelchResult {
    let (n1, n2) = (treatment.n, control.n);
    if n1 < 2 || n2 < 2 {
        return WelchResult::neutral();
    }

    let s1_n = treatment.variance / n1 as f64;
    let s2_n = control.variance / n2 as f64;
    let se = (s1_n + s2_n).sqrt();
    if se == 0.0 || !se.is_finite() {
        return WelchResult::neutral();
    }

    let t = (treatment.mean - control.mean) / se;

    // Welch-Satterthwaite degrees of freedom
    let df_denom = s1_n.powi(2) / (n1 - 1) as f64 + s2_n.powi(2) / (n2 - 1) as f64;
    if df_denom <= 0.0 || !df_denom.is_finite() {
        return WelchResult::neutral();
    }
    let df = (s1_n + s2_n).powi(2) / df_denom;

    let p_value = students_t_two_tailed_p(t, df).clamp(0.0, 1.0);

    WelchResult { t, df, p_value }
}

// ── Effect Size ─────────────────────────────────────────────────────

/// Cohen's d with pooled standard deviation. Antisymmetric in its arguments.
/// Returns 0 when the pooled deviation is zero or undefined.
pub fn cohens_d(treatment: &Moments, control: &Moments) -> f64 {
    let (n1, n2) = (treatment.n as f64, control.n as f64);
    let dof = n1 + n2 - 2.0;
    if dof <= 0.0 {
        return 0.0;
    }
    let pooled = (((n1 - 1.0) * treatment.variance + (n2 - 1.0) * control.variance) / dof).sqrt();
    if pooled == 0.0 || !pooled.is_finite() {
        return 0.0;
    }
    (treatment.mean - control.mean) / pooled
}

/// Qualitative bucket for presentation. The significance gate wins over
/// magnitude: any `p_value >= 0.001` is labelled `None`.
pub fn classify_effect(d: f64, p_value: f64) -> EffectLabel {
    if p_value >= EFFECT_SIGNIFICANCE_P {
        return EffectLabel::None;
    }
    let magnitude = d.abs();
    if magnitude <= EFFECT_SMALL_MAX {
        EffectLabel::Small
    } else if magnitude <= EFFECT_MEDIUM_MAX {
        EffectLabel::Medium
    } else {
        EffectLabel::Large
    }
}

pub fn effect_size(treatment: &Moments, control: &Moments, p_value: f64) -> EffectSize {
    let d = cohens_d(treatment, control);
    EffectSize {
        d,
        label: classify_effect(d, p_value),
    }
}

// ── Unimplemented Tests ─────────────────────────────────────────────

/// Mann-Whitney U. Not implemented: always returns a zeroed statistic with
/// `implemented == false`.
pub fn mann_whitney_u(_treatment: &Distribution, _control: &Distribution) -> TestStatistic {
    TestStatistic::default()
}

/// Chi-squared goodness of fit. Not implemented: zeroed statistic.
pub fn chi_squared(_treatment: &Distribution, _control: &Distribution) -> TestStatistic {
    TestStatistic::default()
}

/// Kolmogorov-Smirnov. Not implemented: zeroed statistic.
pub fn kolmogorov_smirnov(_treatment: &Distribution, _control: &Distribution) -> TestStatistic {
    TestStatistic::default()
}

// ── Confidence Interval ─────────────────────────────────────────────

/// Two-sided interval `mean ± t_{(1+level)/2, n-1} · se`.
/// Collapses to the mean when `n < 2`.
pub fn confidence_interval(moments: &Moments, level: f64) -> ConfidenceInterval {
    if moments.n < 2 {
        return ConfidenceInterval {
            level,
            lower: moments.mean,
            upper: moments.mean,
        };
    }
    let se = moments.standard_error();
    let critical = students_t_quantile((1.0 + level) / 2.0, (moments.n - 1) as f64);
    let h = se * critical;
    ConfidenceInterval {
        level,
        lower: moments.mean - h,
        upper: moments.mean + h,
    }
}

// ── Student's t Distribution ────────────────────────────────────────

/// Two-tailed p-value for Student's t-distribution with `df` degrees of freedom.
/// Uses the regularized incomplete beta representation.
pub fn students_t_two_tailed_p(t: f64, df: f64) -> f64 {
    if !df.is_finite() || df <= 0.0 {
        return 1.0;
    }
    let x = df / (df + t * t);
    regularized_incomplete_beta(df / 2.0, 0.5, x)
}

/// P(T <= t).
pub fn students_t_cdf(t: f64, df: f64) -> f64 {
    let tail = students_t_two_tailed_p(t, df) / 2.0;
    if t >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Inverse CDF by bisection on [`students_t_cdf`].
pub fn students_t_quantile(p: f64, df: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if p < 0.5 {
        return -students_t_quantile(1.0 - p, df);
    }

    let mut lo = 0.0;
    let mut hi = 1.0;
    while students_t_cdf(hi, df) < p && hi < 1.0e8 {
        hi *= 2.0;
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if students_t_cdf(mid, df) < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1.0e-12 {
            break;
        }
    }
    0.5 * (lo + hi)
}

// ── Incomplete Beta ─────────────────────────────────────────────────

/// I_x(a, b), evaluated on whichever side of the mean keeps the continued
/// fraction convergent.
fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_beta = ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b);
    let front = (a * x.ln() + b * (1.0 - x).ln() - ln_beta).exp();

    let value = if x * (a + b + 2.0) < a + 1.0 {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    };
    value.clamp(0.0, 1.0)
}

/// Modified Lentz evaluation of the incomplete beta continued fraction.
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    // Worst case is O(sqrt(max(a, b))) terms; large df needs headroom.
    const MAX_TERMS: usize = 10_000;
    const TOLERANCE: f64 = 1.0e-14;
    const TINY: f64 = 1.0e-300;

    let guard = |v: f64| if v.abs() < TINY { TINY } else { v };

    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - (a + b) * x / (a + 1.0));
    let mut f = d;

    for m in 1..=MAX_TERMS {
        let m = m as f64;
        let even = m * (b - m) * x / ((a + 2.0 * m - 1.0) * (a + 2.0 * m));
        let odd = -(a + m) * (a + b + m) * x / ((a + 2.0 * m) * (a + 2.0 * m + 1.0));

        let mut delta = 1.0;
        for coeff in [even, odd] {
            d = 1.0 / guard(1.0 + coeff * d);
            c = guard(1.0 + coeff / c);
            delta = c * d;
            f *= delta;
        }
        if (delta - 1.0).abs() < TOLERANCE {
            break;
        }
    }
    f
}

const LANCZOS_G: f64 = 7.0;

#[allow(clippy::excessive_precision)]
const LANCZOS_COEFFICIENTS: [f64; 9] = [
    0.99999999999980993,
    676.5203681218851,
    -1259.1392167224028,
    771.32342877765313,
    -176.61502916214059,
    12.507343278686905,
    -0.13857109526572012,
    9.9843695780195716e-6,
    1.5056327351493116e-7,
];

/// ln Γ(x), Lanczos series with reflection below 0.5.
fn ln_gamma(x: f64) -> f64 {
    use std::f64::consts::PI;

    if x < 0.5 {
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let z = x - 1.0;
    let series = LANCZOS_COEFFICIENTS[1..]
        .iter()
        .zip(1u32..)
        .fold(LANCZOS_COEFFICIENTS[0], |acc, (&coef, k)| acc + coef / (z + f64::from(k)));
    let base = z + LANCZOS_G + 0.5;

    0.5 * (2.0 * PI).ln() + (z + 0.5) * base.ln() - base + series.ln()
}
