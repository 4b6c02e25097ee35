//! Hypothesis Tests Module
//! Shapiro-Wilk normality test and Student t-tests on a derived sample.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use std::f64::consts::{FRAC_1_SQRT_2, PI};
use thiserror::Error;

/// Shapiro-Wilk is only defined (Royston 1995) for 3..=5000 observations.
pub const SHAPIRO_WILK_MAX_N: usize = 5000;

#[derive(Error, Debug, PartialEq)]
pub enum StatsError {
    #[error("{test} needs at least {needed} observations, got {got}")]
    TooFewObservations {
        test: TestKind,
        needed: usize,
        got: usize,
    },
    #[error("{test} accepts at most {limit} observations, got {got}")]
    TooManyObservations {
        test: TestKind,
        limit: usize,
        got: usize,
    },
    #[error("{test}: all observations are identical")]
    ZeroRange { test: TestKind },
    #[error("{test}: data are essentially constant")]
    ConstantData { test: TestKind },
    #[error("{test}: samples differ in length ({left} vs {right})")]
    LengthMismatch {
        test: TestKind,
        left: usize,
        right: usize,
    },
    #[error("Distribution error: {0}")]
    Distribution(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    ShapiroWilk,
    OneSampleT,
    PairedT,
    WelchT,
}

impl TestKind {
    pub fn label(self) -> &'static str {
        match self {
            TestKind::ShapiroWilk => "Shapiro-Wilk normality test",
            TestKind::OneSampleT => "One Sample t-test",
            TestKind::PairedT => "Paired t-test",
            TestKind::WelchT => "Welch Two Sample t-test",
        }
    }

    pub fn null_hypothesis(self) -> &'static str {
        match self {
            TestKind::ShapiroWilk => "sample drawn from a normal distribution",
            TestKind::OneSampleT => "true mean equals the reference value",
            TestKind::PairedT => "true mean difference equals the reference value",
            TestKind::WelchT => "true difference in means is zero",
        }
    }
}

impl std::fmt::Display for TestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of a single hypothesis test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestOutcome {
    pub test: TestKind,
    pub n: usize,
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: Option<f64>,
    /// Sample mean (or mean difference) for t-tests.
    pub estimate: Option<f64>,
    pub confidence_interval: Option<[f64; 2]>,
    pub alpha: f64,
    /// `p_value < alpha`.
    pub reject_null: bool,
}

impl TestOutcome {
    fn new(test: TestKind, n: usize, statistic: f64, p_value: f64, alpha: f64) -> Self {
        Self {
            test,
            n,
            statistic,
            p_value,
            degrees_of_freedom: None,
            estimate: None,
            confidence_interval: None,
            alpha,
            reject_null: p_value < alpha,
        }
    }
}

fn distribution_error(err: impl std::fmt::Display) -> StatsError {
    StatsError::Distribution(err.to_string())
}

/// Standard Student t with `df` degrees of freedom.
pub(crate) fn students_t(df: f64) -> Result<StudentsT, StatsError> {
    StudentsT::new(0.0, 1.0, df).map_err(distribution_error)
}

/// Two-sided p-value of `t`.
pub(crate) fn two_sided_p(dist: &StudentsT, t: f64) -> f64 {
    (2.0 * dist.sf(t.abs())).min(1.0)
}

// Royston (1995) AS R94 polynomial coefficients
const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.07119, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.544, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const G: [f64; 2] = [-2.273, 0.459];

/// `cc[0] + cc[1] x + cc[2] x^2 + ...`
fn poly(cc: &[f64], x: f64) -> f64 {
    cc.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Half of the antisymmetric weight vector, largest weight first.
fn shapiro_wilk_weights(n: usize, normal: &Normal) -> Vec<f64> {
    if n == 3 {
        return vec![FRAC_1_SQRT_2];
    }

    let half = n / 2;
    let an25 = n as f64 + 0.25;
    let m: Vec<f64> = (1..=half)
        .map(|i| normal.inverse_cdf((i as f64 - 0.375) / an25))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / (n as f64).sqrt();

    let a1 = poly(&C1, rsn) - m[0] / ssumm2;
    let mut weights = Vec::with_capacity(half);
    weights.push(a1);

    let (first, fac) = if n > 5 {
        let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
        weights.push(a2);
        let fac = ((summ2 - 2.0 * m[0].powi(2) - 2.0 * m[1].powi(2))
            / (1.0 - 2.0 * a1.powi(2) - 2.0 * a2.powi(2)))
        .sqrt();
        (2, fac)
    } else {
        let fac = ((summ2 - 2.0 * m[0].powi(2)) / (1.0 - 2.0 * a1.powi(2))).sqrt();
        (1, fac)
    };

    weights.extend(m[first..].iter().map(|mi| -mi / fac));
    weights
}

fn shapiro_wilk_p_value(w: f64, n: usize) -> Result<f64, StatsError> {
    if n == 3 {
        // Exact distribution for three observations
        let pw = 6.0 / PI * (w.sqrt().asin() - PI / 3.0);
        return Ok(pw.clamp(0.0, 1.0));
    }

    let an = n as f64;
    let y = (1.0 - w).ln();
    let (y, mean, sd) = if n <= 11 {
        let gamma = poly(&G, an);
        if y >= gamma {
            return Ok(1e-99);
        }
        (-(gamma - y).ln(), poly(&C3, an), poly(&C4, an).exp())
    } else {
        let ln_n = an.ln();
        (y, poly(&C5, ln_n), poly(&C6, ln_n).exp())
    };

    let dist = Normal::new(mean, sd).map_err(distribution_error)?;
    Ok(dist.sf(y).clamp(0.0, 1.0))
}

/// Shapiro-Wilk test of H0 "the sample comes from a normal distribution".
pub fn shapiro_wilk(sample: &[f64], alpha: f64) -> Result<TestOutcome, StatsError> {
    let test = TestKind::ShapiroWilk;
    let n = sample.len();
    if n < 3 {
        return Err(StatsError::TooFewObservations { test, needed: 3, got: n });
    }
    if n > SHAPIRO_WILK_MAX_N {
        return Err(StatsError::TooManyObservations {
            test,
            limit: SHAPIRO_WILK_MAX_N,
            got: n,
        });
    }

    let mut x = sample.to_vec();
    x.sort_by(f64::total_cmp);
    if x[n - 1] - x[0] < 1e-19 {
        return Err(StatsError::ZeroRange { test });
    }

    let normal = Normal::new(0.0, 1.0).map_err(distribution_error)?;
    let weights = shapiro_wilk_weights(n, &normal);

    let mean = x.iter().sum::<f64>() / n as f64;
    let ssq: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    let b: f64 = weights
        .iter()
        .enumerate()
        .map(|(i, a)| a * (x[n - 1 - i] - x[i]))
        .sum();
    let w = (b * b / ssq).min(1.0);

    let p_value = shapiro_wilk_p_value(w, n)?;
    log::debug!("Shapiro-Wilk n={} W={:.5} p={:.5}", n, w, p_value);
    Ok(TestOutcome::new(test, n, w, p_value, alpha))
}

/// Two-sided one-sample t-test of H0 "mean == mu".
pub fn one_sample_t_test(sample: &[f64], mu: f64, alpha: f64) -> Result<TestOutcome, StatsError> {
    let test = TestKind::OneSampleT;
    let n = sample.len();
    if n < 2 {
        return Err(StatsError::TooFewObservations { test, needed: 2, got: n });
    }

    let nf = n as f64;
    let mean = sample.iter().sum::<f64>() / nf;
    let variance = sample.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (nf - 1.0);
    let se = (variance / nf).sqrt();
    if se <= 10.0 * f64::EPSILON * mean.abs() || se == 0.0 {
        return Err(StatsError::ConstantData { test });
    }

    let df = nf - 1.0;
    let t = (mean - mu) / se;
    let dist = students_t(df)?;
    let p_value = two_sided_p(&dist, t);
    let margin = dist.inverse_cdf(1.0 - alpha / 2.0) * se;

    let mut outcome = TestOutcome::new(test, n, t, p_value, alpha);
    outcome.degrees_of_freedom = Some(df);
    outcome.estimate = Some(mean);
    outcome.confidence_interval = Some([mean - margin, mean + margin]);
    Ok(outcome)
}

/// Two-sided paired t-test on `after - before`.
pub fn paired_t_test(
    after: &[f64],
    before: &[f64],
    mu: f64,
    alpha: f64,
) -> Result<TestOutcome, StatsError> {
    if after.len() != before.len() {
        return Err(StatsError::LengthMismatch {
            test: TestKind::PairedT,
            left: after.len(),
            right: before.len(),
        });
    }
    let differences: Vec<f64> = after.iter().zip(before).map(|(a, b)| a - b).collect();

    let mut outcome = one_sample_t_test(&differences, mu, alpha).map_err(|err| match err {
        StatsError::TooFewObservations { needed, got, .. } => StatsError::TooFewObservations {
            test: TestKind::PairedT,
            needed,
            got,
        },
        StatsError::ConstantData { .. } => StatsError::ConstantData {
            test: TestKind::PairedT,
        },
        other => other,
    })?;
    outcome.test = TestKind::PairedT;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn poly_evaluates_ascending_coefficients() {
        assert_eq!(poly(&[1.0, 2.0, 3.0], 2.0), 17.0);
        assert_eq!(poly(&G, 10.0), -2.273 + 0.459 * 10.0);
    }

    #[test]
    fn three_equally_spaced_points_are_perfectly_normal() {
        let outcome = shapiro_wilk(&[1.0, 2.0, 3.0], 0.05).unwrap();
        assert!(close(outcome.statistic, 1.0, 1e-12));
        assert!(close(outcome.p_value, 1.0, 1e-9));
        assert!(!outcome.reject_null);
    }

    #[test]
    fn shapiro_wilk_flags_skewed_weights() {
        // Shapiro & Wilk (1965), weights of eleven men
        let weights = [
            148.0, 154.0, 158.0, 160.0, 161.0, 162.0, 166.0, 170.0, 182.0, 195.0, 236.0,
        ];
        let outcome = shapiro_wilk(&weights, 0.05).unwrap();
        assert!(close(outcome.statistic, 0.79, 0.01), "W = {}", outcome.statistic);
        assert!(outcome.p_value < 0.01, "p = {}", outcome.p_value);
        assert!(outcome.reject_null);
    }

    #[test]
    fn shapiro_wilk_accepts_normal_scores() {
        // Expected normal order statistics are as normal as a sample gets
        let normal = Normal::new(0.0, 1.0).unwrap();
        let n = 20;
        let sample: Vec<f64> = (1..=n)
            .map(|i| normal.inverse_cdf((i as f64 - 0.375) / (n as f64 + 0.25)))
            .collect();
        let outcome = shapiro_wilk(&sample, 0.05).unwrap();
        assert!(outcome.statistic > 0.98);
        assert!(outcome.p_value > 0.5);
        assert!(!outcome.reject_null);
    }

    #[test]
    fn shapiro_wilk_is_order_independent() {
        let a = shapiro_wilk(&[4.1, 2.2, 9.5, 3.3, 5.0, 6.8], 0.05).unwrap();
        let b = shapiro_wilk(&[9.5, 6.8, 5.0, 4.1, 3.3, 2.2], 0.05).unwrap();
        assert_eq!(a.statistic, b.statistic);
        assert_eq!(a.p_value, b.p_value);
    }

    #[test]
    fn shapiro_wilk_rejects_degenerate_samples() {
        assert_eq!(
            shapiro_wilk(&[1.0, 2.0], 0.05).unwrap_err(),
            StatsError::TooFewObservations { test: TestKind::ShapiroWilk, needed: 3, got: 2 }
        );
        assert_eq!(
            shapiro_wilk(&[5.0; 6], 0.05).unwrap_err(),
            StatsError::ZeroRange { test: TestKind::ShapiroWilk }
        );
        let big = vec![0.0; SHAPIRO_WILK_MAX_N + 1];
        assert!(matches!(
            shapiro_wilk(&big, 0.05),
            Err(StatsError::TooManyObservations { .. })
        ));
    }

    #[test]
    fn one_sample_t_test_matches_reference() {
        // t.test(1:5) in R: t = 4.2426, df = 4, p-value = 0.01324
        let outcome = one_sample_t_test(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.0, 0.05).unwrap();
        assert!(close(outcome.statistic, 4.242641, 1e-5));
        assert_eq!(outcome.degrees_of_freedom, Some(4.0));
        assert!(close(outcome.p_value, 0.01324, 1e-4));
        assert!(outcome.reject_null);
        let [lo, hi] = outcome.confidence_interval.unwrap();
        assert!(close(lo, 1.036757, 1e-4));
        assert!(close(hi, 4.963243, 1e-4));
    }

    #[test]
    fn one_sample_t_test_against_reference_mean() {
        let outcome = one_sample_t_test(&[1.0, 2.0, 3.0, 4.0, 5.0], 3.0, 0.05).unwrap();
        assert_eq!(outcome.statistic, 0.0);
        assert!(close(outcome.p_value, 1.0, 1e-12));
        assert!(!outcome.reject_null);
    }

    #[test]
    fn constant_sample_has_no_t_statistic() {
        assert_eq!(
            one_sample_t_test(&[2.0, 2.0, 2.0], 0.0, 0.05).unwrap_err(),
            StatsError::ConstantData { test: TestKind::OneSampleT }
        );
        assert!(matches!(
            one_sample_t_test(&[2.0], 0.0, 0.05),
            Err(StatsError::TooFewObservations { needed: 2, got: 1, .. })
        ));
    }

    #[test]
    fn paired_t_test_uses_differences() {
        let before = [10.0, 12.0, 11.0, 13.0, 9.0];
        let after = [11.0, 14.0, 14.0, 17.0, 14.0];
        let paired = paired_t_test(&after, &before, 0.0, 0.05).unwrap();
        let direct = one_sample_t_test(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.0, 0.05).unwrap();
        assert_eq!(paired.test, TestKind::PairedT);
        assert!(close(paired.statistic, direct.statistic, 1e-12));
        assert!(close(paired.p_value, direct.p_value, 1e-12));
    }

    #[test]
    fn paired_t_test_requires_equal_lengths() {
        assert_eq!(
            paired_t_test(&[1.0, 2.0, 3.0], &[1.0, 2.0], 0.0, 0.05).unwrap_err(),
            StatsError::LengthMismatch { test: TestKind::PairedT, left: 3, right: 2 }
        );
    }
}
