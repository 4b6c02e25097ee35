//! Statistics Calculator Module
//! Descriptive statistics and the Welch two-sample t-test.

use crate::stats::hypothesis::{students_t, two_sided_p, StatsError, TestKind, TestOutcome};
use serde::Serialize;
use statrs::distribution::ContinuousCDF;

/// Descriptive statistics for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub variance: f64,
    pub min: f64,
    pub p05: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub p95: f64,
    pub max: f64,
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            std: f64::NAN,
            variance: f64::NAN,
            min: f64::NAN,
            p05: f64::NAN,
            q1: f64::NAN,
            median: f64::NAN,
            q3: f64::NAN,
            p95: f64::NAN,
            max: f64::NAN,
        }
    }
}

/// Handles descriptive statistics and two-sample comparisons.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Arithmetic mean, `None` for an empty slice.
    pub fn mean(values: &[f64]) -> Option<f64> {
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(values: &[f64]) -> Summary {
        let n = values.len();
        if n == 0 {
            return Summary::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mean = values.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };

        Summary {
            count: n,
            mean,
            std: variance.sqrt(),
            variance,
            min: sorted[0],
            p05: Self::percentile(&sorted, 5.0),
            q1: Self::percentile(&sorted, 25.0),
            median: Self::percentile(&sorted, 50.0),
            q3: Self::percentile(&sorted, 75.0),
            p95: Self::percentile(&sorted, 95.0),
            max: sorted[n - 1],
        }
    }

    /// Calculate percentile using linear interpolation (NumPy / R type 7).
    pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    /// Perform Welch's t-test (independent samples, unequal variance).
    pub fn welch_t_test(
        group_values: &[f64],
        control_values: &[f64],
        alpha: f64,
    ) -> Result<TestOutcome, StatsError> {
        let test = TestKind::WelchT;
        let smaller = group_values.len().min(control_values.len());
        if smaller < 2 {
            return Err(StatsError::TooFewObservations {
                test,
                needed: 2,
                got: smaller,
            });
        }

        let n1 = group_values.len() as f64;
        let n2 = control_values.len() as f64;

        let mean1 = group_values.iter().sum::<f64>() / n1;
        let mean2 = control_values.iter().sum::<f64>() / n2;

        let var1 = group_values
            .iter()
            .map(|x| (x - mean1).powi(2))
            .sum::<f64>()
            / (n1 - 1.0);
        let var2 = control_values
            .iter()
            .map(|x| (x - mean2).powi(2))
            .sum::<f64>()
            / (n2 - 1.0);

        let se = (var1 / n1 + var2 / n2).sqrt();
        if se == 0.0 {
            return Err(StatsError::ConstantData { test });
        }

        let t = (mean1 - mean2) / se;

        // Welch-Satterthwaite degrees of freedom
        let df_num = (var1 / n1 + var2 / n2).powi(2);
        let df_denom = (var1 / n1).powi(2) / (n1 - 1.0) + (var2 / n2).powi(2) / (n2 - 1.0);
        let df = df_num / df_denom;

        let dist = students_t(df)?;
        let p_value = two_sided_p(&dist, t);
        let margin = dist.inverse_cdf(1.0 - alpha / 2.0) * se;
        let estimate = mean1 - mean2;

        Ok(TestOutcome {
            test,
            n: group_values.len() + control_values.len(),
            statistic: t,
            p_value,
            degrees_of_freedom: Some(df),
            estimate: Some(estimate),
            confidence_interval: Some([estimate - margin, estimate + margin]),
            alpha,
            reject_null: p_value < alpha,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_matches_r_summary() {
        // summary(c(1, 2, 3, 4, 100))
        let s = StatsCalculator::compute_descriptive_stats(&[4.0, 100.0, 1.0, 3.0, 2.0]);
        assert_eq!(s.count, 5);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.q1, 2.0);
        assert_eq!(s.median, 3.0);
        assert_eq!(s.mean, 22.0);
        assert_eq!(s.q3, 4.0);
        assert_eq!(s.max, 100.0);
    }

    #[test]
    fn even_count_median_interpolates() {
        let s = StatsCalculator::compute_descriptive_stats(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(s.median, 2.5);
        assert_eq!(s.q1, 1.75);
        assert!((s.variance - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_input_is_nan_not_panic() {
        let s = StatsCalculator::compute_descriptive_stats(&[]);
        assert_eq!(s.count, 0);
        assert!(s.mean.is_nan());
        assert_eq!(StatsCalculator::mean(&[]), None);
    }

    #[test]
    fn welch_matches_reference() {
        // t.test(1:5, c(2, 4, 6, 8, 10)): t = -1.8974, df = 5.8824, p-value = 0.1075
        let outcome = StatsCalculator::welch_t_test(
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            &[2.0, 4.0, 6.0, 8.0, 10.0],
            0.05,
        )
        .unwrap();
        assert!((outcome.statistic - -1.897367).abs() < 1e-5);
        assert!((outcome.degrees_of_freedom.unwrap() - 5.882353).abs() < 1e-5);
        assert!((outcome.p_value - 0.1075).abs() < 2e-3);
        assert!(!outcome.reject_null);
        assert_eq!(outcome.estimate, Some(-3.0));
    }

    #[test]
    fn welch_needs_two_observations_per_side() {
        assert!(matches!(
            StatsCalculator::welch_t_test(&[1.0], &[1.0, 2.0], 0.05),
            Err(StatsError::TooFewObservations { got: 1, .. })
        ));
    }
}
