//! Before/after partitioning around the integration year and the explicit
//! pairing used to difference the two sides.

use crate::config::PairingPolicy;
use crate::data::records::Yearly;
use crate::stats::StatsCalculator;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AnalysisError {
    #[error(
        "Cannot pair {column}: {before} years before the threshold but {after} after \
         (pairing policy 'match-shortest' keeps the years closest to the threshold)"
    )]
    PartitionSizeMismatch {
        column: String,
        before: usize,
        after: usize,
    },
    #[error("No years {period} {threshold}")]
    EmptyPartition { period: Period, threshold: i32 },
    #[error("{column} is undefined for {year}")]
    UndefinedValue { column: String, year: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Before,
    After,
}

impl Period {
    pub fn of(year: i32, threshold: i32) -> Self {
        if year < threshold {
            Period::Before
        } else {
            Period::After
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Period::Before => f.write_str("before"),
            Period::After => f.write_str("from"),
        }
    }
}

/// Rows split at `threshold`: before is `year < threshold`, after is the rest.
/// Both sides are in ascending year order.
#[derive(Debug, Clone)]
pub struct Partition<'a, T> {
    pub threshold: i32,
    pub before: Vec<&'a T>,
    pub after: Vec<&'a T>,
}

/// Mean of one column on each side of the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodMeans {
    pub before: Option<f64>,
    pub after: Option<f64>,
    /// Defined values that went into each mean.
    pub before_n: usize,
    pub after_n: usize,
}

impl PeriodMeans {
    pub fn change(&self) -> Option<f64> {
        Some(self.after? - self.before?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairedDifference {
    pub before_year: i32,
    pub after_year: i32,
    pub before: f64,
    pub after: f64,
    /// `after - before`.
    pub difference: f64,
}

/// A column differenced across the threshold, pair by pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairedSeries {
    pub column: String,
    pub pairs: Vec<PairedDifference>,
    /// Years left out to balance the partitions.
    pub dropped_years: Vec<i32>,
}

impl PairedSeries {
    pub fn differences(&self) -> Vec<f64> {
        self.pairs.iter().map(|p| p.difference).collect()
    }

    pub fn before_values(&self) -> Vec<f64> {
        self.pairs.iter().map(|p| p.before).collect()
    }

    pub fn after_values(&self) -> Vec<f64> {
        self.pairs.iter().map(|p| p.after).collect()
    }
}

impl<'a, T: Yearly> Partition<'a, T> {
    pub fn by_year(rows: &'a [T], threshold: i32) -> Self {
        let mut sorted: Vec<&T> = rows.iter().collect();
        sorted.sort_by_key(|row| row.year());

        let (before, after): (Vec<&T>, Vec<&T>) = sorted
            .into_iter()
            .partition(|row| Period::of(row.year(), threshold) == Period::Before);

        Self {
            threshold,
            before,
            after,
        }
    }

    pub fn side(&self, period: Period) -> &[&'a T] {
        match period {
            Period::Before => &self.before,
            Period::After => &self.after,
        }
    }

    /// Mean of `value` per side, ignoring rows where it is undefined.
    pub fn means<F>(&self, value: F) -> PeriodMeans
    where
        F: Fn(&T) -> Option<f64>,
    {
        let defined = |rows: &[&T]| -> Vec<f64> { rows.iter().filter_map(|r| value(*r)).collect() };
        let before = defined(self.before.as_slice());
        let after = defined(self.after.as_slice());

        PeriodMeans {
            before: StatsCalculator::mean(&before),
            after: StatsCalculator::mean(&after),
            before_n: before.len(),
            after_n: after.len(),
        }
    }

    /// Difference `value` across the threshold.
    ///
    /// The k-th year before the threshold pairs with the k-th year after it,
    /// both counted chronologically. Unequal sides are an error under
    /// [`PairingPolicy::Strict`]; [`PairingPolicy::MatchShortest`] drops the
    /// surplus years farthest from the threshold.
    pub fn paired_differences<F>(
        &self,
        column: &str,
        policy: PairingPolicy,
        value: F,
    ) -> Result<PairedSeries, AnalysisError>
    where
        F: Fn(&T) -> Option<f64>,
    {
        for period in [Period::Before, Period::After] {
            if self.side(period).is_empty() {
                return Err(AnalysisError::EmptyPartition {
                    period,
                    threshold: self.threshold,
                });
            }
        }

        let (n_before, n_after) = (self.before.len(), self.after.len());
        let kept = match policy {
            PairingPolicy::Strict if n_before != n_after => {
                return Err(AnalysisError::PartitionSizeMismatch {
                    column: column.to_string(),
                    before: n_before,
                    after: n_after,
                });
            }
            PairingPolicy::Strict => n_before,
            PairingPolicy::MatchShortest => n_before.min(n_after),
        };

        let before = &self.before[n_before - kept..];
        let after = &self.after[..kept];
        let dropped_years: Vec<i32> = self.before[..n_before - kept]
            .iter()
            .chain(&self.after[kept..])
            .map(|row| row.year())
            .collect();
        if !dropped_years.is_empty() {
            log::warn!(
                "{}: dropping years {:?} to pair {} years on each side of {}",
                column,
                dropped_years,
                kept,
                self.threshold
            );
        }

        let defined = |row: &T| {
            value(row).ok_or_else(|| AnalysisError::UndefinedValue {
                column: column.to_string(),
                year: row.year(),
            })
        };

        let pairs = before
            .iter()
            .zip(after)
            .map(|(b, a)| {
                let (before_value, after_value) = (defined(*b)?, defined(*a)?);
                Ok(PairedDifference {
                    before_year: b.year(),
                    after_year: a.year(),
                    before: before_value,
                    after: after_value,
                    difference: after_value - before_value,
                })
            })
            .collect::<Result<Vec<_>, AnalysisError>>()?;

        Ok(PairedSeries {
            column: column.to_string(),
            pairs,
            dropped_years,
        })
    }
}
