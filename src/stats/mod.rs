//! Statistics module - descriptive statistics and hypothesis tests

pub mod calculator;
pub mod hypothesis;

pub use calculator::{StatsCalculator, Summary};
pub use hypothesis::{
    one_sample_t_test, paired_t_test, shapiro_wilk, StatsError, TestKind, TestOutcome,
};
