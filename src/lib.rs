//! Integration Trends - enrolment, age-group and pass-rate analysis around
//! the year a school started admitting girls.
//!
//! Four CSV tables are validated into typed records, derived columns are
//! computed, rows are split at a threshold year, and the pass-rate
//! differences across that year are tested for normality and for a non-zero
//! mean.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod data;
pub mod report;
pub mod stats;

pub use analysis::{AnalysisReport, Pipeline, PipelineError};
pub use config::{AnalysisConfig, DataSources, PairingPolicy};
