//! Analysis Configuration Module
//! Data source locations and the knobs of the before/after comparison.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Year the first girls were admitted.
pub const DEFAULT_THRESHOLD_YEAR: i32 = 2017;

/// Significance threshold for every hypothesis test.
pub const DEFAULT_ALPHA: f64 = 0.05;

pub const ENROLMENT_FILE: &str = "Enrolment.csv";
pub const AGE_GROUP_FILE: &str = "AgeGroup.csv";
pub const FORMS_FILE: &str = "Forms.csv";
pub const PASS_RATES_FILE: &str = "PassRates.csv";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Significance level must lie in (0, 1), got {0}")]
    InvalidAlpha(f64),
    #[error("Reference mean must be finite, got {0}")]
    InvalidReferenceMean(f64),
}

/// How "before" and "after" partitions are paired for differencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PairingPolicy {
    /// Partitions must have the same number of years.
    #[default]
    Strict,
    /// Keep the years closest to the threshold so both sides are equally long.
    MatchShortest,
}

/// Locations of the four input tables.
#[derive(Debug, Clone, Serialize)]
pub struct DataSources {
    pub enrolment: PathBuf,
    pub age_groups: PathBuf,
    pub forms: PathBuf,
    pub pass_rates: PathBuf,
}

impl DataSources {
    /// Default file names inside `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            enrolment: dir.join(ENROLMENT_FILE),
            age_groups: dir.join(AGE_GROUP_FILE),
            forms: dir.join(FORMS_FILE),
            pass_rates: dir.join(PASS_RATES_FILE),
        }
    }
}

impl Default for DataSources {
    fn default() -> Self {
        Self::from_dir(".")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisConfig {
    pub sources: DataSources,
    pub threshold_year: i32,
    pub alpha: f64,
    /// Hypothesised mean of the pass-rate differences.
    pub reference_mean: f64,
    pub pairing: PairingPolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sources: DataSources::default(),
            threshold_year: DEFAULT_THRESHOLD_YEAR,
            alpha: DEFAULT_ALPHA,
            reference_mean: 0.0,
            pairing: PairingPolicy::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigError::InvalidAlpha(self.alpha));
        }
        if !self.reference_mean.is_finite() {
            return Err(ConfigError::InvalidReferenceMean(self.reference_mean));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_use_default_file_names() {
        let sources = DataSources::from_dir("/data/falcon");
        assert_eq!(sources.enrolment, PathBuf::from("/data/falcon/Enrolment.csv"));
        assert_eq!(sources.age_groups, PathBuf::from("/data/falcon/AgeGroup.csv"));
        assert_eq!(sources.forms, PathBuf::from("/data/falcon/Forms.csv"));
        assert_eq!(sources.pass_rates, PathBuf::from("/data/falcon/PassRates.csv"));
    }

    #[test]
    fn alpha_outside_unit_interval_is_rejected() {
        for alpha in [0.0, 1.0, -0.1, f64::NAN] {
            let config = AnalysisConfig {
                alpha,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(ConfigError::InvalidAlpha(_))));
        }
        assert!(AnalysisConfig::default().validate().is_ok());
    }
}
