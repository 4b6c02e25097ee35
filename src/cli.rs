//! Command-line arguments

use crate::config::{AnalysisConfig, DataSources, PairingPolicy, DEFAULT_ALPHA, DEFAULT_THRESHOLD_YEAR};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "integration_trends")]
#[command(about = "Enrolment and pass-rate trends before and after a gender-integration year", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Directory holding Enrolment.csv, AgeGroup.csv, Forms.csv and PassRates.csv
    #[arg(short, long, env = "INTEGRATION_TRENDS_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Enrolment table (overrides --data-dir)
    #[arg(long)]
    pub enrolment: Option<PathBuf>,

    /// Age-group table (overrides --data-dir)
    #[arg(long)]
    pub age_groups: Option<PathBuf>,

    /// Forms table (overrides --data-dir)
    #[arg(long)]
    pub forms: Option<PathBuf>,

    /// Pass-rate table (overrides --data-dir)
    #[arg(long)]
    pub pass_rates: Option<PathBuf>,

    /// First year of the "after" period
    #[arg(short, long, default_value_t = DEFAULT_THRESHOLD_YEAR)]
    pub threshold_year: i32,

    /// Significance level for every test
    #[arg(short, long, default_value_t = DEFAULT_ALPHA)]
    pub alpha: f64,

    /// Hypothesised mean pass-rate difference
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub reference_mean: f64,

    /// How to pair years when the two periods differ in length
    #[arg(short, long, value_enum, default_value_t = Pairing::Strict)]
    pub pairing: Pairing,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pairing {
    /// Fail when the periods differ in length
    Strict,
    /// Keep the years closest to the threshold on both sides
    MatchShortest,
}

impl From<Pairing> for PairingPolicy {
    fn from(pairing: Pairing) -> Self {
        match pairing {
            Pairing::Strict => PairingPolicy::Strict,
            Pairing::MatchShortest => PairingPolicy::MatchShortest,
        }
    }
}

impl Cli {
    pub fn analysis_config(&self) -> AnalysisConfig {
        let defaults = DataSources::from_dir(&self.data_dir);
        let pick = |path: &Option<PathBuf>, default: PathBuf| path.clone().unwrap_or(default);

        AnalysisConfig {
            sources: DataSources {
                enrolment: pick(&self.enrolment, defaults.enrolment),
                age_groups: pick(&self.age_groups, defaults.age_groups),
                forms: pick(&self.forms, defaults.forms),
                pass_rates: pick(&self.pass_rates, defaults.pass_rates),
            },
            threshold_year: self.threshold_year,
            alpha: self.alpha,
            reference_mean: self.reference_mean,
            pairing: self.pairing.into(),
        }
    }
}
