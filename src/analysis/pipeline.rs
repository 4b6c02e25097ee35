//! Analysis Pipeline Module
//! Load, validate, derive, partition and test, producing one report.

use crate::analysis::partition::{AnalysisError, PairedSeries, Partition, PeriodMeans};
use crate::config::{AnalysisConfig, ConfigError, DataSources};
use crate::data::records::{
    AgeGroupTable, EnrolmentRecord, FormsRecord, MergedColumn, MergedRecord, PassRateRecord,
    YearRecord,
};
use crate::data::{schema, DataLoader, DataProcessor, LoaderError, ProcessorError, SchemaError};
use crate::stats::{
    one_sample_t_test, paired_t_test, shapiro_wilk, StatsCalculator, StatsError, Summary,
    TestOutcome,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Stats(#[from] StatsError),
}

/// Male pass-rate estimates compared across the threshold.
pub const COMPARED_COLUMNS: [MergedColumn; 2] =
    [MergedColumn::PassRateL6Male, MergedColumn::PassRateU6Male];

/// The four validated input tables.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub enrolment: Vec<EnrolmentRecord>,
    pub age_groups: AgeGroupTable,
    pub forms: Vec<FormsRecord>,
    pub pass_rates: Vec<PassRateRecord>,
}

impl Inputs {
    pub fn load(sources: &DataSources) -> Result<Self, PipelineError> {
        let enrolment = DataLoader::load_csv("enrolment", &sources.enrolment)?;
        let age_groups = DataLoader::load_csv("age groups", &sources.age_groups)?;
        let forms = DataLoader::load_csv("forms", &sources.forms)?;
        let pass_rates = DataLoader::load_csv("pass rates", &sources.pass_rates)?;

        Ok(Self {
            enrolment: schema::parse_enrolment(&enrolment)?,
            age_groups: schema::parse_age_groups(&age_groups)?,
            forms: schema::parse_forms(&forms)?,
            pass_rates: schema::parse_pass_rates(&pass_rates)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub summary: Summary,
}

impl ColumnSummary {
    fn of(column: impl Into<String>, values: &[f64]) -> Self {
        Self {
            column: column.into(),
            summary: StatsCalculator::compute_descriptive_stats(values),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrolmentAnalysis {
    pub rows: Vec<YearRecord>,
    pub summaries: Vec<ColumnSummary>,
    pub peak_year: Option<i32>,
    pub peak_total: Option<u64>,
    /// First year with any female enrolment.
    pub first_integration_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BracketTrend {
    pub bracket: String,
    pub means: PeriodMeans,
    pub total_after: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgeGroupAnalysis {
    pub table: AgeGroupTable,
    pub total_mismatch_years: Vec<i32>,
    pub trends: Vec<BracketTrend>,
    /// Bracket with the most students summed over the "after" years.
    pub largest_bracket_after: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeanComparison {
    pub column: String,
    pub means: PeriodMeans,
    /// Welch test of the before values against the after values, when both
    /// sides have enough variation.
    pub welch: Option<TestOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassRateAnalysis {
    pub rows: Vec<MergedRecord>,
    pub comparisons: Vec<MeanComparison>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DifferenceAnalysis {
    pub series: Vec<PairedSeries>,
    pub paired_tests: Vec<TestOutcome>,
    pub summaries: Vec<ColumnSummary>,
    /// All series' differences, concatenated in series order.
    pub combined: Vec<f64>,
    pub normality: TestOutcome,
    pub mean_test: TestOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub config: AnalysisConfig,
    pub enrolment: EnrolmentAnalysis,
    pub age_groups: AgeGroupAnalysis,
    pub pass_rates: PassRateAnalysis,
    pub differences: DifferenceAnalysis,
}

/// Runs the whole before/after analysis for one configuration.
pub struct Pipeline {
    config: AnalysisConfig,
}

impl Pipeline {
    pub fn new(config: AnalysisConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Read the configured files and analyse them.
    pub fn run(&self) -> Result<AnalysisReport, PipelineError> {
        log::info!("Loading input tables");
        let inputs = Inputs::load(&self.config.sources)?;
        self.analyse(&inputs)
    }

    pub fn analyse(&self, inputs: &Inputs) -> Result<AnalysisReport, PipelineError> {
        log::info!("Analysing around {}", self.config.threshold_year);

        let enrolment = self.enrolment(&inputs.enrolment);
        let age_groups = self.age_groups(&inputs.age_groups);

        let merged = DataProcessor::merge_forms_with_pass_rates(&inputs.forms, &inputs.pass_rates)?;
        log::debug!("Merged {} years of forms and pass rates", merged.len());
        let partition = Partition::by_year(&merged, self.config.threshold_year);

        let pass_rates = PassRateAnalysis {
            comparisons: self.mean_comparisons(&partition),
            rows: merged.clone(),
        };
        let differences = self.differences(&partition)?;

        Ok(AnalysisReport {
            config: self.config.clone(),
            enrolment,
            age_groups,
            pass_rates,
            differences,
        })
    }

    fn enrolment(&self, records: &[EnrolmentRecord]) -> EnrolmentAnalysis {
        let rows = DataProcessor::enrolment_metrics(records);

        let column = |f: fn(&YearRecord) -> u32| -> Vec<f64> {
            rows.iter().map(|r| f64::from(f(r))).collect()
        };
        let summaries = vec![
            ColumnSummary::of("Male", &column(|r| r.male)),
            ColumnSummary::of("Female", &column(|r| r.female)),
            ColumnSummary::of(
                "Total_Enrolment",
                &rows.iter().map(|r| r.total as f64).collect::<Vec<_>>(),
            ),
        ];

        // Earliest year wins a tie
        let peak = rows
            .iter()
            .reduce(|best, r| if r.total > best.total { r } else { best })
            .map(|r| (r.year, r.total));
        let first_integration_year = rows.iter().find(|r| r.female > 0).map(|r| r.year);

        EnrolmentAnalysis {
            peak_year: peak.map(|(year, _)| year),
            peak_total: peak.map(|(_, total)| total),
            first_integration_year,
            summaries,
            rows,
        }
    }

    fn age_groups(&self, table: &AgeGroupTable) -> AgeGroupAnalysis {
        let total_mismatch_years = DataProcessor::age_group_total_mismatches(table);
        let partition = Partition::by_year(&table.rows, self.config.threshold_year);

        let trends: Vec<BracketTrend> = table
            .brackets
            .iter()
            .enumerate()
            .map(|(i, bracket)| BracketTrend {
                bracket: bracket.clone(),
                means: partition.means(|r| r.counts.get(i).map(|&c| f64::from(c))),
                total_after: partition
                    .after
                    .iter()
                    .filter_map(|r| r.counts.get(i))
                    .map(|&c| u64::from(c))
                    .sum(),
            })
            .collect();

        // First bracket in header order wins a tie
        let largest_bracket_after = if partition.after.is_empty() {
            None
        } else {
            trends
                .iter()
                .reduce(|best, t| if t.total_after > best.total_after { t } else { best })
                .map(|t| t.bracket.clone())
        };

        AgeGroupAnalysis {
            table: table.clone(),
            total_mismatch_years,
            trends,
            largest_bracket_after,
        }
    }

    fn mean_comparisons(&self, partition: &Partition<'_, MergedRecord>) -> Vec<MeanComparison> {
        COMPARED_COLUMNS
            .iter()
            .map(|&column| {
                let side = |rows: &[&MergedRecord]| -> Vec<f64> {
                    rows.iter().filter_map(|r| r.value(column)).collect()
                };
                let welch = StatsCalculator::welch_t_test(
                    &side(partition.after.as_slice()),
                    &side(partition.before.as_slice()),
                    self.config.alpha,
                )
                .inspect_err(|err| log::warn!("{}: Welch test skipped: {}", column.name(), err))
                .ok();

                MeanComparison {
                    column: column.name().to_string(),
                    means: partition.means(|r| r.value(column)),
                    welch,
                }
            })
            .collect()
    }

    fn differences(
        &self,
        partition: &Partition<'_, MergedRecord>,
    ) -> Result<DifferenceAnalysis, PipelineError> {
        let config = &self.config;

        let series = COMPARED_COLUMNS
            .iter()
            .map(|&column| {
                partition.paired_differences(column.name(), config.pairing, |r| r.value(column))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let paired_tests = series
            .iter()
            .map(|s| {
                paired_t_test(
                    &s.after_values(),
                    &s.before_values(),
                    config.reference_mean,
                    config.alpha,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let combined: Vec<f64> = series.iter().flat_map(|s| s.differences()).collect();

        let mut summaries: Vec<ColumnSummary> = series
            .iter()
            .map(|s| ColumnSummary::of(format!("diff_{}", s.column), &s.differences()))
            .collect();
        summaries.push(ColumnSummary::of("diff_combined", &combined));

        let normality = shapiro_wilk(&combined, config.alpha)?;
        let mean_test = one_sample_t_test(&combined, config.reference_mean, config.alpha)?;
        log::info!(
            "Combined differences: n={} W={:.4} (p={:.4}), t={:.4} (p={:.3e})",
            combined.len(),
            normality.statistic,
            normality.p_value,
            mean_test.statistic,
            mean_test.p_value
        );

        Ok(DifferenceAnalysis {
            series,
            paired_tests,
            summaries,
            combined,
            normality,
            mean_test,
        })
    }
}
