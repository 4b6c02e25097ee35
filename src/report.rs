//! Report Presenter Module
//! Renders an [`AnalysisReport`] as printed tables or as JSON.

use crate::analysis::pipeline::{ColumnSummary, MeanComparison};
use crate::analysis::{AnalysisReport, PairedSeries};
use crate::data::records::{AgeGroupTable, MergedRecord, YearRecord};
use crate::stats::{TestKind, TestOutcome};
use polars::prelude::*;
use std::fmt::{self, Write as _};
use thiserror::Error;

/// Shown wherever the per-gender pass rates appear.
pub const ESTIMATE_NOTE: &str = "Per-gender pass rates are estimates (gender share of the form \
     x the form's aggregate pass rate); the source data holds no measured per-gender rates.";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to build table: {0}")]
    Table(#[from] PolarsError),
    #[error("Failed to write report text: {0}")]
    Format(#[from] fmt::Error),
}

/// Make Polars print whole tables instead of eliding rows and columns.
pub fn configure_table_format() {
    std::env::set_var("POLARS_FMT_MAX_ROWS", "100");
    std::env::set_var("POLARS_FMT_MAX_COLS", "30");
    std::env::set_var("POLARS_FMT_TABLE_HIDE_DATAFRAME_SHAPE_INFORMATION", "1");
}

pub fn enrolment_frame(rows: &[YearRecord]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Column::new("Year".into(), rows.iter().map(|r| r.year).collect::<Vec<_>>()),
        Column::new("Male".into(), rows.iter().map(|r| r.male).collect::<Vec<_>>()),
        Column::new("Female".into(), rows.iter().map(|r| r.female).collect::<Vec<_>>()),
        Column::new("Total_Enrolment".into(), rows.iter().map(|r| r.total).collect::<Vec<_>>()),
        Column::new(
            "Male_Percentage".into(),
            rows.iter().map(|r| r.male_percentage).collect::<Vec<_>>(),
        ),
        Column::new(
            "Female_Percentage".into(),
            rows.iter().map(|r| r.female_percentage).collect::<Vec<_>>(),
        ),
        Column::new(
            "Male_Growth_Rate".into(),
            rows.iter().map(|r| r.male_growth_rate).collect::<Vec<_>>(),
        ),
        Column::new(
            "Female_Growth_Rate".into(),
            rows.iter().map(|r| r.female_growth_rate).collect::<Vec<_>>(),
        ),
    ])
}

pub fn age_group_frame(table: &AgeGroupTable) -> PolarsResult<DataFrame> {
    let mut columns = vec![Column::new(
        "Year".into(),
        table.rows.iter().map(|r| r.year).collect::<Vec<_>>(),
    )];
    for (i, bracket) in table.brackets.iter().enumerate() {
        let counts: Vec<Option<u32>> = table.rows.iter().map(|r| r.counts.get(i).copied()).collect();
        columns.push(Column::new(bracket.as_str().into(), counts));
    }
    columns.push(Column::new(
        "Total".into(),
        table.rows.iter().map(|r| r.total).collect::<Vec<_>>(),
    ));
    DataFrame::new(columns)
}

pub fn merged_frame(rows: &[MergedRecord]) -> PolarsResult<DataFrame> {
    let counts = |f: fn(&MergedRecord) -> u32| rows.iter().map(f).collect::<Vec<_>>();
    let rates = |f: fn(&MergedRecord) -> f64| rows.iter().map(f).collect::<Vec<_>>();
    let estimates = |f: fn(&MergedRecord) -> Option<f64>| rows.iter().map(f).collect::<Vec<_>>();

    DataFrame::new(vec![
        Column::new("Year".into(), rows.iter().map(|r| r.year).collect::<Vec<_>>()),
        Column::new("L6_Male".into(), counts(|r| r.l6_male)),
        Column::new("L6_Female".into(), counts(|r| r.l6_female)),
        Column::new("U6_Male".into(), counts(|r| r.u6_male)),
        Column::new("U6_Female".into(), counts(|r| r.u6_female)),
        Column::new("Total_L6".into(), rows.iter().map(|r| r.total_l6).collect::<Vec<_>>()),
        Column::new("Total_U6".into(), rows.iter().map(|r| r.total_u6).collect::<Vec<_>>()),
        Column::new("IGCSE".into(), rates(|r| r.igcse)),
        Column::new("AS".into(), rates(|r| r.as_level)),
        Column::new("A_Level".into(), rates(|r| r.a_level)),
        Column::new("PassRate_L6_Male".into(), estimates(|r| r.pass_rate_l6_male)),
        Column::new("PassRate_L6_Female".into(), estimates(|r| r.pass_rate_l6_female)),
        Column::new("PassRate_U6_Male".into(), estimates(|r| r.pass_rate_u6_male)),
        Column::new("PassRate_U6_Female".into(), estimates(|r| r.pass_rate_u6_female)),
    ])
}

/// One row per column, laid out like R's `summary()` plus count and std.
pub fn summary_frame(summaries: &[ColumnSummary]) -> PolarsResult<DataFrame> {
    let stat = |f: fn(&ColumnSummary) -> f64| summaries.iter().map(f).collect::<Vec<_>>();

    DataFrame::new(vec![
        Column::new(
            "column".into(),
            summaries.iter().map(|s| s.column.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            "count".into(),
            summaries.iter().map(|s| s.summary.count as u64).collect::<Vec<_>>(),
        ),
        Column::new("min".into(), stat(|s| s.summary.min)),
        Column::new("q1".into(), stat(|s| s.summary.q1)),
        Column::new("median".into(), stat(|s| s.summary.median)),
        Column::new("mean".into(), stat(|s| s.summary.mean)),
        Column::new("q3".into(), stat(|s| s.summary.q3)),
        Column::new("max".into(), stat(|s| s.summary.max)),
        Column::new("std".into(), stat(|s| s.summary.std)),
    ])
}

pub fn comparison_frame(comparisons: &[MeanComparison]) -> PolarsResult<DataFrame> {
    let welch = |f: fn(&TestOutcome) -> f64| {
        comparisons
            .iter()
            .map(|c| c.welch.as_ref().map(f))
            .collect::<Vec<_>>()
    };

    DataFrame::new(vec![
        Column::new(
            "column".into(),
            comparisons.iter().map(|c| c.column.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            "mean_before".into(),
            comparisons.iter().map(|c| c.means.before).collect::<Vec<_>>(),
        ),
        Column::new(
            "mean_after".into(),
            comparisons.iter().map(|c| c.means.after).collect::<Vec<_>>(),
        ),
        Column::new(
            "change".into(),
            comparisons.iter().map(|c| c.means.change()).collect::<Vec<_>>(),
        ),
        Column::new("welch_t".into(), welch(|t| t.statistic)),
        Column::new("welch_p".into(), welch(|t| t.p_value)),
    ])
}

pub fn pairs_frame(series: &PairedSeries) -> PolarsResult<DataFrame> {
    let pairs = &series.pairs;
    DataFrame::new(vec![
        Column::new(
            "before_year".into(),
            pairs.iter().map(|p| p.before_year).collect::<Vec<_>>(),
        ),
        Column::new(
            "after_year".into(),
            pairs.iter().map(|p| p.after_year).collect::<Vec<_>>(),
        ),
        Column::new("before".into(), pairs.iter().map(|p| p.before).collect::<Vec<_>>()),
        Column::new("after".into(), pairs.iter().map(|p| p.after).collect::<Vec<_>>()),
        Column::new(
            "difference".into(),
            pairs.iter().map(|p| p.difference).collect::<Vec<_>>(),
        ),
    ])
}

/// R-style block describing one hypothesis test and its decision.
pub fn format_outcome(outcome: &TestOutcome, data: &str) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "  {}", outcome.test.label())?;
    writeln!(out, "data: {} (n = {})", data, outcome.n)?;

    let statistic = match outcome.test {
        TestKind::ShapiroWilk => format!("W = {:.5}", outcome.statistic),
        _ => format!("t = {:.4}", outcome.statistic),
    };
    match outcome.degrees_of_freedom {
        Some(df) => writeln!(out, "{}, df = {:.4}, p-value = {:.4e}", statistic, df, outcome.p_value)?,
        None => writeln!(out, "{}, p-value = {:.4e}", statistic, outcome.p_value)?,
    }

    if let Some(estimate) = outcome.estimate {
        writeln!(out, "mean estimate: {:.4}", estimate)?;
    }
    if let Some([lo, hi]) = outcome.confidence_interval {
        writeln!(
            out,
            "{:.0}% confidence interval: [{:.4}, {:.4}]",
            (1.0 - outcome.alpha) * 100.0,
            lo,
            hi
        )?;
    }

    let decision = if outcome.reject_null {
        "rejected"
    } else {
        "not rejected"
    };
    writeln!(
        out,
        "H0: {} -> {} at alpha = {}",
        outcome.test.null_hypothesis(),
        decision,
        outcome.alpha
    )?;
    Ok(out)
}

fn section(out: &mut String, title: &str, body: impl fmt::Display) -> fmt::Result {
    writeln!(out, "== {title} ==")?;
    writeln!(out, "{body}")?;
    writeln!(out)
}

/// Human-readable report: tables first, then the test results.
pub fn render_text(report: &AnalysisReport) -> Result<String, RenderError> {
    let mut out = String::new();
    let threshold = report.config.threshold_year;

    section(&mut out, "Enrolment by year", enrolment_frame(&report.enrolment.rows)?)?;
    section(
        &mut out,
        "Enrolment statistics",
        summary_frame(&report.enrolment.summaries)?,
    )?;
    if let (Some(year), Some(total)) = (report.enrolment.peak_year, report.enrolment.peak_total) {
        writeln!(out, "Peak total enrolment: {total} in {year}")?;
    }
    match report.enrolment.first_integration_year {
        Some(year) => writeln!(out, "First year with female enrolment: {year}")?,
        None => writeln!(out, "No female enrolment recorded")?,
    }
    writeln!(out)?;

    let ages = &report.age_groups;
    section(&mut out, "Age groups", age_group_frame(&ages.table)?)?;
    if !ages.total_mismatch_years.is_empty() {
        writeln!(
            out,
            "Bracket counts disagree with Total in: {:?}",
            ages.total_mismatch_years
        )?;
    }
    for trend in &ages.trends {
        writeln!(
            out,
            "{:<8} mean before {}: {:>8}  mean from {}: {:>8}  total from {}: {}",
            trend.bracket,
            threshold,
            fmt_opt(trend.means.before),
            threshold,
            fmt_opt(trend.means.after),
            threshold,
            trend.total_after
        )?;
    }
    if let Some(bracket) = &ages.largest_bracket_after {
        writeln!(out, "Largest age group from {threshold}: {bracket}")?;
    }
    writeln!(out)?;

    section(
        &mut out,
        "Forms merged with pass rates",
        merged_frame(&report.pass_rates.rows)?,
    )?;
    writeln!(out, "{ESTIMATE_NOTE}")?;
    writeln!(out)?;
    section(
        &mut out,
        &format!("Mean pass rates before vs from {threshold}"),
        comparison_frame(&report.pass_rates.comparisons)?,
    )?;

    let diffs = &report.differences;
    for (series, test) in diffs.series.iter().zip(&diffs.paired_tests) {
        section(
            &mut out,
            &format!("Paired differences: {}", series.column),
            pairs_frame(series)?,
        )?;
        if !series.dropped_years.is_empty() {
            writeln!(out, "Dropped to balance the pairing: {:?}", series.dropped_years)?;
        }
        writeln!(out, "{}", format_outcome(test, &series.column)?)?;
    }
    section(&mut out, "Difference statistics", summary_frame(&diffs.summaries)?)?;

    writeln!(out, "== Hypothesis tests ==")?;
    writeln!(
        out,
        "{}",
        format_outcome(&diffs.normality, "combined pass-rate differences")?
    )?;
    out.push_str(&format_outcome(&diffs.mean_test, "combined pass-rate differences")?);
    Ok(out)
}

pub fn render_json(report: &AnalysisReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}
