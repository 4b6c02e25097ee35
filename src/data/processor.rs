//! Data Processor Module
//! Derived columns: totals, gender shares, growth rates and the join of forms
//! with pass rates.

use crate::data::records::{
    AgeGroupTable, EnrolmentRecord, FormsRecord, MergedRecord, PassRateRecord, YearRecord,
};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("Joining forms ({forms} rows) with pass rates ({pass_rates} rows) on Year matched no rows")]
    EmptyJoin { forms: usize, pass_rates: usize },
}

/// Handles the derivation steps between validation and aggregation.
pub struct DataProcessor;

impl DataProcessor {
    /// `part / total * 100`, undefined for an empty total.
    pub fn percentage(part: u32, total: u64) -> Option<f64> {
        (total > 0).then(|| f64::from(part) / total as f64 * 100.0)
    }

    /// Period-over-period change in percent, undefined when `previous` is 0.
    pub fn growth_rate(previous: u32, current: u32) -> Option<f64> {
        (previous > 0).then(|| (f64::from(current) - f64::from(previous)) / f64::from(previous) * 100.0)
    }

    /// Share of `count` in `total` applied to an aggregate pass rate.
    pub fn estimated_pass_rate(count: u32, total: u64, pass_rate: f64) -> Option<f64> {
        (total > 0).then(|| f64::from(count) / total as f64 * pass_rate)
    }

    /// Totals, percentages and growth rates for year-sorted enrolment rows.
    pub fn enrolment_metrics(rows: &[EnrolmentRecord]) -> Vec<YearRecord> {
        let mut previous: Option<&EnrolmentRecord> = None;

        rows.iter()
            .map(|row| {
                let total = u64::from(row.male) + u64::from(row.female);
                let record = YearRecord {
                    year: row.year,
                    male: row.male,
                    female: row.female,
                    total,
                    male_percentage: Self::percentage(row.male, total),
                    female_percentage: Self::percentage(row.female, total),
                    male_growth_rate: previous.and_then(|p| Self::growth_rate(p.male, row.male)),
                    female_growth_rate: previous
                        .and_then(|p| Self::growth_rate(p.female, row.female)),
                };
                previous = Some(row);
                record
            })
            .collect()
    }

    /// Years whose bracket counts do not add up to the reported total.
    pub fn age_group_total_mismatches(table: &AgeGroupTable) -> Vec<i32> {
        table
            .rows
            .iter()
            .filter(|row| row.bracket_sum() != u64::from(row.total))
            .inspect(|row| {
                log::warn!(
                    "Age groups {}: brackets sum to {} but Total is {}",
                    row.year,
                    row.bracket_sum(),
                    row.total
                )
            })
            .map(|row| row.year)
            .collect()
    }

    /// Inner join on exact year, then derive sixth-form totals and the
    /// per-gender pass-rate estimates.
    pub fn merge_forms_with_pass_rates(
        forms: &[FormsRecord],
        pass_rates: &[PassRateRecord],
    ) -> Result<Vec<MergedRecord>, ProcessorError> {
        let rates_by_year: BTreeMap<i32, &PassRateRecord> =
            pass_rates.iter().map(|r| (r.year, r)).collect();

        let mut merged: Vec<MergedRecord> = forms
            .iter()
            .filter_map(|f| rates_by_year.get(&f.year).map(|r| Self::merge_row(f, r)))
            .collect();
        merged.sort_by_key(|m| m.year);

        let dropped: Vec<i32> = forms
            .iter()
            .map(|f| f.year)
            .chain(pass_rates.iter().map(|r| r.year))
            .filter(|year| merged.binary_search_by_key(year, |m| m.year).is_err())
            .collect();
        if !dropped.is_empty() {
            log::info!("Years without a counterpart dropped from the join: {:?}", dropped);
        }

        if merged.is_empty() {
            return Err(ProcessorError::EmptyJoin {
                forms: forms.len(),
                pass_rates: pass_rates.len(),
            });
        }
        Ok(merged)
    }

    fn merge_row(forms: &FormsRecord, rates: &PassRateRecord) -> MergedRecord {
        let total_l6 = u64::from(forms.l6_male) + u64::from(forms.l6_female);
        let total_u6 = u64::from(forms.u6_male) + u64::from(forms.u6_female);

        MergedRecord {
            year: forms.year,
            l6_male: forms.l6_male,
            l6_female: forms.l6_female,
            u6_male: forms.u6_male,
            u6_female: forms.u6_female,
            total_l6,
            total_u6,
            igcse: rates.igcse,
            as_level: rates.as_level,
            a_level: rates.a_level,
            pass_rate_l6_male: Self::estimated_pass_rate(forms.l6_male, total_l6, rates.as_level),
            pass_rate_l6_female: Self::estimated_pass_rate(
                forms.l6_female,
                total_l6,
                rates.as_level,
            ),
            pass_rate_u6_male: Self::estimated_pass_rate(forms.u6_male, total_u6, rates.a_level),
            pass_rate_u6_female: Self::estimated_pass_rate(
                forms.u6_female,
                total_u6,
                rates.a_level,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::records::AgeGroupRecord;

    fn enrolment(year: i32, male: u32, female: u32) -> EnrolmentRecord {
        EnrolmentRecord { year, male, female }
    }

    fn forms(year: i32, l6: (u32, u32), u6: (u32, u32)) -> FormsRecord {
        FormsRecord {
            year,
            l6_male: l6.0,
            l6_female: l6.1,
            u6_male: u6.0,
            u6_female: u6.1,
        }
    }

    fn rates(year: i32, as_level: f64, a_level: f64) -> PassRateRecord {
        PassRateRecord {
            year,
            igcse: 90.0,
            as_level,
            a_level,
        }
    }

    #[test]
    fn first_integration_year_share() {
        let rows = DataProcessor::enrolment_metrics(&[enrolment(2017, 370, 13)]);
        assert_eq!(rows[0].total, 383);
        let female = rows[0].female_percentage.unwrap();
        assert!((female - 3.394).abs() < 1e-3);
    }

    #[test]
    fn totals_and_shares_are_consistent() {
        let input = [
            enrolment(2015, 390, 0),
            enrolment(2016, 380, 0),
            enrolment(2017, 370, 13),
            enrolment(2018, 340, 40),
            enrolment(2019, 0, 0),
        ];
        for row in DataProcessor::enrolment_metrics(&input) {
            assert_eq!(row.total, u64::from(row.male) + u64::from(row.female));
            match (row.male_percentage, row.female_percentage) {
                (Some(m), Some(f)) => assert!((m + f - 100.0).abs() < 1e-9),
                (None, None) => assert_eq!(row.total, 0),
                other => panic!("inconsistent shares {other:?}"),
            }
        }
    }

    #[test]
    fn growth_rate_is_undefined_for_first_year_and_zero_base() {
        let rows = DataProcessor::enrolment_metrics(&[
            enrolment(2016, 400, 0),
            enrolment(2017, 370, 13),
            enrolment(2018, 370, 26),
        ]);
        assert_eq!(rows[0].male_growth_rate, None);
        assert_eq!(rows[0].female_growth_rate, None);
        assert!((rows[1].male_growth_rate.unwrap() - -7.5).abs() < 1e-9);
        assert_eq!(rows[1].female_growth_rate, None);
        assert_eq!(rows[2].male_growth_rate, Some(0.0));
        assert_eq!(rows[2].female_growth_rate, Some(100.0));
    }

    #[test]
    fn join_keeps_only_matching_years() {
        let merged = DataProcessor::merge_forms_with_pass_rates(
            &[forms(2015, (40, 0), (30, 0)), forms(2017, (30, 10), (35, 5))],
            &[rates(2017, 80.0, 96.0), rates(2018, 82.0, 97.0)],
        )
        .unwrap();

        assert_eq!(merged.len(), 1);
        let row = &merged[0];
        assert_eq!(row.year, 2017);
        assert_eq!(row.total_l6, 40);
        assert_eq!(row.total_u6, 40);
        assert_eq!(row.pass_rate_l6_male, Some(60.0));
        assert_eq!(row.pass_rate_l6_female, Some(20.0));
        assert_eq!(row.pass_rate_u6_male, Some(84.0));
        assert_eq!(row.pass_rate_u6_female, Some(12.0));
    }

    #[test]
    fn empty_form_has_no_estimate() {
        let merged = DataProcessor::merge_forms_with_pass_rates(
            &[forms(2016, (0, 0), (30, 0))],
            &[rates(2016, 80.0, 96.0)],
        )
        .unwrap();
        assert_eq!(merged[0].pass_rate_l6_male, None);
        assert_eq!(merged[0].pass_rate_u6_male, Some(96.0));
    }

    #[test]
    fn disjoint_years_are_an_empty_join() {
        let err = DataProcessor::merge_forms_with_pass_rates(
            &[forms(2015, (40, 0), (30, 0))],
            &[rates(2016, 80.0, 96.0)],
        )
        .unwrap_err();
        assert_eq!(err, ProcessorError::EmptyJoin { forms: 1, pass_rates: 1 });
    }

    #[test]
    fn totals_of_maximal_counts_do_not_wrap() {
        let rows = DataProcessor::enrolment_metrics(&[enrolment(2017, u32::MAX, 1)]);
        assert_eq!(rows[0].total, u64::from(u32::MAX) + 1);
        let female = rows[0].female_percentage.unwrap();
        assert!(female > 0.0 && female < 1e-6);

        let merged = DataProcessor::merge_forms_with_pass_rates(
            &[forms(2017, (u32::MAX, 1), (u32::MAX, u32::MAX))],
            &[rates(2017, 80.0, 96.0)],
        )
        .unwrap();
        assert_eq!(merged[0].total_l6, u64::from(u32::MAX) + 1);
        assert_eq!(merged[0].total_u6, 2 * u64::from(u32::MAX));
        assert_eq!(merged[0].pass_rate_u6_male, Some(48.0));
    }

    #[test]
    fn age_group_totals_are_checked() {
        let table = AgeGroupTable {
            brackets: vec!["U13".into(), "U14".into()],
            rows: vec![
                AgeGroupRecord { year: 2011, counts: vec![50, 60], total: 110 },
                AgeGroupRecord { year: 2012, counts: vec![50, 61], total: 110 },
            ],
        };
        assert_eq!(DataProcessor::age_group_total_mismatches(&table), vec![2012]);
    }
}
