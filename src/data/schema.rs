//! Schema Validation Module
//! Turns raw text tables into typed records, failing on the first cell that
//! does not fit its column.

use crate::data::loader::RawTable;
use crate::data::records::{
    AgeGroupRecord, AgeGroupTable, EnrolmentRecord, FormsRecord, PassRateRecord, Yearly,
};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SchemaError {
    #[error("{table}: expected at least {expected} columns, found {found}")]
    TooFewColumns {
        table: String,
        expected: usize,
        found: usize,
    },
    #[error("{table}: no data rows")]
    EmptyTable { table: String },
    #[error("{table}: missing value in column '{column}' on line {line}")]
    MissingValue {
        table: String,
        column: String,
        line: usize,
    },
    #[error("{table}: column '{column}' on line {line}: '{value}' is not {expected}")]
    InvalidValue {
        table: String,
        column: String,
        line: usize,
        value: String,
        expected: &'static str,
    },
    #[error("{table}: column '{column}' on line {line}: {value} is outside 0..=100")]
    RateOutOfRange {
        table: String,
        column: String,
        line: usize,
        value: f64,
    },
    #[error("{table}: year {year} appears more than once")]
    DuplicateYear { table: String, year: i32 },
    #[error("{table}: line {line} should be the sub-header row but holds year '{value}'")]
    MissingSubHeader {
        table: String,
        line: usize,
        value: String,
    },
    #[error("{table}: needs at least one age bracket between Year and Total")]
    NoBrackets { table: String },
}

/// Expected layout of a fixed-width input table.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    /// Sub-header rows directly below the header line.
    pub skip_rows: usize,
    /// Canonical column names, by position.
    pub columns: &'static [&'static str],
}

pub const ENROLMENT_SCHEMA: TableSchema = TableSchema {
    skip_rows: 1,
    columns: &["Year", "Male", "Female"],
};

pub const FORMS_SCHEMA: TableSchema = TableSchema {
    skip_rows: 1,
    columns: &["Year", "L6_Male", "L6_Female", "U6_Male", "U6_Female"],
};

pub const PASS_RATES_SCHEMA: TableSchema = TableSchema {
    skip_rows: 1,
    columns: &["Year", "IGCSE", "AS", "A_Level"],
};

/// Typed access to one data row of a raw table.
struct RowReader<'a> {
    raw: &'a RawTable,
    row: usize,
    names: &'a [String],
}

impl<'a> RowReader<'a> {
    /// Line number in the file, counting the header as line 1.
    fn line(&self) -> usize {
        self.row + 2
    }

    fn text(&self, column: usize) -> Result<&'a str, SchemaError> {
        self.raw
            .cell(column, self.row)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SchemaError::MissingValue {
                table: self.raw.name().to_string(),
                column: self.names[column].clone(),
                line: self.line(),
            })
    }

    fn invalid(&self, column: usize, value: &str, expected: &'static str) -> SchemaError {
        SchemaError::InvalidValue {
            table: self.raw.name().to_string(),
            column: self.names[column].clone(),
            line: self.line(),
            value: value.to_string(),
            expected,
        }
    }

    fn year(&self, column: usize) -> Result<i32, SchemaError> {
        let text = self.text(column)?;
        text.parse()
            .map_err(|_| self.invalid(column, text, "a year"))
    }

    fn count(&self, column: usize) -> Result<u32, SchemaError> {
        let text = self.text(column)?;
        text.parse()
            .map_err(|_| self.invalid(column, text, "a non-negative whole number"))
    }

    fn rate(&self, column: usize) -> Result<f64, SchemaError> {
        let text = self.text(column)?;
        let value: f64 = text
            .trim_end_matches('%')
            .trim_end()
            .parse()
            .map_err(|_| self.invalid(column, text, "a percentage"))?;

        if !(0.0..=100.0).contains(&value) {
            return Err(SchemaError::RateOutOfRange {
                table: self.raw.name().to_string(),
                column: self.names[column].clone(),
                line: self.line(),
                value,
            });
        }
        Ok(value)
    }
}

fn owned_names(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn check_shape(raw: &RawTable, expected: usize, skip_rows: usize) -> Result<(), SchemaError> {
    if raw.width() < expected {
        return Err(SchemaError::TooFewColumns {
            table: raw.name().to_string(),
            expected,
            found: raw.width(),
        });
    }
    if raw.get_row_count() <= skip_rows {
        return Err(SchemaError::EmptyTable {
            table: raw.name().to_string(),
        });
    }
    Ok(())
}

/// Sort by year, rejecting repeated keys.
fn sort_by_unique_year<T: Yearly>(table: &str, rows: &mut [T]) -> Result<(), SchemaError> {
    let mut seen = HashSet::with_capacity(rows.len());
    for row in rows.iter() {
        if !seen.insert(row.year()) {
            return Err(SchemaError::DuplicateYear {
                table: table.to_string(),
                year: row.year(),
            });
        }
    }
    rows.sort_by_key(|row| row.year());
    Ok(())
}

/// Rows about to be skipped must not already be data.
fn check_sub_header(raw: &RawTable, skip_rows: usize) -> Result<(), SchemaError> {
    for row in 0..skip_rows {
        let Some(value) = raw.cell(0, row).map(str::trim) else {
            continue;
        };
        if value.parse::<i32>().is_ok() {
            return Err(SchemaError::MissingSubHeader {
                table: raw.name().to_string(),
                line: row + 2,
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

/// Validate every data row of a fixed-layout table with `parse_row`.
fn parse_fixed<T, F>(raw: &RawTable, schema: TableSchema, parse_row: F) -> Result<Vec<T>, SchemaError>
where
    T: Yearly,
    F: Fn(&RowReader<'_>) -> Result<T, SchemaError>,
{
    check_shape(raw, schema.columns.len(), schema.skip_rows)?;
    check_sub_header(raw, schema.skip_rows)?;
    let names = owned_names(schema.columns);

    let mut rows = (schema.skip_rows..raw.get_row_count())
        .map(|row| {
            parse_row(&RowReader {
                raw,
                row,
                names: &names,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    sort_by_unique_year(raw.name(), &mut rows)?;
    log::debug!("Validated {} rows of {}", rows.len(), raw.name());
    Ok(rows)
}

pub fn parse_enrolment(raw: &RawTable) -> Result<Vec<EnrolmentRecord>, SchemaError> {
    parse_fixed(raw, ENROLMENT_SCHEMA, |r| {
        Ok(EnrolmentRecord {
            year: r.year(0)?,
            male: r.count(1)?,
            female: r.count(2)?,
        })
    })
}

pub fn parse_forms(raw: &RawTable) -> Result<Vec<FormsRecord>, SchemaError> {
    parse_fixed(raw, FORMS_SCHEMA, |r| {
        Ok(FormsRecord {
            year: r.year(0)?,
            l6_male: r.count(1)?,
            l6_female: r.count(2)?,
            u6_male: r.count(3)?,
            u6_female: r.count(4)?,
        })
    })
}

pub fn parse_pass_rates(raw: &RawTable) -> Result<Vec<PassRateRecord>, SchemaError> {
    parse_fixed(raw, PASS_RATES_SCHEMA, |r| {
        Ok(PassRateRecord {
            year: r.year(0)?,
            igcse: r.rate(1)?,
            as_level: r.rate(2)?,
            a_level: r.rate(3)?,
        })
    })
}

/// Age groups: `Year`, one column per bracket, then `Total`.
pub fn parse_age_groups(raw: &RawTable) -> Result<AgeGroupTable, SchemaError> {
    check_shape(raw, 3, 0).map_err(|err| match err {
        SchemaError::TooFewColumns { table, .. } => SchemaError::NoBrackets { table },
        other => other,
    })?;

    let names: Vec<String> = raw
        .get_columns()
        .iter()
        .map(|name| name.trim().to_string())
        .collect();
    let total_col = names.len() - 1;
    let brackets = names[1..total_col].to_vec();

    let mut rows = (0..raw.get_row_count())
        .map(|row| -> Result<AgeGroupRecord, SchemaError> {
            let reader = RowReader {
                raw,
                row,
                names: &names,
            };
            Ok(AgeGroupRecord {
                year: reader.year(0)?,
                counts: (1..total_col)
                    .map(|col| reader.count(col))
                    .collect::<Result<Vec<_>, _>>()?,
                total: reader.count(total_col)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    sort_by_unique_year(raw.name(), &mut rows)?;
    Ok(AgeGroupTable { brackets, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn raw(name: &str, df: DataFrame) -> RawTable {
        RawTable::from_dataframe(name, format!("{name}.csv"), df).unwrap()
    }

    fn enrolment(years: &[&str], male: &[&str], female: &[Option<&str>]) -> RawTable {
        let mut y = vec![Some("Year")];
        y.extend(years.iter().map(|s| Some(*s)));
        let mut m = vec![Some("Male")];
        m.extend(male.iter().map(|s| Some(*s)));
        let mut f = vec![Some("Female")];
        f.extend(female.iter().copied());
        raw(
            "enrolment",
            df!("ENROLMENT" => y, "column_2" => m, "column_3" => f).unwrap(),
        )
    }

    #[test]
    fn enrolment_skips_subheader_and_sorts_by_year() {
        let table = enrolment(
            &["2018", "2017"],
            &["360", "370"],
            &[Some("30"), Some(" 13 ")],
        );
        let rows = parse_enrolment(&table).unwrap();
        assert_eq!(
            rows,
            vec![
                EnrolmentRecord { year: 2017, male: 370, female: 13 },
                EnrolmentRecord { year: 2018, male: 360, female: 30 },
            ]
        );
    }

    #[test]
    fn bad_cell_names_column_and_line() {
        let table = enrolment(&["2016", "2017"], &["380", "37O"], &[Some("0"), Some("13")]);
        let err = parse_enrolment(&table).unwrap_err();
        assert_eq!(
            err,
            SchemaError::InvalidValue {
                table: "enrolment".into(),
                column: "Male".into(),
                line: 4,
                value: "37O".into(),
                expected: "a non-negative whole number",
            }
        );
    }

    #[test]
    fn empty_cell_is_an_error_not_a_gap() {
        let table = enrolment(&["2016"], &["380"], &[None]);
        let err = parse_enrolment(&table).unwrap_err();
        assert!(matches!(err, SchemaError::MissingValue { ref column, line: 3, .. } if column == "Female"));
    }

    #[test]
    fn negative_count_is_rejected() {
        let table = enrolment(&["2016"], &["-1"], &[Some("0")]);
        assert!(matches!(
            parse_enrolment(&table),
            Err(SchemaError::InvalidValue { .. })
        ));
    }

    #[test]
    fn duplicate_year_is_rejected() {
        let table = enrolment(&["2016", "2016"], &["380", "381"], &[Some("0"), Some("0")]);
        assert_eq!(
            parse_enrolment(&table).unwrap_err(),
            SchemaError::DuplicateYear { table: "enrolment".into(), year: 2016 }
        );
    }

    #[test]
    fn table_without_sub_header_is_rejected() {
        let df = df!(
            "Year" => ["2016", "2017"],
            "Male" => ["380", "370"],
            "Female" => ["0", "13"]
        )
        .unwrap();
        assert_eq!(
            parse_enrolment(&raw("enrolment", df)).unwrap_err(),
            SchemaError::MissingSubHeader {
                table: "enrolment".into(),
                line: 2,
                value: "2016".into(),
            }
        );
    }

    #[test]
    fn header_only_table_is_empty() {
        let table = enrolment(&[], &[], &[]);
        assert!(matches!(
            parse_enrolment(&table),
            Err(SchemaError::EmptyTable { .. })
        ));
    }

    #[test]
    fn pass_rates_accept_percent_suffix_and_check_range() {
        let df = df!(
            "SUBJECT PASS RATES %" => ["Year", "2016", "2017"],
            "column_2" => ["IGCSE", "91.2%", "90"],
            "column_3" => ["AS", "80", "82.5"],
            "column_4" => ["A Level", "95", "97"]
        )
        .unwrap();
        let rows = parse_pass_rates(&raw("pass rates", df)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].igcse, 91.2);
        assert_eq!(rows[1].as_level, 82.5);

        let df = df!(
            "SUBJECT PASS RATES %" => ["Year", "2016"],
            "column_2" => ["IGCSE", "101"],
            "column_3" => ["AS", "80"],
            "column_4" => ["A Level", "95"]
        )
        .unwrap();
        assert!(matches!(
            parse_pass_rates(&raw("pass rates", df)),
            Err(SchemaError::RateOutOfRange { value, .. }) if value == 101.0
        ));
    }

    #[test]
    fn forms_need_five_columns() {
        let df = df!("column_1" => ["Year", "2016"], "L6" => ["Male", "40"]).unwrap();
        assert_eq!(
            parse_forms(&raw("forms", df)).unwrap_err(),
            SchemaError::TooFewColumns { table: "forms".into(), expected: 5, found: 2 }
        );
    }

    #[test]
    fn age_group_brackets_come_from_header() {
        let df = df!(
            "Year" => ["2012", "2011"],
            "U13" => ["50", "48"],
            "U14" => ["60", "62"],
            "Total" => ["110", "110"]
        )
        .unwrap();
        let table = parse_age_groups(&raw("age groups", df)).unwrap();
        assert_eq!(table.brackets, vec!["U13", "U14"]);
        assert_eq!(table.rows[0].year, 2011);
        assert_eq!(table.rows[0].counts, vec![48, 62]);
        assert_eq!(table.rows[1].total, 110);
    }

    #[test]
    fn age_groups_without_brackets_are_rejected() {
        let df = df!("Year" => ["2011"], "Total" => ["110"]).unwrap();
        assert!(matches!(
            parse_age_groups(&raw("age groups", df)),
            Err(SchemaError::NoBrackets { .. })
        ));
    }
}
