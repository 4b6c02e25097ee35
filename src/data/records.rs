//! Typed rows for the four input tables and the values derived from them.

use serde::Serialize;

/// Anything keyed by a calendar year.
pub trait Yearly {
    fn year(&self) -> i32;
}

/// One validated row of the enrolment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrolmentRecord {
    pub year: i32,
    pub male: u32,
    pub female: u32,
}

/// Enrolment row with totals, shares and year-over-year growth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearRecord {
    pub year: i32,
    pub male: u32,
    pub female: u32,
    /// Widened so the sum of two counts cannot overflow.
    pub total: u64,
    /// `None` when the total is zero.
    pub male_percentage: Option<f64>,
    pub female_percentage: Option<f64>,
    /// `None` for the first year and when the previous count is zero.
    pub male_growth_rate: Option<f64>,
    pub female_growth_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgeGroupRecord {
    pub year: i32,
    /// Counts aligned with [`AgeGroupTable::brackets`].
    pub counts: Vec<u32>,
    pub total: u32,
}

impl AgeGroupRecord {
    pub fn bracket_sum(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgeGroupTable {
    pub brackets: Vec<String>,
    pub rows: Vec<AgeGroupRecord>,
}

/// Sixth-form head counts by gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormsRecord {
    pub year: i32,
    pub l6_male: u32,
    pub l6_female: u32,
    pub u6_male: u32,
    pub u6_female: u32,
}

/// Subject pass rates, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassRateRecord {
    pub year: i32,
    pub igcse: f64,
    pub as_level: f64,
    pub a_level: f64,
}

/// Forms joined with pass rates on year.
///
/// The per-gender pass rates are estimates: the gender share of a form
/// multiplied by the form's aggregate pass rate. The source data has no
/// measured per-gender rates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRecord {
    pub year: i32,
    pub l6_male: u32,
    pub l6_female: u32,
    pub u6_male: u32,
    pub u6_female: u32,
    pub total_l6: u64,
    pub total_u6: u64,
    pub igcse: f64,
    pub as_level: f64,
    pub a_level: f64,
    pub pass_rate_l6_male: Option<f64>,
    pub pass_rate_l6_female: Option<f64>,
    pub pass_rate_u6_male: Option<f64>,
    pub pass_rate_u6_female: Option<f64>,
}

/// Numeric columns of [`MergedRecord`] that the aggregator can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MergedColumn {
    TotalL6,
    TotalU6,
    Igcse,
    AsLevel,
    ALevel,
    PassRateL6Male,
    PassRateL6Female,
    PassRateU6Male,
    PassRateU6Female,
}

impl MergedColumn {
    pub fn name(self) -> &'static str {
        match self {
            MergedColumn::TotalL6 => "Total_L6",
            MergedColumn::TotalU6 => "Total_U6",
            MergedColumn::Igcse => "IGCSE",
            MergedColumn::AsLevel => "AS",
            MergedColumn::ALevel => "A_Level",
            MergedColumn::PassRateL6Male => "PassRate_L6_Male",
            MergedColumn::PassRateL6Female => "PassRate_L6_Female",
            MergedColumn::PassRateU6Male => "PassRate_U6_Male",
            MergedColumn::PassRateU6Female => "PassRate_U6_Female",
        }
    }
}

impl MergedRecord {
    pub fn value(&self, column: MergedColumn) -> Option<f64> {
        match column {
            MergedColumn::TotalL6 => Some(self.total_l6 as f64),
            MergedColumn::TotalU6 => Some(self.total_u6 as f64),
            MergedColumn::Igcse => Some(self.igcse),
            MergedColumn::AsLevel => Some(self.as_level),
            MergedColumn::ALevel => Some(self.a_level),
            MergedColumn::PassRateL6Male => self.pass_rate_l6_male,
            MergedColumn::PassRateL6Female => self.pass_rate_l6_female,
            MergedColumn::PassRateU6Male => self.pass_rate_u6_male,
            MergedColumn::PassRateU6Female => self.pass_rate_u6_female,
        }
    }
}

impl Yearly for EnrolmentRecord {
    fn year(&self) -> i32 {
        self.year
    }
}

impl Yearly for YearRecord {
    fn year(&self) -> i32 {
        self.year
    }
}

impl Yearly for AgeGroupRecord {
    fn year(&self) -> i32 {
        self.year
    }
}

impl Yearly for FormsRecord {
    fn year(&self) -> i32 {
        self.year
    }
}

impl Yearly for PassRateRecord {
    fn year(&self) -> i32 {
        self.year
    }
}

impl Yearly for MergedRecord {
    fn year(&self) -> i32 {
        self.year
    }
}
