//! Data models for cohort analysis.
//!
//! This module contains the core data structures used throughout
//! the application for representing patient rows, cohort labels and reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lower bound of the analyzable BMI range (inclusive).
pub const BMI_MIN: f64 = 10.0;
/// Upper bound of the analyzable BMI range (inclusive).
pub const BMI_MAX: f64 = 60.0;

/// One patient row from the input dataset.
///
/// Empty cells are `None`. Rows carry no identity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PatientRecord {
    pub bmi: Option<f64>,
    pub glucose: Option<f64>,
    pub age: Option<f64>,
    pub outcome: Option<i64>,
}

impl PatientRecord {
    /// Creates a fully populated record.
    #[cfg(test)]
    pub fn new(bmi: f64, glucose: f64, age: f64, outcome: i64) -> Self {
        Self {
            bmi: Some(bmi),
            glucose: Some(glucose),
            age: Some(age),
            outcome: Some(outcome),
        }
    }
}

/// BMI cohort label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BmiRange {
    /// `[10, 18.5)`
    Underweight,
    /// `[18.5, 25)`
    Normal,
    /// `[25, 30)`
    Overweight,
    /// `[30, 60]`
    Obese,
    /// Outside `[10, 60]` or missing; only produced under the `unknown` policy.
    Unknown,
}

impl BmiRange {
    /// Bucket a BMI value.
    ///
    /// Returns `None` for values outside `[BMI_MIN, BMI_MAX]` and for NaN.
    pub fn from_bmi(bmi: f64) -> Option<Self> {
        if !(BMI_MIN..=BMI_MAX).contains(&bmi) {
            return None;
        }

        let range = if bmi < 18.5 {
            BmiRange::Underweight
        } else if bmi < 25.0 {
            BmiRange::Normal
        } else if bmi < 30.0 {
            BmiRange::Overweight
        } else {
            BmiRange::Obese
        };

        Some(range)
    }

    /// The output label.
    pub fn label(&self) -> &'static str {
        match self {
            BmiRange::Underweight => "Underweight",
            BmiRange::Normal => "Normal",
            BmiRange::Overweight => "Overweight",
            BmiRange::Obese => "Obese",
            BmiRange::Unknown => "Unknown",
        }
    }

    /// Position in clinical severity order.
    pub fn clinical_rank(&self) -> u8 {
        match self {
            BmiRange::Underweight => 0,
            BmiRange::Normal => 1,
            BmiRange::Overweight => 2,
            BmiRange::Obese => 3,
            BmiRange::Unknown => 4,
        }
    }
}

impl fmt::Display for BmiRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Diagnosis label derived from the `Outcome` indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Diagnosis {
    Diabetic,
    #[serde(rename = "Non-Diabetic")]
    NonDiabetic,
}

impl Diagnosis {
    /// `Diabetic` only when the outcome is exactly 1.
    pub fn from_outcome(outcome: Option<i64>) -> Self {
        match outcome {
            Some(1) => Diagnosis::Diabetic,
            _ => Diagnosis::NonDiabetic,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Diagnosis::Diabetic => "Diabetic",
            Diagnosis::NonDiabetic => "Non-Diabetic",
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// How rows with BMI outside `[10, 60]` are treated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutOfRangePolicy {
    /// Exclude the row before bucketing.
    #[default]
    Drop,
    /// Keep the row and label it `Unknown`.
    Unknown,
}

impl fmt::Display for OutOfRangePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutOfRangePolicy::Drop => write!(f, "drop"),
            OutOfRangePolicy::Unknown => write!(f, "unknown"),
        }
    }
}

/// Ordering of the result table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Alphabetical by label: Normal, Obese, Overweight, Underweight.
    #[default]
    Lexical,
    /// Underweight, Normal, Overweight, Obese, Unknown.
    Clinical,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Lexical => write!(f, "lexical"),
            SortOrder::Clinical => write!(f, "clinical"),
        }
    }
}

/// Grouping key of a cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CohortKey {
    pub bmi_range: BmiRange,
    pub diagnosis: Option<Diagnosis>,
}

/// One row of the cohort summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub bmi_range: BmiRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<Diagnosis>,
    /// Mean glucose; `None` when every glucose value in the group is missing.
    pub avg_glucose: Option<f64>,
    pub patient_count: u64,
    /// Mean age; `None` when every age value in the group is missing.
    pub avg_age: Option<f64>,
}

/// Where the analyzed rows were read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Csv,
    ParquetCache,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Csv => write!(f, "CSV"),
            DataSource::ParquetCache => write!(f, "Parquet cache"),
        }
    }
}

/// Metadata about an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path of the input CSV.
    pub input_path: String,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Where rows were actually read from.
    pub source: DataSource,
    /// Rows in the input.
    pub rows_read: usize,
    /// Rows that contributed to a cohort.
    pub rows_analyzed: usize,
    /// Rows excluded by the out-of-range policy.
    pub rows_excluded: usize,
    pub group_by_diagnosis: bool,
    pub out_of_range: OutOfRangePolicy,
    pub sort_order: SortOrder,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The complete cohort analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortReport {
    pub metadata: ReportMetadata,
    pub cohorts: Vec<CohortSummary>,
}

impl CohortReport {
    /// Whether the table carries a diagnosis column.
    pub fn has_diagnosis(&self) -> bool {
        self.metadata.group_by_diagnosis
    }

    /// Sum of `patient_count` across cohorts.
    pub fn total_patients(&self) -> u64 {
        self.cohorts.iter().map(|c| c.patient_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bmi_boundaries() {
        assert_eq!(BmiRange::from_bmi(10.0), Some(BmiRange::Underweight));
        assert_eq!(BmiRange::from_bmi(18.4999), Some(BmiRange::Underweight));
        assert_eq!(BmiRange::from_bmi(18.5), Some(BmiRange::Normal));
        assert_eq!(BmiRange::from_bmi(25.0), Some(BmiRange::Overweight));
        assert_eq!(BmiRange::from_bmi(30.0), Some(BmiRange::Obese));
        assert_eq!(BmiRange::from_bmi(60.0), Some(BmiRange::Obese));
    }

    #[test]
    fn test_bmi_out_of_range() {
        assert_eq!(BmiRange::from_bmi(9.999), None);
        assert_eq!(BmiRange::from_bmi(60.0001), None);
        assert_eq!(BmiRange::from_bmi(f64::NAN), None);
        assert_eq!(BmiRange::from_bmi(-5.0), None);
    }

    #[test]
    fn test_diagnosis_from_outcome() {
        assert_eq!(Diagnosis::from_outcome(Some(1)), Diagnosis::Diabetic);
        assert_eq!(Diagnosis::from_outcome(Some(0)), Diagnosis::NonDiabetic);
        assert_eq!(Diagnosis::from_outcome(None), Diagnosis::NonDiabetic);
        assert_eq!(Diagnosis::from_outcome(Some(2)), Diagnosis::NonDiabetic);
    }

    #[test]
    fn test_labels() {
        assert_eq!(BmiRange::Overweight.to_string(), "Overweight");
        assert_eq!(Diagnosis::NonDiabetic.to_string(), "Non-Diabetic");
    }

    #[test]
    fn test_summary_json_labels() {
        let summary = CohortSummary {
            bmi_range: BmiRange::Normal,
            diagnosis: Some(Diagnosis::NonDiabetic),
            avg_glucose: Some(105.0),
            patient_count: 2,
            avg_age: Some(41.0),
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"bmi_range\":\"Normal\""));
        assert!(json.contains("\"diagnosis\":\"Non-Diabetic\""));
    }
}
