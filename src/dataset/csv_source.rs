//! Strict CSV reader for patient datasets.
//!
//! Validates the header before reading any rows and fails fast on the
//! first cell that cannot be parsed.

use super::PatientRows;
use crate::error::{CohortError, CohortResult};
use crate::models::PatientRecord;
use csv::StringRecord;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{debug, info};

pub const BMI_COLUMN: &str = "BMI";
pub const GLUCOSE_COLUMN: &str = "Glucose";
pub const AGE_COLUMN: &str = "Age";
pub const OUTCOME_COLUMN: &str = "Outcome";

/// Rows between progress updates.
const PROGRESS_INTERVAL: usize = 50_000;

/// Positions of the analyzed columns in the header.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    bmi: usize,
    glucose: usize,
    age: usize,
    outcome: Option<usize>,
}

impl ColumnIndex {
    /// Locate the required columns, collecting every missing name.
    fn resolve(headers: &StringRecord, path: &Path, require_outcome: bool) -> CohortResult<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let bmi = find(BMI_COLUMN);
        let glucose = find(GLUCOSE_COLUMN);
        let age = find(AGE_COLUMN);
        let outcome = find(OUTCOME_COLUMN);

        let mut missing = Vec::new();
        for (name, index) in [(BMI_COLUMN, bmi), (GLUCOSE_COLUMN, glucose), (AGE_COLUMN, age)] {
            if index.is_none() {
                missing.push(name.to_string());
            }
        }
        if require_outcome && outcome.is_none() {
            missing.push(OUTCOME_COLUMN.to_string());
        }

        match (bmi, glucose, age) {
            (Some(bmi), Some(glucose), Some(age)) if missing.is_empty() => Ok(Self {
                bmi,
                glucose,
                age,
                outcome,
            }),
            _ => Err(CohortError::Schema {
                path: path.to_path_buf(),
                missing,
            }),
        }
    }

    fn parse(&self, record: &StringRecord, row: usize) -> CohortResult<PatientRecord> {
        Ok(PatientRecord {
            bmi: parse_float(record, self.bmi, BMI_COLUMN, row)?,
            glucose: parse_float(record, self.glucose, GLUCOSE_COLUMN, row)?,
            age: parse_float(record, self.age, AGE_COLUMN, row)?,
            outcome: match self.outcome {
                Some(index) => parse_outcome(record, index, row)?,
                None => None,
            },
        })
    }
}

/// Parse a numeric cell. Empty cells are missing values.
fn parse_float(
    record: &StringRecord,
    index: usize,
    column: &str,
    row: usize,
) -> CohortResult<Option<f64>> {
    let raw = record.get(index).unwrap_or("").trim();
    if raw.is_empty() {
        return Ok(None);
    }

    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| CohortError::ValueParse {
            row,
            column: column.to_string(),
            value: raw.to_string(),
        })
}

/// Parse the 0/1 outcome indicator. Accepts `1` as well as `1.0`.
fn parse_outcome(record: &StringRecord, index: usize, row: usize) -> CohortResult<Option<i64>> {
    let value = parse_float(record, index, OUTCOME_COLUMN, row)?;

    match value {
        None => Ok(None),
        Some(v) if v.is_finite() && v.fract() == 0.0 => Ok(Some(v as i64)),
        Some(_) => Err(CohortError::ValueParse {
            row,
            column: OUTCOME_COLUMN.to_string(),
            value: record.get(index).unwrap_or("").trim().to_string(),
        }),
    }
}

/// Read every patient row from a CSV file.
///
/// Row numbers in errors count data rows from 1, excluding the header.
pub fn read_records(
    path: &Path,
    require_outcome: bool,
    show_progress: bool,
) -> CohortResult<PatientRows> {
    if !path.exists() {
        return Err(CohortError::InputNotFound {
            path: path.to_path_buf(),
        });
    }

    info!("Reading CSV: {}", path.display());

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    debug!("Header: {:?}", headers);
    let columns = ColumnIndex::resolve(&headers, path, require_outcome)?;

    let progress = if show_progress {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}") {
            pb.set_style(style);
        }
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut records = Vec::new();
    let mut record = StringRecord::new();
    let mut row = 0;

    while reader.read_record(&mut record)? {
        row += 1;
        records.push(columns.parse(&record, row)?);

        if row % PROGRESS_INTERVAL == 0 {
            progress.set_message(format!("{} rows read", row));
            progress.tick();
        }
    }

    progress.finish_and_clear();
    info!("Read {} rows from {}", records.len(), path.display());

    Ok(PatientRows {
        records,
        has_outcome: columns.outcome.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("patients.csv");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_records() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "Pregnancies,Glucose,BMI,Age,Outcome\n1,90,17,30,0\n2,100,22.5,40,1\n",
        );

        let rows = read_records(&path, true, false).unwrap();
        let records = rows.records;

        assert!(rows.has_outcome);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], PatientRecord::new(17.0, 90.0, 30.0, 0));
        assert_eq!(records[1], PatientRecord::new(22.5, 100.0, 40.0, 1));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = read_records(&dir.path().join("absent.csv"), true, false);
        assert!(matches!(result, Err(CohortError::InputNotFound { .. })));
    }

    #[test]
    fn test_missing_columns_are_all_named() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "BMI,Age\n22,40\n");

        match read_records(&path, true, false) {
            Err(CohortError::Schema { missing, .. }) => {
                assert_eq!(missing, vec!["Glucose".to_string(), "Outcome".to_string()]);
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_outcome_optional_without_diagnosis() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "BMI,Glucose,Age\n22,100,40\n");

        let rows = read_records(&path, false, false).unwrap();
        assert!(!rows.has_outcome);
        assert_eq!(rows.records[0].outcome, None);
    }

    #[test]
    fn test_empty_cells_are_missing() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "BMI,Glucose,Age,Outcome\n22,,40,\n");

        let records = read_records(&path, true, false).unwrap().records;
        assert_eq!(records[0].glucose, None);
        assert_eq!(records[0].outcome, None);
        assert_eq!(records[0].age, Some(40.0));
    }

    #[test]
    fn test_malformed_value_names_row() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "BMI,Glucose,Age,Outcome\n22,100,40,0\n23,high,41,1\n");

        match read_records(&path, true, false) {
            Err(CohortError::ValueParse { row, column, value }) => {
                assert_eq!(row, 2);
                assert_eq!(column, "Glucose");
                assert_eq!(value, "high");
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_fractional_outcome_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "BMI,Glucose,Age,Outcome\n22,100,40,0.5\n");

        let result = read_records(&path, true, false);
        assert!(matches!(result, Err(CohortError::ValueParse { .. })));
    }

    #[test]
    fn test_float_outcome_accepted() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "BMI,Glucose,Age,Outcome\n22,100,40,1.0\n");

        let records = read_records(&path, true, false).unwrap().records;
        assert_eq!(records[0].outcome, Some(1));
    }
}
