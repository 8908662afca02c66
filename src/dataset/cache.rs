//! Parquet cache of the input dataset.
//!
//! The cache only speeds up repeated scans of the same CSV. A sidecar file
//! next to it records which CSV it was built from (canonical path, size and
//! modification time), and the cache is only used while that still matches.

use super::PatientRows;
use crate::dataset::csv_source::{AGE_COLUMN, BMI_COLUMN, GLUCOSE_COLUMN, OUTCOME_COLUMN};
use crate::error::{CohortError, CohortResult};
use crate::models::PatientRecord;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info};

/// Identity of the CSV a cache was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFingerprint {
    pub path: PathBuf,
    pub size: u64,
    pub modified_secs: u64,
    pub modified_nanos: u32,
}

impl SourceFingerprint {
    /// Fingerprint the file at `input` as it is now.
    pub fn of(input: &Path) -> std::io::Result<Self> {
        let path = std::fs::canonicalize(input)?;
        let metadata = std::fs::metadata(&path)?;
        let modified = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        Ok(Self {
            path,
            size: metadata.len(),
            modified_secs: modified.as_secs(),
            modified_nanos: modified.subsec_nanos(),
        })
    }
}

/// Location of the fingerprint sidecar for a cache file.
pub fn fingerprint_path(cache: &Path) -> PathBuf {
    let mut name = cache.as_os_str().to_owned();
    name.push(".source.json");
    PathBuf::from(name)
}

/// Write rows to a zstd-compressed Parquet file built from `input`,
/// replacing any existing cache.
///
/// `Outcome` is only stored when the source CSV had that column.
pub fn write_cache(rows: &PatientRows, input: &Path, path: &Path) -> CohortResult<()> {
    let cache_err = |source| CohortError::Cache {
        path: path.to_path_buf(),
        source,
    };
    let sidecar = fingerprint_path(path);

    // An old sidecar must not vouch for a half-written cache.
    if sidecar.exists() {
        std::fs::remove_file(&sidecar).map_err(|source| CohortError::IoWrite {
            path: sidecar.clone(),
            source,
        })?;
    }

    let mut frame = rows_to_frame(rows).map_err(cache_err)?;

    let file = File::create(path).map_err(|source| CohortError::IoWrite {
        path: path.to_path_buf(),
        source,
    })?;

    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Zstd(None))
        .finish(&mut frame)
        .map_err(cache_err)?;

    let write_sidecar_err = |source: std::io::Error| CohortError::IoWrite {
        path: sidecar.clone(),
        source,
    };
    let fingerprint = SourceFingerprint::of(input)?;
    let json =
        serde_json::to_string_pretty(&fingerprint).map_err(|e| write_sidecar_err(e.into()))?;
    std::fs::write(&sidecar, json).map_err(write_sidecar_err)?;

    info!(
        "Wrote Parquet cache: {} ({} rows)",
        path.display(),
        rows.records.len()
    );
    Ok(())
}

/// Read rows back from a Parquet cache.
pub fn read_cache(path: &Path) -> CohortResult<PatientRows> {
    let cache_err = |source| CohortError::Cache {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path)?;
    let frame = ParquetReader::new(file).finish().map_err(cache_err)?;
    debug!("Cache shape: {:?}", frame.shape());

    frame_to_rows(&frame).map_err(cache_err)
}

/// Whether the cache at `cache` was built from the current contents of `input`.
///
/// A missing or unreadable sidecar means the cache cannot be trusted.
pub fn is_valid_for(cache: &Path, input: &Path) -> bool {
    if !cache.exists() {
        return false;
    }

    let stored = std::fs::read_to_string(fingerprint_path(cache))
        .ok()
        .and_then(|content| serde_json::from_str::<SourceFingerprint>(&content).ok());

    match (stored, SourceFingerprint::of(input)) {
        (Some(stored), Ok(current)) => {
            if stored != current {
                debug!("Cache fingerprint {:?} does not match {:?}", stored, current);
            }
            stored == current
        }
        _ => false,
    }
}

fn rows_to_frame(rows: &PatientRows) -> PolarsResult<DataFrame> {
    let records = &rows.records;
    let bmi: Vec<Option<f64>> = records.iter().map(|r| r.bmi).collect();
    let glucose: Vec<Option<f64>> = records.iter().map(|r| r.glucose).collect();
    let age: Vec<Option<f64>> = records.iter().map(|r| r.age).collect();

    let mut columns = vec![
        Series::new(BMI_COLUMN, bmi),
        Series::new(GLUCOSE_COLUMN, glucose),
        Series::new(AGE_COLUMN, age),
    ];
    if rows.has_outcome {
        let outcome: Vec<Option<i64>> = records.iter().map(|r| r.outcome).collect();
        columns.push(Series::new(OUTCOME_COLUMN, outcome));
    }

    DataFrame::new(columns)
}

fn frame_to_rows(frame: &DataFrame) -> PolarsResult<PatientRows> {
    let bmi = float_column(frame, BMI_COLUMN)?;
    let glucose = float_column(frame, GLUCOSE_COLUMN)?;
    let age = float_column(frame, AGE_COLUMN)?;

    let outcome: Option<Vec<Option<i64>>> = match frame.column(OUTCOME_COLUMN) {
        Ok(series) => Some(series.cast(&DataType::Int64)?.i64()?.into_iter().collect()),
        Err(_) => None,
    };
    let has_outcome = outcome.is_some();
    let mut outcome = outcome.unwrap_or_default().into_iter();

    let records = bmi
        .into_iter()
        .zip(glucose)
        .zip(age)
        .map(|((bmi, glucose), age)| PatientRecord {
            bmi,
            glucose,
            age,
            outcome: outcome.next().flatten(),
        })
        .collect();

    Ok(PatientRows {
        records,
        has_outcome,
    })
}

fn float_column(frame: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let values = frame
        .column(name)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .collect();
    Ok(values)
}
