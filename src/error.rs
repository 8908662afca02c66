//! Error types for the cohort analysis pipeline.
//!
//! Every variant is fatal: the pipeline never recovers internally, it
//! aborts and reports the error to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, analyzing or persisting a dataset.
#[derive(Debug, Error)]
pub enum CohortError {
    /// The input CSV does not exist.
    #[error(
        "input file not found: {}. Generate the patient dataset first (expected a CSV with BMI, Glucose, Age and Outcome columns)",
        .path.display()
    )]
    InputNotFound { path: PathBuf },

    /// One or more required columns are absent from the header.
    #[error("{} is missing required column(s): {}", .path.display(), .missing.join(", "))]
    Schema { path: PathBuf, missing: Vec<String> },

    /// A cell could not be parsed as the expected numeric type.
    #[error("row {row}: cannot parse {column} value '{value}' as a number")]
    ValueParse {
        row: usize,
        column: String,
        value: String,
    },

    /// The CSV itself is malformed (bad quoting, ragged rows, invalid UTF-8).
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    /// Reading or writing the columnar cache failed.
    #[error("parquet cache {} failed: {source}", .path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: polars::prelude::PolarsError,
    },

    /// Writing an output artifact failed.
    #[error("failed to write {}: {source}", .path.display())]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O failure while reading.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type CohortResult<T> = std::result::Result<T, CohortError>;
