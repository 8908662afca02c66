//! Dataset loading.
//!
//! Patient rows come from the input CSV, or from a Parquet cache of it when
//! cache reuse is enabled and the cache was built from that same CSV.

pub mod cache;
pub mod csv_source;

use crate::error::{CohortError, CohortResult};
use crate::models::{DataSource, PatientRecord};
use std::path::Path;
use tracing::{info, warn};

/// Rows read from one source, plus whether it carried an `Outcome` column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientRows {
    pub records: Vec<PatientRecord>,
    pub has_outcome: bool,
}

/// Rows loaded for one analysis run.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub rows: PatientRows,
    pub source: DataSource,
}

/// Options controlling where rows are read from.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions<'a> {
    pub input: &'a Path,
    pub cache: Option<&'a Path>,
    pub reuse_cache: bool,
    pub require_outcome: bool,
    pub show_progress: bool,
}

/// Load the dataset, preferring a matching cache when allowed.
///
/// The input CSV must exist even when the cache is used, and the cache is
/// held to the same column requirements as the CSV.
pub fn load(options: LoadOptions<'_>) -> CohortResult<LoadedDataset> {
    if !options.input.exists() {
        return Err(CohortError::InputNotFound {
            path: options.input.to_path_buf(),
        });
    }

    if let (true, Some(cache_path)) = (options.reuse_cache, options.cache) {
        if cache::is_valid_for(cache_path, options.input) {
            match cache::read_cache(cache_path) {
                Ok(rows) => {
                    if options.require_outcome && !rows.has_outcome {
                        return Err(CohortError::Schema {
                            path: options.input.to_path_buf(),
                            missing: vec![csv_source::OUTCOME_COLUMN.to_string()],
                        });
                    }
                    info!(
                        "Using Parquet cache: {} ({} rows)",
                        cache_path.display(),
                        rows.records.len()
                    );
                    return Ok(LoadedDataset {
                        rows,
                        source: DataSource::ParquetCache,
                    });
                }
                Err(e) => warn!("Ignoring unreadable cache {}: {}", cache_path.display(), e),
            }
        } else {
            info!(
                "Parquet cache missing or not built from {}, reading CSV",
                options.input.display()
            );
        }
    }

    let rows =
        csv_source::read_records(options.input, options.require_outcome, options.show_progress)?;

    Ok(LoadedDataset {
        rows,
        source: DataSource::Csv,
    })
}
