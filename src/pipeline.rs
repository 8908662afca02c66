//! End-to-end cohort analysis run.
//!
//! Loads the dataset, refreshes the cache, analyzes and assembles the
//! report. The summary file is written only after every earlier step has
//! succeeded, so a failed run leaves no output behind.

use crate::analysis::{AnalyzerOptions, CohortAnalyzer};
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::dataset::{self, cache, LoadOptions};
use crate::error::CohortResult;
use crate::models::{CohortReport, DataSource, ReportMetadata};
use crate::report;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Settings for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub input_path: PathBuf,
    /// `None` disables the cache entirely.
    pub cache_path: Option<PathBuf>,
    pub output_path: PathBuf,
    pub output_format: OutputFormat,
    pub write_cache: bool,
    pub reuse_cache: bool,
    pub analyzer: AnalyzerOptions,
    pub show_progress: bool,
}

impl From<&Config> for AnalysisConfig {
    fn from(config: &Config) -> Self {
        let cache_enabled = config.input.write_cache || config.input.reuse_cache;

        Self {
            input_path: PathBuf::from(&config.input.path),
            cache_path: cache_enabled.then(|| PathBuf::from(&config.input.cache_path)),
            output_path: PathBuf::from(&config.output.path),
            output_format: config.output.format,
            write_cache: config.input.write_cache,
            reuse_cache: config.input.reuse_cache,
            analyzer: AnalyzerOptions {
                out_of_range: config.analysis.out_of_range,
                group_by_diagnosis: config.analysis.group_by_diagnosis,
                sort_order: config.analysis.sort_order,
            },
            show_progress: false,
        }
    }
}

impl AnalysisConfig {
    /// Check that input, cache and output name three different files.
    ///
    /// Runs on the merged settings, so defaults and config-file paths are
    /// covered as well as command-line ones.
    pub fn validate_paths(&self) -> Result<(), String> {
        if same_file(&self.input_path, &self.output_path) {
            return Err(format!(
                "Output path {} must differ from the input path",
                self.output_path.display()
            ));
        }

        if let Some(cache_path) = &self.cache_path {
            if same_file(&self.input_path, cache_path) {
                return Err(format!(
                    "Cache path {} must differ from the input path",
                    cache_path.display()
                ));
            }
            if same_file(cache_path, &self.output_path) {
                return Err(format!(
                    "Cache path {} must differ from the output path",
                    cache_path.display()
                ));
            }
        }

        Ok(())
    }
}

/// Whether two paths name the same file, resolving `.`/`..` and symlinks
/// where the file (or its parent directory) exists.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (resolve(a), resolve(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(resolved) = std::fs::canonicalize(path) {
        return Some(resolved);
    }

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let parent = std::fs::canonicalize(parent).ok()?;
    Some(parent.join(path.file_name()?))
}

/// Compute the cohort report without writing the summary file.
///
/// May write the Parquet cache as a side effect.
pub fn analyze(config: &AnalysisConfig) -> CohortResult<CohortReport> {
    let start_time = Instant::now();

    let loaded = dataset::load(LoadOptions {
        input: &config.input_path,
        cache: config.cache_path.as_deref(),
        reuse_cache: config.reuse_cache,
        require_outcome: config.analyzer.group_by_diagnosis,
        show_progress: config.show_progress,
    })?;

    if let (true, DataSource::Csv, Some(cache_path)) =
        (config.write_cache, loaded.source, config.cache_path.as_deref())
    {
        cache::write_cache(&loaded.rows, &config.input_path, cache_path)?;
    }

    let analyzer = CohortAnalyzer::new(config.analyzer);
    let records = &loaded.rows.records;
    let analysis = analyzer.analyze(records);

    if analysis.cohorts.is_empty() {
        warn!("No rows fell into any cohort");
    }
    info!(
        "Analyzed {} of {} rows into {} cohorts",
        analysis.rows_analyzed,
        records.len(),
        analysis.cohorts.len()
    );

    let metadata = ReportMetadata {
        input_path: config.input_path.display().to_string(),
        analysis_date: Utc::now(),
        source: loaded.source,
        rows_read: records.len(),
        rows_analyzed: analysis.rows_analyzed,
        rows_excluded: analysis.rows_excluded,
        group_by_diagnosis: config.analyzer.group_by_diagnosis,
        out_of_range: config.analyzer.out_of_range,
        sort_order: config.analyzer.sort_order,
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    Ok(CohortReport {
        metadata,
        cohorts: analysis.cohorts,
    })
}

/// Analyze and persist the summary in the configured format.
pub fn run(config: &AnalysisConfig) -> CohortResult<CohortReport> {
    let report = analyze(config)?;
    report::write_report(&report, config.output_format, &config.output_path)?;
    info!("Summary written to {}", config.output_path.display());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CohortError;
    use crate::models::{BmiRange, Diagnosis, OutOfRangePolicy, SortOrder};
    use tempfile::TempDir;

    const FIXTURE: &str = include_str!("../fixtures/patients_sample.csv");

    fn config_in(dir: &Path) -> AnalysisConfig {
        AnalysisConfig {
            input_path: dir.join("patients_large.csv"),
            cache_path: Some(dir.join("patients_large.parquet")),
            output_path: dir.join("cohort_analysis_summary.csv"),
            output_format: OutputFormat::Csv,
            write_cache: true,
            reuse_cache: false,
            analyzer: AnalyzerOptions::default(),
            show_progress: false,
        }
    }

    #[test]
    fn test_from_config_defaults() {
        let config = AnalysisConfig::from(&Config::default());
        assert_eq!(config.input_path, PathBuf::from("patients_large.csv"));
        assert_eq!(config.cache_path, Some(PathBuf::from("patients_large.parquet")));
        assert_eq!(config.output_path, PathBuf::from("cohort_analysis_summary.csv"));
        assert!(config.write_cache);
        assert_eq!(config.analyzer, AnalyzerOptions::default());
    }

    #[test]
    fn test_from_config_cache_disabled() {
        let mut file_config = Config::default();
        file_config.input.write_cache = false;
        let config = AnalysisConfig::from(&file_config);
        assert_eq!(config.cache_path, None);
    }

    #[test]
    fn test_output_onto_default_input_rejected() {
        let mut file_config = Config::default();
        file_config.output.path = "patients_large.csv".to_string();

        let config = AnalysisConfig::from(&file_config);

        let err = config.validate_paths().unwrap_err();
        assert!(err.contains("input path"));
    }

    #[test]
    fn test_cache_onto_default_paths_rejected() {
        let mut file_config = Config::default();
        file_config.input.cache_path = "patients_large.csv".to_string();
        assert!(AnalysisConfig::from(&file_config).validate_paths().is_err());

        file_config.input.cache_path = "cohort_analysis_summary.csv".to_string();
        assert!(AnalysisConfig::from(&file_config).validate_paths().is_err());

        file_config.input.write_cache = false;
        assert!(AnalysisConfig::from(&file_config).validate_paths().is_ok());
    }

    #[test]
    fn test_equivalent_paths_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        std::fs::write(&config.input_path, FIXTURE).unwrap();
        assert!(config.validate_paths().is_ok());

        config.output_path = dir.path().join(".").join("patients_large.csv");
        assert!(config.validate_paths().is_err());
    }

    #[test]
    fn test_run_on_fixture() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.input_path, FIXTURE).unwrap();

        let report = run(&config).unwrap();

        assert_eq!(report.metadata.rows_read, 12);
        assert_eq!(report.metadata.rows_excluded, 2);
        assert_eq!(report.total_patients(), 10);
        assert_eq!(report.metadata.source, DataSource::Csv);
        assert!(config.output_path.exists());
        assert!(dir.path().join("patients_large.parquet").exists());

        let first = &report.cohorts[0];
        assert_eq!(first.bmi_range, BmiRange::Normal);
        assert_eq!(first.diagnosis, Some(Diagnosis::Diabetic));
    }

    #[test]
    fn test_rerun_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.input_path, FIXTURE).unwrap();

        run(&config).unwrap();
        let first = std::fs::read(&config.output_path).unwrap();
        run(&config).unwrap();
        let second = std::fs::read(&config.output_path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_cache_reuse_matches_csv() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        std::fs::write(&config.input_path, FIXTURE).unwrap();

        let from_csv = analyze(&config).unwrap();
        config.reuse_cache = true;
        let from_cache = analyze(&config).unwrap();

        assert_eq!(from_cache.metadata.source, DataSource::ParquetCache);
        assert_eq!(from_csv.cohorts, from_cache.cohorts);
    }

    #[test]
    fn test_shared_cache_is_not_reused_for_other_input() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        let first = dir.path().join("a.csv");
        let second = dir.path().join("b.csv");
        std::fs::write(&second, "BMI,Glucose,Age,Outcome\n40,150,50,1\n").unwrap();
        std::fs::write(&first, "BMI,Glucose,Age,Outcome\n22,100,40,0\n").unwrap();

        config.input_path = first;
        analyze(&config).unwrap();

        config.input_path = second;
        config.reuse_cache = true;
        let report = analyze(&config).unwrap();

        assert_eq!(report.metadata.source, DataSource::Csv);
        assert_eq!(report.cohorts.len(), 1);
        assert_eq!(report.cohorts[0].bmi_range, BmiRange::Obese);
        assert_eq!(report.cohorts[0].diagnosis, Some(Diagnosis::Diabetic));
    }

    #[test]
    fn test_cache_without_outcome_rejected_for_diagnosis_run() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        std::fs::write(&config.input_path, "BMI,Glucose,Age\n22,100,40\n").unwrap();

        config.analyzer.group_by_diagnosis = false;
        run(&config).unwrap();
        std::fs::remove_file(&config.output_path).unwrap();

        config.analyzer.group_by_diagnosis = true;
        config.reuse_cache = true;
        let result = run(&config);

        match result {
            Err(CohortError::Schema { missing, .. }) => {
                assert_eq!(missing, vec!["Outcome".to_string()]);
            }
            other => panic!("expected schema error, got {:?}", other),
        }
        assert!(!config.output_path.exists());
    }

    #[test]
    fn test_missing_input_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());

        let result = run(&config);

        assert!(matches!(result, Err(CohortError::InputNotFound { .. })));
        assert!(!config.output_path.exists());
        assert!(!dir.path().join("patients_large.parquet").exists());
    }

    #[test]
    fn test_parse_error_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.input_path, "BMI,Glucose,Age,Outcome\n22,100,forty,0\n").unwrap();

        let result = run(&config);

        assert!(matches!(result, Err(CohortError::ValueParse { row: 1, .. })));
        assert!(!config.output_path.exists());
    }

    #[test]
    fn test_unknown_policy_on_fixture() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.analyzer = AnalyzerOptions {
            out_of_range: OutOfRangePolicy::Unknown,
            group_by_diagnosis: false,
            sort_order: SortOrder::Clinical,
        };
        std::fs::write(&config.input_path, FIXTURE).unwrap();

        let report = analyze(&config).unwrap();

        let labels: Vec<_> = report.cohorts.iter().map(|c| c.bmi_range.label()).collect();
        assert_eq!(labels, vec!["Underweight", "Normal", "Overweight", "Obese", "Unknown"]);
        assert_eq!(report.total_patients(), 12);
    }
}
