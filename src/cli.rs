//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{OutOfRangePolicy, SortOrder};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CohortScope - BMI cohort analysis for patient datasets
///
/// Reads a patient CSV, buckets patients into BMI cohorts and reports mean
/// glucose, patient count and mean age per cohort. With no arguments it
/// reads patients_large.csv and writes cohort_analysis_summary.csv.
///
/// Examples:
///   cohortscope
///   cohortscope --input data/patients.csv --output summary.csv
///   cohortscope --no-diagnosis --sort clinical
///   cohortscope --out-of-range unknown --format json --output summary.json
///   cohortscope --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Patient CSV to analyze
    ///
    /// Must contain BMI, Glucose and Age columns, plus Outcome unless
    /// --no-diagnosis is given. Default: patients_large.csv.
    #[arg(short, long, value_name = "FILE", env = "COHORTSCOPE_INPUT")]
    pub input: Option<PathBuf>,

    /// Output file path for the summary
    ///
    /// Default: cohort_analysis_summary.csv
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Parquet cache file path
    ///
    /// Default: patients_large.parquet
    #[arg(long, value_name = "FILE")]
    pub cache: Option<PathBuf>,

    /// Neither write nor read the Parquet cache
    #[arg(long, conflicts_with = "reuse_cache")]
    pub no_cache: bool,

    /// Read from the Parquet cache when it was built from this exact CSV
    #[arg(long)]
    pub reuse_cache: bool,

    /// How to treat BMI values outside [10, 60]
    ///
    /// drop: exclude the row. unknown: keep it in an "Unknown" cohort.
    #[arg(long, value_name = "POLICY")]
    pub out_of_range: Option<OutOfRangePolicy>,

    /// Ordering of the summary table (lexical, clinical)
    #[arg(long, value_name = "ORDER")]
    pub sort: Option<SortOrder>,

    /// Group by BMI range only, without the diagnosis split
    #[arg(long)]
    pub no_diagnosis: bool,

    /// Output format (csv, json, markdown)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .cohortscope.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Do not print the summary table to stdout
    #[arg(long)]
    pub no_print: bool,

    /// Generate a default .cohortscope.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the summary file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// CSV table (default)
    #[default]
    Csv,
    /// JSON report with run metadata
    Json,
    /// Markdown report
    Markdown,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
