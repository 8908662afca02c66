//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.cohortscope.toml` files.

use crate::cli::OutputFormat;
use crate::models::{OutOfRangePolicy, SortOrder};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".cohortscope.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input and cache settings.
    #[serde(default)]
    pub input: InputConfig,

    /// Cohort analysis settings.
    #[serde(default)]
    pub analysis: AnalysisSettings,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Input dataset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Patient CSV to analyze.
    #[serde(default = "default_input")]
    pub path: String,

    /// Parquet cache location.
    #[serde(default = "default_cache")]
    pub cache_path: String,

    /// Write the Parquet cache after reading the CSV.
    #[serde(default = "default_true")]
    pub write_cache: bool,

    /// Read from the cache instead of the CSV when it was built from it.
    #[serde(default)]
    pub reuse_cache: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: default_input(),
            cache_path: default_cache(),
            write_cache: true,
            reuse_cache: false,
        }
    }
}

fn default_input() -> String {
    "patients_large.csv".to_string()
}

fn default_cache() -> String {
    "patients_large.parquet".to_string()
}

fn default_true() -> bool {
    true
}

/// Cohort analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Split each BMI cohort by diagnosis.
    #[serde(default = "default_true")]
    pub group_by_diagnosis: bool,

    /// Treatment of BMI values outside `[10, 60]`.
    #[serde(default)]
    pub out_of_range: OutOfRangePolicy,

    /// Ordering of the summary table.
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            group_by_diagnosis: true,
            out_of_range: OutOfRangePolicy::default(),
            sort_order: SortOrder::default(),
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Summary file path.
    #[serde(default = "default_output")]
    pub path: String,

    /// Summary file format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Print the summary table to stdout.
    #[serde(default = "default_true")]
    pub print_summary: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output(),
            format: OutputFormat::default(),
            print_summary: true,
        }
    }
}

fn default_output() -> String {
    "cohort_analysis_summary.csv".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref input) = args.input {
            self.input.path = input.display().to_string();
        }
        if let Some(ref cache) = args.cache {
            self.input.cache_path = cache.display().to_string();
        }
        if args.no_cache {
            self.input.write_cache = false;
            self.input.reuse_cache = false;
        }
        if args.reuse_cache {
            self.input.reuse_cache = true;
        }

        if args.no_diagnosis {
            self.analysis.group_by_diagnosis = false;
        }
        if let Some(policy) = args.out_of_range {
            self.analysis.out_of_range = policy;
        }
        if let Some(order) = args.sort {
            self.analysis.sort_order = order;
        }

        if let Some(ref output) = args.output {
            self.output.path = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.output.format = format;
        }
        if args.no_print {
            self.output.print_summary = false;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::make_args;
    use std::path::PathBuf;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.input.path, "patients_large.csv");
        assert_eq!(config.input.cache_path, "patients_large.parquet");
        assert_eq!(config.output.path, "cohort_analysis_summary.csv");
        assert!(config.input.write_cache);
        assert!(config.analysis.group_by_diagnosis);
        assert_eq!(config.analysis.out_of_range, OutOfRangePolicy::Drop);
        assert_eq!(config.analysis.sort_order, SortOrder::Lexical);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[input]
path = "data/patients.csv"
write_cache = false

[analysis]
group_by_diagnosis = false
out_of_range = "unknown"
sort_order = "clinical"

[output]
path = "out.json"
format = "json"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.path, "data/patients.csv");
        assert!(!config.input.write_cache);
        assert_eq!(config.input.cache_path, "patients_large.parquet");
        assert!(!config.analysis.group_by_diagnosis);
        assert_eq!(config.analysis.out_of_range, OutOfRangePolicy::Unknown);
        assert_eq!(config.analysis.sort_order, SortOrder::Clinical);
        assert_eq!(config.output.path, "out.json");
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.print_summary);
    }

    #[test]
    fn test_merge_only_overrides_given_flags() {
        let mut config: Config = toml::from_str("[analysis]\nsort_order = \"clinical\"\n").unwrap();
        let mut args = make_args();
        args.input = Some(PathBuf::from("other.csv"));
        args.no_cache = true;

        config.merge_with_args(&args);

        assert_eq!(config.input.path, "other.csv");
        assert!(!config.input.write_cache);
        assert_eq!(config.analysis.sort_order, SortOrder::Clinical);
        assert_eq!(config.output.path, "cohort_analysis_summary.csv");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[input]"));
        assert!(toml_str.contains("[analysis]"));
        assert!(toml_str.contains("[output]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.input.path, "patients_large.csv");
    }
}
