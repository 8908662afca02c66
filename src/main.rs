//! CohortScope - BMI cohort analysis for patient health datasets
//!
//! Reads a patient CSV, buckets patients into BMI cohorts (optionally split
//! by diabetes diagnosis) and reports mean glucose, patient count and mean
//! age per cohort.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any failure (missing input, schema or parse error, write failure, bad arguments)

mod analysis;
mod cli;
mod config;
mod dataset;
mod error;
mod models;
mod pipeline;
mod report;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use pipeline::AnalysisConfig;
use std::path::Path;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&args, &config);

    info!("CohortScope v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_analysis(&args, config) {
        error!("Analysis failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .cohortscope.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to change input, cache, cohort grouping and output settings.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `general.verbose` in the config file raises the level unless `--quiet` is set.
fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the full load, analyze and emit workflow.
fn run_analysis(args: &Args, mut config: Config) -> Result<()> {
    config.merge_with_args(args);

    let mut analysis_config = AnalysisConfig::from(&config);
    analysis_config.show_progress = !args.quiet;
    analysis_config.validate_paths().map_err(anyhow::Error::msg)?;

    if !args.quiet {
        println!(
            "📥 Reading patients: {}",
            analysis_config.input_path.display()
        );
    }

    let report = pipeline::run(&analysis_config)
        .with_context(|| format!("Cohort analysis of {} failed", config.input.path))?;

    if args.quiet {
        return Ok(());
    }

    if config.output.print_summary {
        println!("\nCohort Analysis Summary:");
        println!("{}", report::render_table(&report));
    }

    println!(
        "\n📊 {} of {} patients in {} cohorts ({} excluded, {:.2}s)",
        report.total_patients(),
        report.metadata.rows_read,
        report.cohorts.len(),
        report.metadata.rows_excluded,
        report.metadata.duration_seconds
    );
    println!(
        "✅ Summary saved to: {}",
        analysis_config.output_path.display()
    );

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is installed, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", DEFAULT_CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}
