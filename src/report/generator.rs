//! Summary report generation.
//!
//! This module renders a cohort report as CSV, JSON, Markdown or a
//! terminal table, and writes it to disk.

use crate::cli::OutputFormat;
use crate::error::{CohortError, CohortResult};
use crate::models::{CohortReport, CohortSummary, ReportMetadata};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{CellAlignment, ContentArrangement, Table};
use std::path::Path;

/// Column headers in output order.
fn headers(with_diagnosis: bool) -> Vec<&'static str> {
    let mut headers = vec!["bmi_range"];
    if with_diagnosis {
        headers.push("diagnosis");
    }
    headers.extend(["avg_glucose", "patient_count", "avg_age"]);
    headers
}

/// Cell values for one cohort, matching [`headers`], with means rendered by `mean`.
fn row_values(
    cohort: &CohortSummary,
    with_diagnosis: bool,
    mean: fn(Option<f64>) -> String,
) -> Vec<String> {
    let mut row = vec![cohort.bmi_range.label().to_string()];
    if with_diagnosis {
        row.push(
            cohort
                .diagnosis
                .map(|d| d.label().to_string())
                .unwrap_or_default(),
        );
    }
    row.push(mean(cohort.avg_glucose));
    row.push(cohort.patient_count.to_string());
    row.push(mean(cohort.avg_age));
    row
}

/// Shortest round-trip formatting; a missing mean is an empty cell.
fn format_mean(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Render the summary table as CSV.
pub fn generate_csv(report: &CohortReport) -> std::io::Result<Vec<u8>> {
    let with_diagnosis = report.has_diagnosis();
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(headers(with_diagnosis))?;
    for cohort in &report.cohorts {
        writer.write_record(row_values(cohort, with_diagnosis, format_mean))?;
    }

    writer.into_inner().map_err(|e| e.into_error())
}

/// Generate a JSON report.
pub fn generate_json_report(report: &CohortReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &CohortReport) -> String {
    let mut output = String::new();

    output.push_str("# Cohort Analysis Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_cohort_section(report));
    output.push_str("---\n\n*Report generated by CohortScope*\n");

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input:** `{}`\n", metadata.input_path));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!("- **Rows Read:** {}\n", metadata.rows_read));
    section.push_str(&format!("- **Rows Analyzed:** {}\n", metadata.rows_analyzed));
    if metadata.rows_excluded > 0 {
        section.push_str(&format!(
            "- **Rows Excluded (BMI outside 10-60):** {}\n",
            metadata.rows_excluded
        ));
    }
    section.push_str(&format!(
        "- **Out-of-range Policy:** {}\n",
        metadata.out_of_range
    ));
    section.push_str(&format!("- **Sort Order:** {}\n", metadata.sort_order));
    section.push_str(&format!(
        "- **Duration:** {:.2}s\n\n",
        metadata.duration_seconds
    ));

    section
}

fn generate_cohort_section(report: &CohortReport) -> String {
    let mut section = String::new();
    let with_diagnosis = report.has_diagnosis();

    section.push_str("## Cohorts\n\n");

    if report.cohorts.is_empty() {
        section.push_str("No patients fell into any BMI cohort.\n\n");
        return section;
    }

    let headers = headers(with_diagnosis);
    section.push_str(&format!("| {} |\n", headers.join(" | ")));
    section.push_str(&format!("|{}\n", ":---|".repeat(headers.len())));

    for cohort in &report.cohorts {
        section.push_str(&format!(
            "| {} |\n",
            row_values(cohort, with_diagnosis, format_mean).join(" | ")
        ));
    }
    section.push('\n');

    section
}

/// Render the summary as a terminal table.
pub fn render_table(report: &CohortReport) -> String {
    let with_diagnosis = report.has_diagnosis();
    let mut table = Table::new();

    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers(with_diagnosis));

    for cohort in &report.cohorts {
        table.add_row(row_values(cohort, with_diagnosis, display_mean));
    }

    let first_numeric = if with_diagnosis { 2 } else { 1 };
    for index in first_numeric..first_numeric + 3 {
        if let Some(column) = table.column_mut(index) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }

    table.to_string()
}

fn display_mean(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "null".to_string())
}

/// Render the report in `format` and write it to `path`, replacing any existing file.
pub fn write_report(report: &CohortReport, format: OutputFormat, path: &Path) -> CohortResult<()> {
    let write_err = |source: std::io::Error| CohortError::IoWrite {
        path: path.to_path_buf(),
        source,
    };

    let content = match format {
        OutputFormat::Csv => generate_csv(report).map_err(write_err)?,
        OutputFormat::Json => generate_json_report(report)
            .map_err(|e| write_err(e.into()))?
            .into_bytes(),
        OutputFormat::Markdown => generate_markdown_report(report).into_bytes(),
    };

    std::fs::write(path, content).map_err(write_err)
}
