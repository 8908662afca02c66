//! BMI cohort analysis.
//!
//! Filters rows by BMI, assigns each remaining row a cohort key and
//! aggregates glucose, count and age per cohort.

use super::aggregator::{group_by_key, sort_cohorts, summarize};
use crate::models::{
    BmiRange, CohortKey, CohortSummary, Diagnosis, OutOfRangePolicy, PatientRecord, SortOrder,
};
use tracing::debug;

/// Options for a [`CohortAnalyzer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerOptions {
    pub out_of_range: OutOfRangePolicy,
    pub group_by_diagnosis: bool,
    pub sort_order: SortOrder,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            out_of_range: OutOfRangePolicy::Drop,
            group_by_diagnosis: true,
            sort_order: SortOrder::Lexical,
        }
    }
}

/// Result of analyzing a set of records.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortAnalysis {
    pub cohorts: Vec<CohortSummary>,
    pub rows_analyzed: usize,
    pub rows_excluded: usize,
}

/// Buckets patients into BMI cohorts and aggregates them.
#[derive(Debug, Clone, Default)]
pub struct CohortAnalyzer {
    options: AnalyzerOptions,
}

impl CohortAnalyzer {
    pub fn new(options: AnalyzerOptions) -> Self {
        Self { options }
    }

    /// BMI label for a record, or `None` if the record is excluded.
    pub fn bucket(&self, record: &PatientRecord) -> Option<BmiRange> {
        let range = record.bmi.and_then(BmiRange::from_bmi);

        match self.options.out_of_range {
            OutOfRangePolicy::Drop => range,
            OutOfRangePolicy::Unknown => Some(range.unwrap_or(BmiRange::Unknown)),
        }
    }

    /// Grouping key for a record, or `None` if the record is excluded.
    pub fn key_for(&self, record: &PatientRecord) -> Option<CohortKey> {
        let bmi_range = self.bucket(record)?;
        let diagnosis = self
            .options
            .group_by_diagnosis
            .then(|| Diagnosis::from_outcome(record.outcome));

        Some(CohortKey {
            bmi_range,
            diagnosis,
        })
    }

    /// Run the full filter, bin, group, aggregate and sort pass.
    pub fn analyze(&self, records: &[PatientRecord]) -> CohortAnalysis {
        let keyed: Vec<(CohortKey, &PatientRecord)> = records
            .iter()
            .filter_map(|record| self.key_for(record).map(|key| (key, record)))
            .collect();

        let rows_analyzed = keyed.len();
        let rows_excluded = records.len() - rows_analyzed;
        debug!(
            "{} rows in range, {} excluded ({} policy)",
            rows_analyzed, rows_excluded, self.options.out_of_range
        );

        let mut cohorts = summarize(group_by_key(keyed));
        sort_cohorts(&mut cohorts, self.options.sort_order);

        CohortAnalysis {
            cohorts,
            rows_analyzed,
            rows_excluded,
        }
    }
}
