//! Cohort aggregation and ordering.
//!
//! This module provides the per-group accumulators and the sort used for
//! the summary table.

use crate::models::{CohortKey, CohortSummary, PatientRecord, SortOrder};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Running mean that skips missing values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanAccumulator {
    sum: f64,
    count: u64,
}

impl MeanAccumulator {
    pub fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    /// `None` when no value was observed.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Aggregates for one cohort.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CohortAccumulator {
    pub glucose: MeanAccumulator,
    pub age: MeanAccumulator,
    pub patient_count: u64,
}

impl CohortAccumulator {
    pub fn add(&mut self, record: &PatientRecord) {
        self.glucose.push(record.glucose);
        self.age.push(record.age);
        self.patient_count += 1;
    }
}

/// Group keyed records into cohorts.
pub fn group_by_key<'a, I>(rows: I) -> HashMap<CohortKey, CohortAccumulator>
where
    I: IntoIterator<Item = (CohortKey, &'a PatientRecord)>,
{
    let mut grouped: HashMap<CohortKey, CohortAccumulator> = HashMap::new();

    for (key, record) in rows {
        grouped.entry(key).or_default().add(record);
    }

    grouped
}

/// Turn grouped accumulators into summary rows (unordered).
pub fn summarize(grouped: HashMap<CohortKey, CohortAccumulator>) -> Vec<CohortSummary> {
    grouped
        .into_iter()
        .map(|(key, acc)| CohortSummary {
            bmi_range: key.bmi_range,
            diagnosis: key.diagnosis,
            avg_glucose: acc.glucose.mean(),
            patient_count: acc.patient_count,
            avg_age: acc.age.mean(),
        })
        .collect()
}

/// Sort summary rows by BMI range, then by diagnosis label.
pub fn sort_cohorts(cohorts: &mut [CohortSummary], order: SortOrder) {
    cohorts.sort_by(|a, b| {
        let by_range = match order {
            SortOrder::Lexical => a.bmi_range.label().cmp(b.bmi_range.label()),
            SortOrder::Clinical => a.bmi_range.clinical_rank().cmp(&b.bmi_range.clinical_rank()),
        };
        by_range.then_with(|| compare_diagnosis(a, b))
    });
}

fn compare_diagnosis(a: &CohortSummary, b: &CohortSummary) -> Ordering {
    let label = |c: &CohortSummary| c.diagnosis.map(|d| d.label());
    label(a).cmp(&label(b))
}
