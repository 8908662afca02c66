//! Analysis modules.
//!
//! Cohort bucketing lives in `cohort`; grouping and ordering helpers in
//! `aggregator`.

pub mod aggregator;
pub mod cohort;

pub use cohort::{AnalyzerOptions, CohortAnalyzer};
