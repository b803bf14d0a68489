//! Read-only data quality checks.
//!
//! Summaries of missing values, outliers and duplicate rows, plus column
//! statistics. Used for dry runs and for inspecting a dataset before
//! deciding how to clean it.

mod analyzer;

pub use analyzer::{
    DataQualityAnalyzer, DuplicateSummary, MissingValueSummary, OutlierFinding, QualitySummary,
};
