//! Statistical data cleaning for tabular data, built on Polars.
//!
//! # Overview
//!
//! - **Profiling**: per-column statistics, missing counts, outlier counts
//! - **Cleaning**: duplicate removal, missing-value imputation, outlier
//!   detection and treatment, value transformations
//! - **Recommendations**: built-in heuristics, fixed manual rules, or an
//!   external LLM provider with heuristic fallback
//! - **Reporting**: structured report, audit log, plain-text summary, JSON
//! - **Progress Reporting**: stage updates with cooperative cancellation
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_cleaning::{Pipeline, CleaningConfig, ReportFormatter};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .try_into_reader_with_file_path(Some("data.csv".into()))?
//!     .finish()?;
//!
//! let result = Pipeline::builder()
//!     .config(CleaningConfig::builder().use_ai_recommendations(false).build()?)
//!     .build()?
//!     .clean(&df)?;
//!
//! println!("{}", ReportFormatter::render(&result.report));
//! ```
//!
//! # Manual rules
//!
//! ```rust,ignore
//! use lex_cleaning::{ManualRules, MissingValueStrategy, Pipeline};
//!
//! let mut rules = ManualRules::default();
//! rules.missing_values.insert("price".into(), MissingValueStrategy::Median);
//! rules.remove_duplicates = true;
//!
//! let result = Pipeline::builder().build()?.clean_with_rules(&df, rules)?;
//! ```
//!
//! # Cancellation
//!
//! ```rust,ignore
//! use lex_cleaning::{CancellationToken, CleaningError, Pipeline};
//!
//! let token = CancellationToken::new();
//! let pipeline = Pipeline::builder().cancellation_token(token.clone()).build()?;
//!
//! match pipeline.clean(&df) {
//!     Ok(result) => println!("{} rows left", result.report.final_rows),
//!     Err(CleaningError::Cancelled) => println!("Cancelled"),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```

pub mod ai;
pub mod cleaner;
pub mod config;
pub mod decisions;
pub mod error;
pub mod imputers;
pub mod pipeline;
pub mod profiler;
pub mod quality;
pub mod reporting;
pub mod types;
pub mod utils;

pub use cleaner::{DuplicateResolver, ValueTransformation};
pub use config::{
    CleaningConfig, CleaningConfigBuilder, ConfigValidationError, MissingValueStrategy,
    OutlierAction, OutlierMethod,
};
pub use decisions::{
    AiRecommender, HeuristicRecommender, ManualOutlierRule, ManualRecommender, ManualRules,
    Recommender,
};
pub use error::{CleaningError, ResultExt};
pub use imputers::StatisticalImputer;
pub use pipeline::{
    AuditLog, CancellationToken, CleaningExecutor, CleaningResult, CleaningStage,
    ClosureProgressReporter, OutlierHandler, Pipeline, PipelineBuilder, ProgressReporter,
    ProgressUpdate,
};
pub use profiler::DataProfiler;
pub use quality::{DataQualityAnalyzer, QualitySummary};
pub use reporting::{MinimalReport, ReportDocument, ReportFormatter, ReportGenerator};
pub use types::{
    AuditEntry, AuditOperation, CleaningRecommendation, CleaningReport, ColumnKind,
    ColumnProfile, DatasetProfile, DatasetRecommendation, OutlierSummary, RecommendationSource,
};
