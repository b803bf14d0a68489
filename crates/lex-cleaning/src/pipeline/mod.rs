//! Cleaning orchestration.
//!
//! [`Pipeline`] drives a run: profile, recommend, execute, report.
//! [`CleaningExecutor`] applies a recommendation and keeps the audit log.

mod audit;
mod builder;
mod executor;
pub mod outliers;
pub mod progress;

pub use audit::AuditLog;
pub use builder::{CleaningResult, Pipeline, PipelineBuilder};
pub use executor::{CleaningExecutor, ExecutionLog};
pub use outliers::{OutlierBounds, OutlierHandler, OutlierOutcome};
pub use progress::{
    CancellationToken, CleaningStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
