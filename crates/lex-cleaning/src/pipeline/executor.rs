//! Applies a [`DatasetRecommendation`] to a dataset.

use crate::cleaner::{self, DuplicateResolver, ValueTransformation};
use crate::config::{CleaningConfig, MissingValueStrategy, OutlierAction, OutlierMethod};
use crate::error::{CleaningError, Result};
use crate::imputers::StatisticalImputer;
use crate::pipeline::audit::AuditLog;
use crate::pipeline::outliers::OutlierHandler;
use crate::pipeline::progress::{CancellationToken, CleaningStage, ProgressReporter, ProgressUpdate};
use crate::types::{
    AuditEntry, AuditOperation, CleaningRecommendation, DatasetRecommendation, OutlierSummary,
};
use crate::utils::json_number;
use indexmap::IndexMap;
use polars::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the executor did, besides the cleaned data.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    pub audit: AuditLog,
    pub duplicates_removed: usize,
    /// Key used for deduplication; empty when it did not run.
    pub duplicate_key: Vec<String>,
    pub missing_values_handled: IndexMap<String, MissingValueStrategy>,
    pub outliers_handled: IndexMap<String, OutlierSummary>,
}

/// Executes cleaning steps in a fixed order:
/// duplicate removal first, then per column (in recommendation order)
/// missing values, outliers and value transformations.
///
/// The input frame is never modified. A failing column is recorded as
/// skipped and the run continues; only input errors and cancellation
/// abort.
pub struct CleaningExecutor {
    config: CleaningConfig,
    cancellation_token: CancellationToken,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl CleaningExecutor {
    pub fn new(config: CleaningConfig) -> Self {
        Self {
            config,
            cancellation_token: CancellationToken::new(),
            progress_reporter: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn with_progress(mut self, reporter: Option<Arc<dyn ProgressReporter>>) -> Self {
        self.progress_reporter = reporter;
        self
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(CleaningError::Cancelled);
        }
        Ok(())
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    pub fn execute(
        &self,
        df: &DataFrame,
        recommendation: &DatasetRecommendation,
    ) -> Result<(DataFrame, ExecutionLog)> {
        if df.width() == 0 {
            return Err(CleaningError::EmptyDataset);
        }

        let mut data = df.clone();
        let mut log = ExecutionLog::default();

        self.check_cancelled()?;
        if recommendation.duplicate_removal {
            self.report_progress(ProgressUpdate::new(
                CleaningStage::Deduplicating,
                0.0,
                "Removing duplicate rows...",
            ));
            data = self.remove_duplicates(data, recommendation.duplicate_key.as_deref(), &mut log)?;
        }

        let total = recommendation.column_recommendations.len();
        for (i, rec) in recommendation.column_recommendations.iter().enumerate() {
            self.check_cancelled()?;
            self.report_progress(ProgressUpdate::with_items(
                CleaningStage::ColumnCleaning,
                format!("Column: {}", rec.column_name),
                i,
                total,
                format!("Cleaning column '{}'", rec.column_name),
            ));

            let column = rec.column_name.as_str();
            if data.column(column).is_err() {
                warn!("Skipping recommendation for unknown column '{}'", column);
                log.audit.record(
                    AuditEntry::new(AuditOperation::ColumnSkipped, Some(column), 0)
                        .with_detail("status", "skipped")
                        .with_detail("reason", "column not found in dataset"),
                );
                continue;
            }

            if let Err(e) = self.clean_column(&mut data, rec, &mut log) {
                warn!("Cleaning column '{}' failed: {:#}", column, e);
                log.audit.record(
                    AuditEntry::new(AuditOperation::ColumnSkipped, Some(column), 0)
                        .with_detail("status", "failed")
                        .with_detail("reason", format!("{e:#}")),
                );
            }
        }
        self.check_cancelled()?;

        info!(
            "Executed {} audit step(s): {} -> {} rows",
            log.audit.len(),
            df.height(),
            data.height()
        );
        Ok((data, log))
    }

    fn remove_duplicates(
        &self,
        data: DataFrame,
        key: Option<&[String]>,
        log: &mut ExecutionLog,
    ) -> Result<DataFrame> {
        let explicit = key.is_some_and(|k| !k.is_empty());
        let outcome = DuplicateResolver::remove_duplicates(&data, key)?;

        log.audit.record(
            AuditEntry::new(AuditOperation::DuplicatesRemoved, None, outcome.removed)
                .with_detail("key", outcome.key.clone())
                .with_detail("key_source", if explicit { "explicit" } else { "selected" }),
        );
        log.duplicates_removed = outcome.removed;
        log.duplicate_key = outcome.key;
        Ok(outcome.data)
    }

    /// Missing values, outliers, then transformations for one column.
    fn clean_column(
        &self,
        data: &mut DataFrame,
        rec: &CleaningRecommendation,
        log: &mut ExecutionLog,
    ) -> anyhow::Result<()> {
        let column = rec.column_name.as_str();

        let strategy = rec.missing_values.method;
        if strategy != MissingValueStrategy::None {
            let outcome = StatisticalImputer::resolve(data, column, strategy)?;
            if !outcome.applicable {
                log.audit.record(skipped(
                    column,
                    "missing_values",
                    format!("{strategy} requires a numeric column"),
                ));
            } else {
                let operation = if strategy == MissingValueStrategy::Drop {
                    AuditOperation::MissingRowsDropped
                } else {
                    AuditOperation::MissingValuesImputed
                };
                let mut entry = AuditEntry::new(operation, Some(column), outcome.affected)
                    .with_detail("strategy", strategy.as_str());
                if let Some(value) = outcome.fill_value {
                    entry = entry.with_detail("fill_value", value);
                }
                log.audit.record(entry);
                log.missing_values_handled.insert(column.to_string(), strategy);
                *data = outcome.data;
                debug!("'{}': {} missing value(s) handled with {}", column, outcome.affected, strategy);
            }
        }

        let method = rec.outliers.method;
        if method != OutlierMethod::None {
            let threshold = self.threshold_for(column, method, rec.outliers.threshold);
            let action = rec.outliers.action;
            let outcome = OutlierHandler::apply(data, column, method, action, threshold)?;

            if !outcome.applicable {
                log.audit.record(skipped(
                    column,
                    "outliers",
                    format!("{method} outlier detection requires a numeric column"),
                ));
            } else {
                let operation = match action {
                    OutlierAction::None => AuditOperation::OutliersFlagged,
                    OutlierAction::Remove => AuditOperation::OutliersRemoved,
                    OutlierAction::Cap => AuditOperation::OutliersCapped,
                };
                let mut entry = AuditEntry::new(operation, Some(column), outcome.changed)
                    .with_detail("method", method.as_str())
                    .with_detail("action", action.as_str())
                    .with_detail("threshold", json_number(threshold))
                    .with_detail("flagged", outcome.flagged);
                if let Some(bounds) = &outcome.bounds {
                    entry = entry
                        .with_detail("lower_bound", json_number(bounds.lower()))
                        .with_detail("upper_bound", json_number(bounds.upper()));
                }
                if let Some(fences) = outcome.cap_bounds.filter(|f| Some(*f) != outcome.bounds) {
                    entry = entry
                        .with_detail("cap_lower", json_number(fences.lower()))
                        .with_detail("cap_upper", json_number(fences.upper()));
                }
                log.audit.record(entry);
                log.outliers_handled.insert(
                    column.to_string(),
                    OutlierSummary {
                        method,
                        action,
                        count: outcome.flagged,
                    },
                );
                *data = outcome.data;
            }
        }

        for directive in &rec.value_transformations {
            let Some(transformation) = ValueTransformation::parse(directive) else {
                log.audit.record(
                    skipped(column, "value_transformation", "unrecognized directive")
                        .with_detail("directive", directive.as_str()),
                );
                continue;
            };

            let outcome = cleaner::transforms::apply(data, column, transformation)?;
            if !outcome.applicable {
                log.audit.record(
                    skipped(
                        column,
                        "value_transformation",
                        format!("'{transformation}' does not fit the column type"),
                    )
                    .with_detail("directive", directive.as_str()),
                );
                continue;
            }
            log.audit.record(
                AuditEntry::new(AuditOperation::ValuesTransformed, Some(column), outcome.changed)
                    .with_detail("transformation", transformation.to_string())
                    .with_detail("directive", directive.as_str()),
            );
            // dtype may change (to integer) even when no value does
            *data = outcome.data;
        }

        Ok(())
    }

    /// Recommendation override when usable, else the configured default.
    fn threshold_for(&self, column: &str, method: OutlierMethod, requested: Option<f64>) -> f64 {
        match requested {
            Some(t) if t.is_finite() && t > 0.0 => t,
            Some(t) => {
                warn!("Ignoring invalid {} threshold {} for '{}'", method, t, column);
                self.config.default_threshold(method)
            }
            None => self.config.default_threshold(method),
        }
    }
}

fn skipped(column: &str, step: &str, reason: impl Into<String>) -> AuditEntry {
    AuditEntry::new(AuditOperation::ColumnSkipped, Some(column), 0)
        .with_detail("step", step)
        .with_detail("status", "skipped")
        .with_detail("reason", reason.into())
}
