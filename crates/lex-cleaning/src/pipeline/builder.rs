//! The cleaning pipeline and its builder.

use crate::ai::AIProvider;
use crate::config::{CleaningConfig, ConfigValidationError};
use crate::decisions::{
    AiRecommender, HeuristicRecommender, ManualRecommender, ManualRules, Recommender,
};
use crate::error::{CleaningError, Result, ResultExt};
use crate::pipeline::executor::CleaningExecutor;
use crate::pipeline::progress::{
    CancellationToken, CleaningStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
use crate::profiler::DataProfiler;
use crate::types::{CleaningReport, DatasetProfile, DatasetRecommendation, RecommendationSource};
use crate::utils::missing_count;
use indexmap::IndexMap;
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Where a run's recommendation comes from.
enum Plan<'a> {
    /// External provider when available, heuristics otherwise.
    Automatic,
    Supplied(DatasetRecommendation),
    Recommender(&'a dyn Recommender),
}

/// Cleaned data plus the report describing how it was produced.
#[derive(Debug, Clone)]
pub struct CleaningResult {
    pub data: DataFrame,
    pub report: CleaningReport,
}

/// The cleaning pipeline.
///
/// ```rust,ignore
/// use lex_cleaning::{Pipeline, CleaningConfig};
/// use lex_cleaning::ai::OpenRouterProvider;
/// use std::sync::Arc;
///
/// // External recommendations with heuristic fallback
/// let provider = Arc::new(OpenRouterProvider::new(api_key)?);
/// let result = Pipeline::builder()
///     .ai_provider(provider)
///     .on_progress(|u| println!("[{:.0}%] {}", u.progress * 100.0, u.message))
///     .build()?
///     .clean(&df)?;
///
/// // Heuristics only
/// let result = Pipeline::builder()
///     .config(CleaningConfig::builder().use_ai_recommendations(false).build()?)
///     .build()?
///     .clean(&df)?;
/// ```
pub struct Pipeline {
    config: CleaningConfig,
    ai_provider: Option<Arc<dyn AIProvider>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
    profiler: DataProfiler,
}

static_assertions::assert_impl_all!(Pipeline: Send);

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &CleaningConfig {
        &self.config
    }

    /// Profile, obtain a recommendation, and apply it.
    ///
    /// The external recommender is used when a provider is configured and
    /// `use_ai_recommendations` is on; if it fails the built-in heuristics
    /// take over and the report's source says so.
    ///
    /// # Errors
    ///
    /// Input errors (empty dataset, unknown explicit duplicate key column)
    /// and [`CleaningError::Cancelled`].
    pub fn clean(&self, df: &DataFrame) -> Result<CleaningResult> {
        self.finish(self.clean_internal(df, Plan::Automatic))
    }

    /// Apply a caller-supplied recommendation.
    pub fn clean_with(
        &self,
        df: &DataFrame,
        recommendation: DatasetRecommendation,
    ) -> Result<CleaningResult> {
        self.finish(self.clean_internal(df, Plan::Supplied(recommendation)))
    }

    /// Profile, then apply whatever `recommender` proposes.
    ///
    /// The report's source is `manual`; a failing recommender fails the run
    /// instead of falling back to heuristics.
    pub fn clean_with_recommender(
        &self,
        df: &DataFrame,
        recommender: &dyn Recommender,
    ) -> Result<CleaningResult> {
        self.finish(self.clean_internal(df, Plan::Recommender(recommender)))
    }

    /// Apply fixed per-column rules.
    pub fn clean_with_rules(&self, df: &DataFrame, rules: ManualRules) -> Result<CleaningResult> {
        self.clean_with_recommender(df, &ManualRecommender::new(rules))
    }

    pub fn profile(&self, df: &DataFrame) -> Result<DatasetProfile> {
        if df.width() == 0 {
            return Err(CleaningError::EmptyDataset);
        }
        self.profiler
            .profile_dataset(df)
            .context("Failed to profile dataset")
    }

    /// Recommendation the pipeline would apply, without applying it.
    pub fn recommend(
        &self,
        df: &DataFrame,
        profile: &DatasetProfile,
    ) -> Result<(DatasetRecommendation, RecommendationSource)> {
        let heuristic = HeuristicRecommender::new(self.config.clone());

        let provider = self
            .ai_provider
            .as_ref()
            .filter(|_| self.config.use_ai_recommendations);
        let Some(provider) = provider else {
            debug!("Using built-in heuristics");
            let rec = heuristic
                .recommend(df, profile)
                .context("Heuristic recommendation failed")?;
            return Ok((rec, RecommendationSource::Heuristic));
        };

        let external = AiRecommender::new(Arc::clone(provider));
        match external.recommend(df, profile) {
            Ok(rec) => Ok((
                rec,
                RecommendationSource::External {
                    provider: provider.name().to_string(),
                },
            )),
            Err(e) => {
                let reason = format!("{e:#}");
                warn!("External recommendation unavailable, using heuristics: {}", reason);
                let rec = heuristic
                    .recommend(df, profile)
                    .context("Heuristic recommendation failed")?;
                Ok((rec, RecommendationSource::Fallback { reason }))
            }
        }
    }

    fn profile_for_recommendation(&self, df: &DataFrame) -> Result<DatasetProfile> {
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Profiling,
            0.0,
            "Profiling dataset...",
        ));
        let profile = self.profile(df)?;
        self.check_cancelled()?;

        self.report_progress(ProgressUpdate::new(
            CleaningStage::Recommending,
            0.0,
            "Building cleaning recommendation...",
        ));
        Ok(profile)
    }

    fn finish(&self, outcome: Result<CleaningResult>) -> Result<CleaningResult> {
        match outcome {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Cleaning completed"));
                Ok(result)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                error!("Cleaning failed: {}", e);
                Err(e)
            }
        }
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

    fn clean_internal(&self, df: &DataFrame, plan: Plan<'_>) -> Result<CleaningResult> {
        let start = Instant::now();
        if df.width() == 0 {
            return Err(CleaningError::EmptyDataset);
        }
        info!("Cleaning dataset: {} rows x {} columns", df.height(), df.width());
        self.check_cancelled()?;

        let (recommendation, source) = match plan {
            Plan::Supplied(rec) => (rec, RecommendationSource::Manual),
            Plan::Automatic => {
                let profile = self.profile_for_recommendation(df)?;
                self.recommend(df, &profile)?
            }
            Plan::Recommender(recommender) => {
                let profile = self.profile_for_recommendation(df)?;
                debug!("Using the '{}' recommender", recommender.name());
                let rec = recommender
                    .recommend(df, &profile)
                    .context("Recommendation failed")?;
                (rec, RecommendationSource::Manual)
            }
        };
        info!("Recommendation source: {}", source.display_name());
        self.check_cancelled()?;

        let executor = CleaningExecutor::new(self.config.clone())
            .with_cancellation(self.cancellation_token.clone())
            .with_progress(self.progress_reporter.clone());
        let (data, log) = executor.execute(df, &recommendation)?;

        self.report_progress(ProgressUpdate::new(
            CleaningStage::Reporting,
            0.0,
            "Building report...",
        ));
        let report = CleaningReport {
            original_rows: df.height(),
            original_columns: df.width(),
            final_rows: data.height(),
            final_columns: data.width(),
            missing_values_before: missing_per_column(df)?,
            missing_values_after: missing_per_column(&data)?,
            duplicates_removed: log.duplicates_removed,
            duplicate_key: log.duplicate_key,
            missing_values_handled: log.missing_values_handled,
            outliers_handled: log.outliers_handled,
            recommendation,
            recommendation_source: source,
            audit_log: log.audit.into_entries(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Cleaning finished in {} ms: {} -> {} rows, {} -> {} missing",
            report.duration_ms,
            report.original_rows,
            report.final_rows,
            report.total_missing_before(),
            report.total_missing_after()
        );
        Ok(CleaningResult { data, report })
    }
}

fn missing_per_column(df: &DataFrame) -> Result<IndexMap<String, usize>> {
    df.get_columns()
        .iter()
        .map(|col| -> Result<(String, usize)> {
            let count = missing_count(col.as_materialized_series())?;
            Ok((col.name().to_string(), count))
        })
        .collect()
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<CleaningConfig>,
    ai_provider: Option<Arc<dyn AIProvider>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

impl PipelineBuilder {
    pub fn config(mut self, config: CleaningConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Provider for external recommendations.
    ///
    /// Without one, or with `use_ai_recommendations` off, the pipeline uses
    /// the built-in heuristics.
    pub fn ai_provider(mut self, provider: Arc<dyn AIProvider>) -> Self {
        self.ai_provider = Some(provider);
        self
    }

    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Closure shorthand for [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the pipeline, validating the configuration.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            profiler: DataProfiler::new(&config),
            config,
            ai_provider: self.ai_provider,
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
        })
    }
}
