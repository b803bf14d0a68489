//! Progress reporting and cooperative cancellation.
//!
//! ```rust,ignore
//! use lex_cleaning::{CancellationToken, Pipeline};
//!
//! let token = CancellationToken::new();
//! let handle = token.clone();
//! std::thread::spawn(move || handle.cancel());
//!
//! let result = Pipeline::builder()
//!     .cancellation_token(token)
//!     .on_progress(|u| println!("[{:.0}%] {}", u.progress * 100.0, u.message))
//!     .build()?
//!     .clean(&df);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Phases of a cleaning run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningStage {
    Profiling,
    /// Obtaining the recommendation (manual, external or heuristic).
    Recommending,
    Deduplicating,
    /// Per-column missing values, outliers and transformations.
    ColumnCleaning,
    Reporting,
    Complete,
    Cancelled,
    Failed,
}

impl CleaningStage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Profiling => "Profiling Dataset",
            Self::Recommending => "Building Recommendation",
            Self::Deduplicating => "Removing Duplicates",
            Self::ColumnCleaning => "Cleaning Columns",
            Self::Reporting => "Building Report",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Share of the whole run; the working stages sum to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Profiling => 0.15,
            Self::Recommending => 0.20,
            Self::Deduplicating => 0.10,
            Self::ColumnCleaning => 0.50,
            Self::Reporting => 0.05,
            Self::Complete | Self::Cancelled | Self::Failed => 0.0,
        }
    }

    /// Overall progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Profiling => 0.0,
            Self::Recommending => 0.15,
            Self::Deduplicating => 0.35,
            Self::ColumnCleaning => 0.45,
            Self::Reporting => 0.95,
            Self::Complete => 1.0,
            Self::Cancelled | Self::Failed => 0.0,
        }
    }
}

/// One progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: CleaningStage,

    /// Finer position inside the stage, e.g. "Column: price".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within the stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(stage: CleaningStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let stage_progress = stage_progress.clamp(0.0, 1.0);
        Self {
            stage,
            sub_stage: None,
            progress: (stage.base_progress() + stage.weight() * stage_progress).clamp(0.0, 1.0),
            stage_progress,
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Progress through a list of items, such as columns.
    pub fn with_items(
        stage: CleaningStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let fraction = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            sub_stage: Some(sub_stage.into()),
            items_processed: Some(current),
            items_total: Some(total),
            ..Self::new(stage, fraction, message)
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(CleaningStage::Complete, 1.0, message)
    }

    pub fn cancelled() -> Self {
        Self::new(CleaningStage::Cancelled, 0.0, "Cleaning cancelled")
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(CleaningStage::Failed, 0.0, message)
    }
}

/// Receives progress events. Called synchronously from the cleaning thread,
/// so implementations should return quickly.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Shared flag for cancelling a run from another thread.
///
/// The pipeline checks it between stages and between columns and stops with
/// [`CleaningError::Cancelled`](crate::error::CleaningError::Cancelled).
/// Work already applied to the run's private copy is discarded.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can drive another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
