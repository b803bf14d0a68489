//! Error types for the cleaning engine.
//!
//! Component functions work with `anyhow::Result` internally; everything that
//! crosses the public pipeline boundary is converted into [`CleaningError`].
//! Errors serialize as `{ code, message }` so callers can ship them over JSON.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the cleaning engine.
#[derive(Error, Debug)]
pub enum CleaningError {
    /// The dataset has no columns.
    #[error("Dataset is empty (no columns)")]
    EmptyDataset,

    /// A column explicitly named by the caller does not exist.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Caller input that cannot be acted on.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The external recommender could not produce a usable recommendation.
    #[error("Recommendation unavailable: {0}")]
    RecommendationUnavailable(String),

    /// Run was cancelled through its cancellation token.
    #[error("Cleaning cancelled")]
    Cancelled,

    /// Report serialization or writing failed.
    #[error("Failed to generate report: {0}")]
    ReportGenerationFailed(String),

    /// Failure inside a cleaning component.
    #[error("Failed to clean data: {0}")]
    CleaningFailed(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error with additional context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CleaningError>,
    },
}

impl CleaningError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        CleaningError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyDataset => "EMPTY_DATASET",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::RecommendationUnavailable(_) => "RECOMMENDATION_UNAVAILABLE",
            Self::Cancelled => "CANCELLED",
            Self::ReportGenerationFailed(_) => "REPORT_GENERATION_FAILED",
            Self::CleaningFailed(_) => "CLEANING_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// True for errors caused by the caller's input rather than by processing.
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::EmptyDataset | Self::ColumnNotFound(_) | Self::InvalidInput(_) => true,
            Self::WithContext { source, .. } => source.is_input_error(),
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

impl Serialize for CleaningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("CleaningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for cleaning operations.
pub type Result<T> = std::result::Result<T, CleaningError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CleaningError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for anyhow::Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CleaningError::CleaningFailed(format!("{e:#}")).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(CleaningError::EmptyDataset.error_code(), "EMPTY_DATASET");
        assert_eq!(
            CleaningError::ColumnNotFound("id".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
        assert_eq!(CleaningError::Cancelled.error_code(), "CANCELLED");
    }

    #[test]
    fn test_input_error_classification() {
        assert!(CleaningError::EmptyDataset.is_input_error());
        assert!(CleaningError::ColumnNotFound("x".into()).is_input_error());
        assert!(
            CleaningError::InvalidInput("bad".into())
                .with_context("while cleaning")
                .is_input_error()
        );
        assert!(!CleaningError::Cancelled.is_input_error());
        assert!(!CleaningError::RecommendationUnavailable("timeout".into()).is_input_error());
    }

    #[test]
    fn test_is_cancelled_through_context() {
        let err = CleaningError::Cancelled.with_context("column 'price'");
        assert!(err.is_cancelled());
        assert_eq!(err.error_code(), "CANCELLED");
    }

    #[test]
    fn test_error_serialization() {
        let error = CleaningError::ColumnNotFound("customer_id".to_string());
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["code"], "COLUMN_NOT_FOUND");
        assert!(json["message"].as_str().unwrap().contains("customer_id"));
    }

    #[test]
    fn test_anyhow_context() {
        let res: anyhow::Result<()> = Err(anyhow::anyhow!("boom"));
        let err = res.context("imputing 'age'").unwrap_err();
        assert_eq!(err.error_code(), "CLEANING_FAILED");
        assert!(err.to_string().contains("imputing 'age'"));
    }
}
