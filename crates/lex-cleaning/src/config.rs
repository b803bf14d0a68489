//! Configuration types for the cleaning engine.
//!
//! Holds the strategy enums shared by recommendations and rules, plus
//! [`CleaningConfig`] and its validating builder.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a strategy, method or action name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseStrategyError {
    pub kind: &'static str,
    pub value: String,
}

fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace(['-', '_', ' '], "")
}

/// How missing values in a column are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum MissingValueStrategy {
    /// Leave missing values untouched
    #[default]
    None,
    /// Drop rows where the column is missing
    Drop,
    /// Fill with the mean of non-missing values (numeric only)
    Mean,
    /// Fill with the median of non-missing values (numeric only)
    Median,
    /// Fill with the most frequent non-missing value
    Mode,
}

impl MissingValueStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Drop => "drop",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Mode => "mode",
        }
    }

    /// Strategies that only make sense on numeric columns.
    pub fn requires_numeric(&self) -> bool {
        matches!(self, Self::Mean | Self::Median)
    }
}

impl FromStr for MissingValueStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "none" | "" | "keep" => Ok(Self::None),
            "drop" => Ok(Self::Drop),
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "mode" => Ok(Self::Mode),
            _ => Err(ParseStrategyError {
                kind: "missing-value strategy",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for MissingValueStrategy {
    type Error = ParseStrategyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for MissingValueStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistical test used to flag outliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum OutlierMethod {
    #[default]
    None,
    /// |v - mean| / std > threshold
    ZScore,
    /// Outside [Q1 - t*IQR, Q3 + t*IQR]
    Iqr,
}

impl OutlierMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ZScore => "zscore",
            Self::Iqr => "iqr",
        }
    }
}

impl FromStr for OutlierMethod {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "none" | "" => Ok(Self::None),
            "zscore" | "z" => Ok(Self::ZScore),
            "iqr" => Ok(Self::Iqr),
            _ => Err(ParseStrategyError {
                kind: "outlier method",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for OutlierMethod {
    type Error = ParseStrategyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to flagged outliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum OutlierAction {
    /// Flag only
    #[default]
    None,
    /// Drop rows containing a flagged value
    Remove,
    /// Clip flagged values to the fences (IQR: detection bounds; z-score: settled fences)
    Cap,
}

impl OutlierAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Remove => "remove",
            Self::Cap => "cap",
        }
    }
}

impl FromStr for OutlierAction {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "none" | "" | "keep" | "flag" => Ok(Self::None),
            "remove" | "drop" => Ok(Self::Remove),
            "cap" | "clip" | "winsorize" => Ok(Self::Cap),
            _ => Err(ParseStrategyError {
                kind: "outlier action",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for OutlierAction {
    type Error = ParseStrategyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for OutlierAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the cleaning pipeline.
///
/// Use [`CleaningConfig::builder()`] for a validated configuration.
///
/// # Example
///
/// ```rust,ignore
/// use lex_cleaning::config::{CleaningConfig, OutlierAction, OutlierMethod};
///
/// let config = CleaningConfig::builder()
///     .zscore_threshold(2.5)
///     .default_outlier_method(OutlierMethod::ZScore)
///     .default_outlier_action(OutlierAction::Remove)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Z-score cutoff used when a recommendation carries no explicit threshold.
    /// Default: 3.0
    pub zscore_threshold: f64,

    /// IQR fence multiplier used when a recommendation carries no explicit threshold.
    /// Default: 1.5
    pub iqr_multiplier: f64,

    /// Minimum non-missing values before the profiler reports IQR outliers.
    /// Default: 11
    pub min_profile_outlier_sample: usize,

    /// Upper bound on distinct values for a column to be considered categorical.
    /// Default: 10
    pub categorical_max_unique: usize,

    /// Upper bound on distinct/rows ratio for a column to be considered categorical.
    /// Default: 0.05
    pub categorical_max_ratio: f64,

    /// Sample values kept per column profile.
    /// Default: 5
    pub sample_size: usize,

    /// Whether to ask the external recommender when a provider is configured.
    /// Default: true
    pub use_ai_recommendations: bool,

    /// Outlier method the heuristic recommender assigns.
    /// Default: Iqr
    pub default_outlier_method: OutlierMethod,

    /// Outlier action the heuristic recommender assigns.
    /// Default: Cap
    pub default_outlier_action: OutlierAction,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            zscore_threshold: 3.0,
            iqr_multiplier: 1.5,
            min_profile_outlier_sample: 11,
            categorical_max_unique: 10,
            categorical_max_ratio: 0.05,
            sample_size: 5,
            use_ai_recommendations: true,
            default_outlier_method: OutlierMethod::Iqr,
            default_outlier_action: OutlierAction::Cap,
        }
    }
}

impl CleaningConfig {
    pub fn builder() -> CleaningConfigBuilder {
        CleaningConfigBuilder::default()
    }

    /// Threshold for `method` when nothing more specific is given.
    pub fn default_threshold(&self, method: OutlierMethod) -> f64 {
        match method {
            OutlierMethod::ZScore => self.zscore_threshold,
            OutlierMethod::Iqr | OutlierMethod::None => self.iqr_multiplier,
        }
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        for (field, value) in [
            ("zscore_threshold", self.zscore_threshold),
            ("iqr_multiplier", self.iqr_multiplier),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigValidationError::InvalidThreshold {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if !(self.categorical_max_ratio > 0.0 && self.categorical_max_ratio <= 1.0) {
            return Err(ConfigValidationError::InvalidRatio {
                field: "categorical_max_ratio".to_string(),
                value: self.categorical_max_ratio,
            });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be finite and greater than 0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid ratio for '{field}': {value} (must be in (0.0, 1.0])")]
    InvalidRatio { field: String, value: f64 },
}

/// Builder for [`CleaningConfig`].
#[derive(Debug, Default)]
pub struct CleaningConfigBuilder {
    zscore_threshold: Option<f64>,
    iqr_multiplier: Option<f64>,
    min_profile_outlier_sample: Option<usize>,
    categorical_max_unique: Option<usize>,
    categorical_max_ratio: Option<f64>,
    sample_size: Option<usize>,
    use_ai_recommendations: Option<bool>,
    default_outlier_method: Option<OutlierMethod>,
    default_outlier_action: Option<OutlierAction>,
}

impl CleaningConfigBuilder {
    pub fn zscore_threshold(mut self, threshold: f64) -> Self {
        self.zscore_threshold = Some(threshold);
        self
    }

    pub fn iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = Some(multiplier);
        self
    }

    /// Minimum non-missing values before profiling reports outliers.
    pub fn min_profile_outlier_sample(mut self, n: usize) -> Self {
        self.min_profile_outlier_sample = Some(n);
        self
    }

    pub fn categorical_max_unique(mut self, n: usize) -> Self {
        self.categorical_max_unique = Some(n);
        self
    }

    pub fn categorical_max_ratio(mut self, ratio: f64) -> Self {
        self.categorical_max_ratio = Some(ratio);
        self
    }

    pub fn sample_size(mut self, n: usize) -> Self {
        self.sample_size = Some(n);
        self
    }

    /// Enable or disable the external recommender.
    ///
    /// When disabled the heuristic recommender is always used.
    pub fn use_ai_recommendations(mut self, use_ai: bool) -> Self {
        self.use_ai_recommendations = Some(use_ai);
        self
    }

    pub fn default_outlier_method(mut self, method: OutlierMethod) -> Self {
        self.default_outlier_method = Some(method);
        self
    }

    pub fn default_outlier_action(mut self, action: OutlierAction) -> Self {
        self.default_outlier_action = Some(action);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<CleaningConfig, ConfigValidationError> {
        let defaults = CleaningConfig::default();
        let config = CleaningConfig {
            zscore_threshold: self.zscore_threshold.unwrap_or(defaults.zscore_threshold),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            min_profile_outlier_sample: self
                .min_profile_outlier_sample
                .unwrap_or(defaults.min_profile_outlier_sample),
            categorical_max_unique: self
                .categorical_max_unique
                .unwrap_or(defaults.categorical_max_unique),
            categorical_max_ratio: self
                .categorical_max_ratio
                .unwrap_or(defaults.categorical_max_ratio),
            sample_size: self.sample_size.unwrap_or(defaults.sample_size),
            use_ai_recommendations: self
                .use_ai_recommendations
                .unwrap_or(defaults.use_ai_recommendations),
            default_outlier_method: self
                .default_outlier_method
                .unwrap_or(defaults.default_outlier_method),
            default_outlier_action: self
                .default_outlier_action
                .unwrap_or(defaults.default_outlier_action),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CleaningConfig::default();
        assert_eq!(config.zscore_threshold, 3.0);
        assert_eq!(config.iqr_multiplier, 1.5);
        assert_eq!(config.min_profile_outlier_sample, 11);
        assert_eq!(config.default_outlier_method, OutlierMethod::Iqr);
        assert_eq!(config.default_outlier_action, OutlierAction::Cap);
        assert!(config.use_ai_recommendations);
    }

    #[test]
    fn test_builder_custom_values() {
        let config = CleaningConfig::builder()
            .zscore_threshold(2.5)
            .iqr_multiplier(3.0)
            .use_ai_recommendations(false)
            .default_outlier_method(OutlierMethod::ZScore)
            .build()
            .unwrap();

        assert_eq!(config.zscore_threshold, 2.5);
        assert_eq!(config.iqr_multiplier, 3.0);
        assert!(!config.use_ai_recommendations);
        assert_eq!(config.default_threshold(OutlierMethod::ZScore), 2.5);
        assert_eq!(config.default_threshold(OutlierMethod::Iqr), 3.0);
    }

    #[test]
    fn test_validation_rejects_non_positive_threshold() {
        let result = CleaningConfig::builder().zscore_threshold(0.0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));

        let result = CleaningConfig::builder().iqr_multiplier(f64::NAN).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_bad_ratio() {
        let result = CleaningConfig::builder().categorical_max_ratio(1.5).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidRatio { .. }
        ));
    }

    // ------------------------------------------------------------------------
    // Strategy name parsing
    // ------------------------------------------------------------------------

    #[test]
    fn test_outlier_method_parsing_is_tolerant() {
        assert_eq!("zscore".parse::<OutlierMethod>().unwrap(), OutlierMethod::ZScore);
        assert_eq!("Z-Score".parse::<OutlierMethod>().unwrap(), OutlierMethod::ZScore);
        assert_eq!("z_score".parse::<OutlierMethod>().unwrap(), OutlierMethod::ZScore);
        assert_eq!("IQR".parse::<OutlierMethod>().unwrap(), OutlierMethod::Iqr);
        assert!("isolation_forest".parse::<OutlierMethod>().is_err());
    }

    #[test]
    fn test_strategy_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&OutlierMethod::ZScore).unwrap();
        assert_eq!(json, "\"zscore\"");

        let strategy: MissingValueStrategy = serde_json::from_str("\"Median\"").unwrap();
        assert_eq!(strategy, MissingValueStrategy::Median);

        let action: OutlierAction = serde_json::from_str("\"CAP\"").unwrap();
        assert_eq!(action, OutlierAction::Cap);

        let bad: Result<MissingValueStrategy, _> = serde_json::from_str("\"interpolate\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_config_from_partial_json() {
        let json = r#"{ "zscore_threshold": 2.0, "default_outlier_action": "remove" }"#;
        let config: CleaningConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.zscore_threshold, 2.0);
        assert_eq!(config.iqr_multiplier, 1.5);
        assert_eq!(config.default_outlier_action, OutlierAction::Remove);
        assert!(config.validate().is_ok());
    }
}
