use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::config::{MissingValueStrategy, OutlierAction, OutlierMethod};

// ============================================================================
// Profiling Types
// ============================================================================

/// Coarse classification of a column's dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Integer and floating point columns.
    Numeric,
    /// String, categorical and boolean columns.
    Categorical,
    /// Temporal, nested and anything else.
    Other,
}

impl ColumnKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (ddof = 1); 0.0 for fewer than two values.
    pub std: f64,
}

/// Informational IQR outlier count taken while profiling.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutlierProfile {
    pub count: usize,
    /// Percentage of all rows (0-100).
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueFrequency {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: String,
    pub kind: ColumnKind,
    pub missing_count: usize,
    pub missing_percent: f64,
    /// Distinct non-missing values.
    pub unique_count: usize,
    pub sample_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outliers: Option<OutlierProfile>,
    pub likely_categorical: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_frequent: Option<ValueFrequency>,
    /// Frequency table, only populated for likely-categorical columns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frequencies: Vec<ValueFrequency>,
}

impl ColumnProfile {
    pub fn has_missing(&self) -> bool {
        self.missing_count > 0
    }

    pub fn outlier_count(&self) -> usize {
        self.outliers.as_ref().map_or(0, |o| o.count)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub rows: usize,
    pub columns: usize,
    pub column_profiles: Vec<ColumnProfile>,
    pub total_missing: usize,
    /// Exact duplicate rows (every column compared).
    pub duplicate_rows: usize,
}

impl DatasetProfile {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.column_profiles.iter().find(|p| p.name == name)
    }
}

// ============================================================================
// Recommendation Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MissingValueRecommendation {
    #[serde(default)]
    pub method: MissingValueStrategy,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutlierRecommendation {
    #[serde(default)]
    pub method: OutlierMethod,
    #[serde(default)]
    pub action: OutlierAction,
    /// Overrides the configured threshold for the chosen method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub reason: String,
}

fn default_importance() -> u8 {
    5
}

/// Accepts any JSON number and clamps it into 1..=10.
fn deserialize_importance<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(clamp_importance(raw))
}

pub fn clamp_importance(raw: f64) -> u8 {
    if raw.is_nan() {
        return default_importance();
    }
    raw.round().clamp(1.0, 10.0) as u8
}

/// Cleaning plan for a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningRecommendation {
    pub column_name: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub missing_values: MissingValueRecommendation,
    #[serde(default)]
    pub outliers: OutlierRecommendation,
    /// Free-form directives such as "round to 2 decimals", applied in order.
    #[serde(default)]
    pub value_transformations: Vec<String>,
    #[serde(
        default = "default_importance",
        deserialize_with = "deserialize_importance"
    )]
    pub column_importance: u8,
    #[serde(default)]
    pub reasoning: String,
}

impl CleaningRecommendation {
    /// A recommendation that leaves the column untouched.
    pub fn new(column_name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            data_type: data_type.into(),
            missing_values: MissingValueRecommendation::default(),
            outliers: OutlierRecommendation::default(),
            value_transformations: Vec::new(),
            column_importance: default_importance(),
            reasoning: String::new(),
        }
    }

    pub fn with_missing(mut self, method: MissingValueStrategy, reason: impl Into<String>) -> Self {
        self.missing_values = MissingValueRecommendation {
            method,
            reason: reason.into(),
        };
        self
    }

    pub fn with_outliers(
        mut self,
        method: OutlierMethod,
        action: OutlierAction,
        reason: impl Into<String>,
    ) -> Self {
        self.outliers = OutlierRecommendation {
            method,
            action,
            threshold: None,
            reason: reason.into(),
        };
        self
    }

    pub fn with_transformation(mut self, directive: impl Into<String>) -> Self {
        self.value_transformations.push(directive.into());
        self
    }
}

/// Complete cleaning plan for a dataset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatasetRecommendation {
    #[serde(default)]
    pub duplicate_removal: bool,
    /// Explicit identity columns; `None` lets the resolver pick a key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_key: Option<Vec<String>>,
    #[serde(default)]
    pub column_recommendations: Vec<CleaningRecommendation>,
    #[serde(default)]
    pub overall_advice: String,
}

impl DatasetRecommendation {
    pub fn column(&self, name: &str) -> Option<&CleaningRecommendation> {
        self.column_recommendations
            .iter()
            .find(|r| r.column_name == name)
    }
}

/// Where the recommendation used for a run came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecommendationSource {
    /// Supplied by the caller.
    Manual,
    /// Produced by an external recommender.
    External { provider: String },
    /// Built-in heuristics, chosen up front.
    Heuristic,
    /// Built-in heuristics after the external recommender failed.
    Fallback { reason: String },
}

impl RecommendationSource {
    pub fn display_name(&self) -> String {
        match self {
            Self::Manual => "manual rules".to_string(),
            Self::External { provider } => format!("external recommender ({provider})"),
            Self::Heuristic => "built-in heuristics".to_string(),
            Self::Fallback { .. } => "built-in heuristics (fallback)".to_string(),
        }
    }
}

// ============================================================================
// Audit Types
// ============================================================================

/// Kind of change recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    DuplicatesRemoved,
    MissingRowsDropped,
    MissingValuesImputed,
    OutliersRemoved,
    OutliersCapped,
    /// Detected but left in place.
    OutliersFlagged,
    ValuesTransformed,
    /// Column-level step that did nothing (wrong kind, unknown directive, failure).
    ColumnSkipped,
}

impl AuditOperation {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::DuplicatesRemoved => "Duplicates Removed",
            Self::MissingRowsDropped => "Missing Rows Dropped",
            Self::MissingValuesImputed => "Missing Values Imputed",
            Self::OutliersRemoved => "Outliers Removed",
            Self::OutliersCapped => "Outliers Capped",
            Self::OutliersFlagged => "Outliers Flagged",
            Self::ValuesTransformed => "Values Transformed",
            Self::ColumnSkipped => "Column Skipped",
        }
    }

    /// Operations whose `rows_affected` counts removed rows.
    pub fn removes_rows(&self) -> bool {
        matches!(
            self,
            Self::DuplicatesRemoved | Self::MissingRowsDropped | Self::OutliersRemoved
        )
    }
}

/// One immutable record of a cleaning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// RFC 3339 timestamp.
    pub timestamp: String,
    pub operation: AuditOperation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub details: BTreeMap<String, serde_json::Value>,
    /// Rows removed, or cells changed for in-place operations.
    pub rows_affected: usize,
}

impl AuditEntry {
    pub fn new(operation: AuditOperation, column: Option<&str>, rows_affected: usize) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            operation,
            column: column.map(str::to_string),
            details: BTreeMap::new(),
            rows_affected,
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(|v| v.as_str())
    }
}

// ============================================================================
// Report Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierSummary {
    pub method: OutlierMethod,
    pub action: OutlierAction,
    pub count: usize,
}

/// Structured summary of one cleaning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningReport {
    pub original_rows: usize,
    pub original_columns: usize,
    pub final_rows: usize,
    pub final_columns: usize,
    pub missing_values_before: IndexMap<String, usize>,
    pub missing_values_after: IndexMap<String, usize>,
    pub duplicates_removed: usize,
    /// Identity columns used for deduplication; empty if it did not run.
    pub duplicate_key: Vec<String>,
    /// Strategy per column, in the order they were applied.
    pub missing_values_handled: IndexMap<String, MissingValueStrategy>,
    pub outliers_handled: IndexMap<String, OutlierSummary>,
    pub recommendation: DatasetRecommendation,
    pub recommendation_source: RecommendationSource,
    pub audit_log: Vec<AuditEntry>,
    pub duration_ms: u64,
}

impl CleaningReport {
    pub fn rows_removed(&self) -> usize {
        self.original_rows.saturating_sub(self.final_rows)
    }

    pub fn total_missing_before(&self) -> usize {
        self.missing_values_before.values().sum()
    }

    pub fn total_missing_after(&self) -> usize {
        self.missing_values_after.values().sum()
    }

    /// True when the run changed nothing.
    pub fn is_noop(&self) -> bool {
        self.audit_log.iter().all(|e| e.rows_affected == 0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendation_from_llm_json() {
        let json = r#"{
            "column_name": "price",
            "data_type": "float",
            "missing_values": { "method": "Median", "reason": "skewed" },
            "outliers": { "method": "z-score", "action": "cap", "reason": "long tail" },
            "value_transformations": ["round to 2 decimals"],
            "column_importance": 14.2,
            "reasoning": "monetary amount"
        }"#;

        let rec: CleaningRecommendation = serde_json::from_str(json).unwrap();
        assert_eq!(rec.missing_values.method, MissingValueStrategy::Median);
        assert_eq!(rec.outliers.method, OutlierMethod::ZScore);
        assert_eq!(rec.outliers.action, OutlierAction::Cap);
        assert_eq!(rec.column_importance, 10);
        assert_eq!(rec.value_transformations.len(), 1);
    }

    #[test]
    fn test_recommendation_defaults_when_fields_missing() {
        let rec: CleaningRecommendation =
            serde_json::from_str(r#"{ "column_name": "notes" }"#).unwrap();
        assert_eq!(rec.missing_values.method, MissingValueStrategy::None);
        assert_eq!(rec.outliers.method, OutlierMethod::None);
        assert_eq!(rec.column_importance, 5);
    }

    #[test]
    fn test_clamp_importance() {
        assert_eq!(clamp_importance(0.0), 1);
        assert_eq!(clamp_importance(-3.0), 1);
        assert_eq!(clamp_importance(7.4), 7);
        assert_eq!(clamp_importance(f64::NAN), 5);
    }

    #[test]
    fn test_recommendation_source_serialization() {
        let source = RecommendationSource::External {
            provider: "openrouter".to_string(),
        };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["kind"], "external");
        assert_eq!(json["provider"], "openrouter");

        let json = serde_json::to_value(RecommendationSource::Heuristic).unwrap();
        assert_eq!(json["kind"], "heuristic");
    }

    #[test]
    fn test_audit_entry_details_and_timestamp() {
        let entry = AuditEntry::new(AuditOperation::MissingValuesImputed, Some("age"), 3)
            .with_detail("strategy", "median")
            .with_detail("fill_value", 31.5);

        assert_eq!(entry.column.as_deref(), Some("age"));
        assert_eq!(entry.detail_str("strategy"), Some("median"));
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
    }

    #[test]
    fn test_audit_operations_serialize_snake_case() {
        let pairs = [
            (AuditOperation::DuplicatesRemoved, "\"duplicates_removed\""),
            (AuditOperation::MissingRowsDropped, "\"missing_rows_dropped\""),
            (AuditOperation::OutliersCapped, "\"outliers_capped\""),
            (AuditOperation::ColumnSkipped, "\"column_skipped\""),
        ];
        for (op, expected) in pairs {
            assert_eq!(serde_json::to_string(&op).unwrap(), expected);
        }
        assert!(AuditOperation::OutliersRemoved.removes_rows());
        assert!(!AuditOperation::OutliersCapped.removes_rows());
    }
}
