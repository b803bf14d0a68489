//! JSON reports and cleaned-dataset files.
//!
//! [`ReportGenerator::to_json`] degrades from the full report to a minimal
//! one when a field cannot be serialized, and non-finite numbers become null.

use anyhow::Result;
use chrono::Local;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::ReportFormatter;
use crate::quality::QualitySummary;
use crate::types::{AuditEntry, CleaningReport};

/// Smallest report that is still useful; written when the full one cannot be.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinimalReport {
    pub original_rows: usize,
    pub final_rows: usize,
    pub duplicates_removed: usize,
    pub human_readable: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub audit_log: Vec<AuditEntry>,
}

impl From<&CleaningReport> for MinimalReport {
    fn from(report: &CleaningReport) -> Self {
        Self {
            original_rows: report.original_rows,
            final_rows: report.final_rows,
            duplicates_removed: report.duplicates_removed,
            human_readable: ReportFormatter::render(report),
            audit_log: report.audit_log.clone(),
        }
    }
}

/// Report file contents: run metadata around the serialized report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    pub generated_at: String,
    pub input_file: Option<String>,
    pub output_file: Option<String>,
    pub human_readable: String,
    pub report: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualitySummary>,
}

/// Writes cleaned datasets and JSON reports into one output directory.
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./outputs"),
        }
    }
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Serialize a report to a JSON value.
    ///
    /// Falls back to a sanitized copy, then to [`MinimalReport`]; this never fails.
    pub fn to_json(report: &CleaningReport) -> Value {
        match serde_json::to_value(report) {
            Ok(value) => return sanitize(value),
            Err(e) => warn!("Report serialization failed, retrying field by field: {}", e),
        }

        match sanitized_fields(report) {
            Ok(value) => return value,
            Err(e) => warn!("Sanitized report failed, writing minimal report: {}", e),
        }

        let minimal = MinimalReport::from(report);
        serde_json::to_value(&minimal).unwrap_or_else(|_| {
            serde_json::json!({
                "original_rows": minimal.original_rows,
                "final_rows": minimal.final_rows,
                "duplicates_removed": minimal.duplicates_removed,
                "human_readable": minimal.human_readable,
            })
        })
    }

    pub fn build_document(
        report: &CleaningReport,
        input_file: Option<&str>,
        output_file: Option<&str>,
        quality: Option<QualitySummary>,
    ) -> ReportDocument {
        ReportDocument {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input_file: input_file.map(str::to_string),
            output_file: output_file.map(str::to_string),
            human_readable: ReportFormatter::render(report),
            report: Self::to_json(report),
            quality,
        }
    }

    /// Write `<base>_report.json` into the output directory.
    pub fn write_report_to_file(
        &self,
        document: &ReportDocument,
        report_base_name: &str,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;

        let report_path = self
            .output_dir
            .join(format!("{}_report.json", report_base_name));
        let mut file = File::create(&report_path)?;
        file.write_all(serde_json::to_string_pretty(document)?.as_bytes())?;

        info!("Report saved: {}", report_path.display());
        Ok(report_path)
    }

    /// Write the cleaned dataset as `<file_name>.csv`.
    pub fn write_dataset(&self, df: &mut DataFrame, file_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let output_path = self.output_dir.join(format!("{}.csv", file_name));
        let mut file = File::create(&output_path)?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .with_quote_char(b'"')
            .finish(df)?;

        info!("Dataset saved: {}", output_path.display());
        Ok(output_path)
    }
}

/// Non-finite floats become null.
fn sanitize(value: Value) -> Value {
    match value {
        Value::Number(n) if n.as_f64().is_some_and(|f| !f.is_finite()) => Value::Null,
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, sanitize(v))).collect()),
        other => other,
    }
}

/// Serializes each field on its own; a field that fails becomes null.
fn sanitized_fields(report: &CleaningReport) -> Result<Value> {
    fn field<T: Serialize>(value: &T) -> Value {
        serde_json::to_value(value).map(sanitize).unwrap_or(Value::Null)
    }

    let mut map = serde_json::Map::new();
    map.insert("original_rows".into(), report.original_rows.into());
    map.insert("original_columns".into(), report.original_columns.into());
    map.insert("final_rows".into(), report.final_rows.into());
    map.insert("final_columns".into(), report.final_columns.into());
    map.insert("missing_values_before".into(), field(&report.missing_values_before));
    map.insert("missing_values_after".into(), field(&report.missing_values_after));
    map.insert("duplicates_removed".into(), report.duplicates_removed.into());
    map.insert("duplicate_key".into(), field(&report.duplicate_key));
    map.insert("missing_values_handled".into(), field(&report.missing_values_handled));
    map.insert("outliers_handled".into(), field(&report.outliers_handled));
    map.insert("recommendation".into(), field(&report.recommendation));
    map.insert("recommendation_source".into(), field(&report.recommendation_source));
    map.insert("audit_log".into(), field(&report.audit_log));
    map.insert("duration_ms".into(), report.duration_ms.into());

    if map.values().all(Value::is_null) {
        anyhow::bail!("no report field could be serialized");
    }
    Ok(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MissingValueStrategy;
    use crate::types::{AuditOperation, DatasetRecommendation, RecommendationSource};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn report() -> CleaningReport {
        CleaningReport {
            original_rows: 4,
            original_columns: 1,
            final_rows: 3,
            final_columns: 1,
            missing_values_before: IndexMap::from([("price".to_string(), 1)]),
            missing_values_after: IndexMap::from([("price".to_string(), 0)]),
            duplicates_removed: 1,
            duplicate_key: vec!["price".to_string()],
            missing_values_handled: IndexMap::from([(
                "price".to_string(),
                MissingValueStrategy::Median,
            )]),
            outliers_handled: IndexMap::new(),
            recommendation: DatasetRecommendation::default(),
            recommendation_source: RecommendationSource::Manual,
            audit_log: vec![AuditEntry::new(
                AuditOperation::DuplicatesRemoved,
                None,
                1,
            )],
            duration_ms: 2,
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lex-cleaning-{}-{}", name, std::process::id()))
    }

    #[test]
    fn test_to_json_full_report() {
        let value = ReportGenerator::to_json(&report());

        assert_eq!(value["original_rows"], 4);
        assert_eq!(value["duplicates_removed"], 1);
        assert_eq!(value["missing_values_handled"]["price"], "median");
        assert_eq!(value["audit_log"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_sanitize_nested_values() {
        let value = serde_json::json!({"a": [1.5, {"b": 2}], "c": "x"});
        assert_eq!(sanitize(value.clone()), value);
    }

    #[test]
    fn test_sanitized_fields_matches_full() {
        let report = report();
        let full = ReportGenerator::to_json(&report);
        let by_field = sanitized_fields(&report).unwrap();
        assert_eq!(full, by_field);
    }

    #[test]
    fn test_minimal_report_from() {
        let minimal = MinimalReport::from(&report());
        assert_eq!(minimal.original_rows, 4);
        assert_eq!(minimal.final_rows, 3);
        assert!(minimal.human_readable.contains("Removed 1 duplicate rows"));

        let value = serde_json::to_value(&minimal).unwrap();
        assert_eq!(value["audit_log"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_write_report_and_dataset() {
        let dir = temp_dir("generator");
        let generator = ReportGenerator::new(&dir);

        let document = ReportGenerator::build_document(&report(), Some("in.csv"), None, None);
        let path = generator.write_report_to_file(&document, "in").unwrap();
        assert!(path.ends_with("in_report.json"));

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["input_file"], "in.csv");
        assert_eq!(written["report"]["final_rows"], 3);
        assert!(written.get("quality").is_none());

        let mut df = df!["price" => [1.0, 2.0, 3.0]].unwrap();
        let csv = generator.write_dataset(&mut df, "cleaned_in").unwrap();
        let contents = fs::read_to_string(&csv).unwrap();
        assert!(contents.starts_with("price\n"));

        fs::remove_dir_all(&dir).ok();
    }
}
