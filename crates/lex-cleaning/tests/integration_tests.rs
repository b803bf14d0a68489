//! Integration tests for the cleaning pipeline.
//!
//! These tests run the public API end to end over the CSV fixtures.

use lex_cleaning::ai::AIProvider;
use lex_cleaning::utils::{column_series, missing_count, missing_mask, numeric_values, string_values};
use lex_cleaning::{
    AuditOperation, CancellationToken, CleaningConfig, CleaningError, CleaningStage,
    DuplicateResolver, ManualRules, MissingValueStrategy, OutlierAction, OutlierHandler,
    OutlierMethod, Pipeline, ProgressUpdate, RecommendationSource, ReportFormatter,
    ReportGenerator, StatisticalImputer,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_csv(filename: &str) -> DataFrame {
    let path = fixtures_path().join(filename);
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path))
        .expect("Failed to create CSV reader")
        .finish()
        .expect("Failed to read CSV file")
}

fn load_rules(filename: &str) -> ManualRules {
    let content = std::fs::read_to_string(fixtures_path().join(filename))
        .expect("Failed to read rules file");
    serde_json::from_str(&content).expect("Failed to parse rules")
}

fn heuristic_pipeline() -> Pipeline {
    Pipeline::builder()
        .config(
            CleaningConfig::builder()
                .use_ai_recommendations(false)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

fn floats(df: &DataFrame, column: &str) -> Vec<Option<f64>> {
    numeric_values(column_series(df, column).unwrap()).unwrap()
}

struct FailingProvider;

impl AIProvider for FailingProvider {
    fn complete(&self, _system: &str, _prompt: &str) -> anyhow::Result<String> {
        anyhow::bail!("connection refused")
    }

    fn name(&self) -> &str {
        "failing"
    }

    fn model(&self) -> Option<&str> {
        None
    }
}

// ============================================================================
// Row Monotonicity
// ============================================================================

#[test]
fn test_rows_never_grow_and_columns_are_kept() {
    let df = load_csv("customers.csv");
    let pipeline = heuristic_pipeline();

    let mut drop_rules = ManualRules::default();
    drop_rules
        .missing_values
        .insert("city".to_string(), MissingValueStrategy::Drop);
    drop_rules.remove_duplicates = true;

    let mut remove_rules = ManualRules::default();
    remove_rules.outliers.insert(
        "spend".to_string(),
        lex_cleaning::ManualOutlierRule {
            method: OutlierMethod::Iqr,
            action: OutlierAction::Remove,
            threshold: None,
        },
    );

    let reports = vec![
        pipeline.clean(&df).unwrap().report,
        pipeline.clean_with_rules(&df, drop_rules).unwrap().report,
        pipeline.clean_with_rules(&df, remove_rules).unwrap().report,
        pipeline.clean_with_rules(&df, ManualRules::default()).unwrap().report,
    ];

    for report in reports {
        assert!(report.final_rows <= report.original_rows);
        assert_eq!(report.final_columns, report.original_columns);
    }
}

#[test]
fn test_input_dataframe_is_not_modified() {
    let df = load_csv("customers.csv");
    let snapshot = df.clone();

    heuristic_pipeline().clean(&df).unwrap();

    assert!(df.equals_missing(&snapshot));
}

// ============================================================================
// Outlier Handling
// ============================================================================

#[test]
fn test_iqr_capping_is_idempotent() {
    let df = load_csv("customers.csv");

    let first = OutlierHandler::apply(&df, "spend", OutlierMethod::Iqr, OutlierAction::Cap, 1.5)
        .unwrap();
    assert_eq!(first.changed, 1);

    let second = OutlierHandler::apply(
        &first.data,
        "spend",
        OutlierMethod::Iqr,
        OutlierAction::Cap,
        1.5,
    )
    .unwrap();
    assert_eq!(second.flagged, 0);
    assert_eq!(second.changed, 0);
    assert_eq!(floats(&first.data, "spend"), floats(&second.data, "spend"));
}

#[test]
fn test_zscore_capping_twice_matches_once() {
    let values: Vec<f64> = (1..=30).map(f64::from).chain([1000.0, 900.0]).collect();
    let df = df!["amount" => values].unwrap();

    let first = OutlierHandler::apply(&df, "amount", OutlierMethod::ZScore, OutlierAction::Cap, 3.0)
        .unwrap();
    assert_eq!(first.flagged, 2);

    let second = OutlierHandler::apply(
        &first.data,
        "amount",
        OutlierMethod::ZScore,
        OutlierAction::Cap,
        3.0,
    )
    .unwrap();
    assert_eq!(second.flagged, 0);
    assert_eq!(second.changed, 0);
    assert_eq!(floats(&first.data, "amount"), floats(&second.data, "amount"));

    let df = load_csv("customers.csv");
    let once = OutlierHandler::apply(&df, "spend", OutlierMethod::ZScore, OutlierAction::Cap, 2.0)
        .unwrap();
    assert_eq!(once.changed, 1);
    let twice = OutlierHandler::apply(
        &once.data,
        "spend",
        OutlierMethod::ZScore,
        OutlierAction::Cap,
        2.0,
    )
    .unwrap();
    assert_eq!(twice.flagged, 0);
    assert_eq!(floats(&once.data, "spend"), floats(&twice.data, "spend"));
}

#[test]
fn test_zero_variance_column_flags_nothing() {
    let df = load_csv("constant.csv");

    let flags = OutlierHandler::detect(&df, "reading", OutlierMethod::ZScore, 3.0).unwrap();
    assert!(flags.iter().all(|f| !f));

    let mut rules = ManualRules::default();
    rules.outliers.insert(
        "reading".to_string(),
        lex_cleaning::ManualOutlierRule {
            method: OutlierMethod::ZScore,
            action: OutlierAction::Cap,
            threshold: None,
        },
    );
    let result = heuristic_pipeline().clean_with_rules(&df, rules).unwrap();

    assert_eq!(result.report.outliers_handled["reading"].count, 0);
    assert!(result.report.is_noop());
    assert!(result.data.equals_missing(&df));
}

// ============================================================================
// Missing Values
// ============================================================================

#[test]
fn test_imputation_fills_every_missing_cell_with_statistic() {
    let df = load_csv("customers.csv");

    for strategy in [MissingValueStrategy::Mean, MissingValueStrategy::Median] {
        let before = missing_mask(column_series(&df, "age").unwrap()).unwrap();
        let k = before.iter().filter(|m| **m).count();
        assert_eq!(k, 1);

        let outcome = StatisticalImputer::resolve(&df, "age", strategy).unwrap();
        let fill = outcome.fill_value.as_ref().and_then(|v| v.as_f64()).unwrap();
        let after = floats(&outcome.data, "age");

        assert_eq!(outcome.affected, k);
        assert_eq!(missing_count(column_series(&outcome.data, "age").unwrap()).unwrap(), 0);
        for (was_missing, value) in before.iter().zip(&after) {
            if *was_missing {
                assert_eq!(*value, Some(fill));
            }
        }
    }

    let before = missing_mask(column_series(&df, "city").unwrap()).unwrap();
    let outcome = StatisticalImputer::resolve(&df, "city", MissingValueStrategy::Mode).unwrap();
    let cities = string_values(column_series(&outcome.data, "city").unwrap()).unwrap();

    assert_eq!(outcome.affected, 3);
    for (was_missing, value) in before.iter().zip(&cities) {
        if *was_missing {
            assert_eq!(value.as_deref(), Some("Paris"));
        }
    }
}

// ============================================================================
// Duplicates
// ============================================================================

#[test]
fn test_duplicate_resolution_is_deterministic() {
    let df = load_csv("customers.csv");

    let first = DuplicateResolver::remove_duplicates(&df, None).unwrap();
    let second = DuplicateResolver::remove_duplicates(&df, None).unwrap();

    assert_eq!(first.removed, 2);
    assert_eq!(first.key, second.key);
    assert_eq!(first.key, vec!["customer_id".to_string(), "name".to_string()]);
    assert!(first.data.equals_missing(&second.data));

    let names = string_values(column_series(&first.data, "name").unwrap()).unwrap();
    assert_eq!(names[2].as_deref(), Some("Carol"));
    assert_eq!(names[3].as_deref(), Some("Dan"));
}

#[test]
fn test_unknown_explicit_duplicate_key_is_input_error() {
    let df = load_csv("customers.csv");
    let rules: ManualRules = serde_json::from_str(
        r#"{"remove_duplicates": true, "duplicate_key": ["customer_id", "missing"]}"#,
    )
    .unwrap();

    let err = heuristic_pipeline().clean_with_rules(&df, rules).unwrap_err();
    assert!(err.is_input_error());
}

// ============================================================================
// Audit Log
// ============================================================================

#[test]
fn test_audit_entries_match_observed_changes() {
    let df = load_csv("customers.csv");
    let result = heuristic_pipeline().clean(&df).unwrap();
    let report = &result.report;
    let audit = &report.audit_log;

    let steps: Vec<_> = audit
        .iter()
        .filter(|e| e.operation != AuditOperation::ColumnSkipped)
        .collect();
    for entry in &steps {
        let same = steps
            .iter()
            .filter(|e| e.operation == entry.operation && e.column == entry.column)
            .count();
        assert_eq!(same, 1, "duplicate audit entry for {:?}", entry.operation);
    }

    // Duplicates
    let dedup = DuplicateResolver::remove_duplicates(&df, Some(&report.duplicate_key)).unwrap();
    let dup_entry = audit
        .iter()
        .find(|e| e.operation == AuditOperation::DuplicatesRemoved)
        .unwrap();
    assert_eq!(dup_entry.rows_affected, dedup.removed);
    assert_eq!(dup_entry.rows_affected, report.duplicates_removed);
    assert_eq!(report.original_rows - report.final_rows, dedup.removed);

    // Missing values, counted after deduplication
    for column in ["age", "city", "spend"] {
        let expected = missing_count(column_series(&dedup.data, column).unwrap()).unwrap();
        let entry = audit
            .iter()
            .find(|e| {
                e.operation == AuditOperation::MissingValuesImputed
                    && e.column.as_deref() == Some(column)
            })
            .unwrap();
        assert_eq!(entry.rows_affected, expected, "column {column}");
    }

    // Outliers: compare the filled column against the final one
    let filled = StatisticalImputer::resolve(&dedup.data, "spend", MissingValueStrategy::Median)
        .unwrap()
        .data;
    let changed = floats(&filled, "spend")
        .iter()
        .zip(floats(&result.data, "spend"))
        .filter(|(a, b)| **a != *b)
        .count();
    let capped = audit
        .iter()
        .find(|e| e.operation == AuditOperation::OutliersCapped)
        .unwrap();
    assert_eq!(capped.column.as_deref(), Some("spend"));
    assert_eq!(capped.rows_affected, changed);
    assert_eq!(changed, 1);
}

#[test]
fn test_steps_without_effect_are_audited_with_zero_counts() {
    let df = df!["x" => [1.0, 2.0, 3.0, 4.0, 5.0]].unwrap();
    let rules: ManualRules = serde_json::from_str(
        r#"{
            "missing_values": { "x": "mean" },
            "outliers": { "x": { "method": "iqr", "action": "cap" } }
        }"#,
    )
    .unwrap();

    let result = heuristic_pipeline().clean_with_rules(&df, rules).unwrap();
    let audit = &result.report.audit_log;

    assert_eq!(audit.len(), 2);
    assert_eq!(audit[0].operation, AuditOperation::MissingValuesImputed);
    assert_eq!(audit[1].operation, AuditOperation::OutliersCapped);
    assert!(audit.iter().all(|e| e.rows_affected == 0));
    assert!(audit.iter().all(|e| e.column.as_deref() == Some("x")));
    assert!(result.report.is_noop());
    assert!(result.data.equals_missing(&df));
}

// ============================================================================
// End-to-End Example
// ============================================================================

#[test]
fn test_price_example_with_manual_rules() {
    let df = load_csv("price_example.csv");
    let rules = load_rules("manual_rules.json");

    let result = heuristic_pipeline().clean_with_rules(&df, rules).unwrap();
    let report = &result.report;

    assert_eq!(
        floats(&result.data, "price"),
        vec![Some(10.0), Some(12.0), Some(11.0), Some(13.5), Some(11.5)]
    );
    assert_eq!(report.missing_values_handled["price"], MissingValueStrategy::Median);

    let outliers = &report.outliers_handled["price"];
    assert_eq!(outliers.method, OutlierMethod::Iqr);
    assert_eq!(outliers.action, OutlierAction::Cap);
    assert_eq!(outliers.count, 1);

    assert_eq!(report.recommendation_source, RecommendationSource::Manual);
    assert_eq!(report.final_rows, 5);
    assert_eq!(report.total_missing_after(), 0);

    let imputed = report
        .audit_log
        .iter()
        .find(|e| e.operation == AuditOperation::MissingValuesImputed)
        .unwrap();
    assert_eq!(imputed.details["fill_value"], serde_json::json!(11.5));
}

#[test]
fn test_price_example_with_heuristics() {
    let df = load_csv("price_example.csv");
    let result = heuristic_pipeline().clean(&df).unwrap();

    assert_eq!(result.report.recommendation_source, RecommendationSource::Heuristic);
    assert_eq!(
        result.report.missing_values_handled["price"],
        MissingValueStrategy::Median
    );
    assert_eq!(result.report.duplicates_removed, 0);
    assert_eq!(floats(&result.data, "price")[4], Some(11.5));
}

// ============================================================================
// Report Rendering and Serialization
// ============================================================================

#[test]
fn test_formatter_omits_duplicate_line_when_nothing_removed() {
    let df = load_csv("price_example.csv");
    let result = heuristic_pipeline()
        .clean_with_rules(&df, load_rules("manual_rules.json"))
        .unwrap();

    let text = ReportFormatter::render(&result.report);
    assert!(!text.to_lowercase().contains("duplicate"));
    assert!(text.contains("  * median: price"));
    assert!(text.contains("- Outlier handling (iqr, cap):"));
    assert!(text.contains("  * price: 1 outlier capped"));
}

#[test]
fn test_formatter_reports_removed_duplicates() {
    let df = load_csv("customers.csv");
    let result = heuristic_pipeline().clean(&df).unwrap();

    let text = ReportFormatter::render(&result.report);
    assert!(text.starts_with("Dataset cleaning summary:"));
    assert!(text.contains("- Removed 2 duplicate rows"));
    assert!(text.ends_with("- Final size: 10 rows, 5 columns"));
}

#[test]
fn test_report_json_round_trips_key_fields() {
    let df = load_csv("customers.csv");
    let result = heuristic_pipeline().clean(&df).unwrap();

    let value = ReportGenerator::to_json(&result.report);
    assert_eq!(value["original_rows"], 12);
    assert_eq!(value["final_rows"], 10);
    assert_eq!(value["duplicates_removed"], 2);
    assert_eq!(value["recommendation_source"]["kind"], "heuristic");
}

// ============================================================================
// Recommendation Sources
// ============================================================================

#[test]
fn test_failing_provider_falls_back_to_heuristics() {
    let df = load_csv("customers.csv");
    let result = Pipeline::builder()
        .ai_provider(Arc::new(FailingProvider))
        .build()
        .unwrap()
        .clean(&df)
        .unwrap();

    match &result.report.recommendation_source {
        RecommendationSource::Fallback { reason } => assert!(reason.contains("connection refused")),
        other => panic!("expected fallback, got {other:?}"),
    }
    assert_eq!(result.report.duplicates_removed, 2);
}

#[test]
fn test_provider_ignored_when_ai_disabled() {
    let df = load_csv("price_example.csv");
    let result = Pipeline::builder()
        .config(
            CleaningConfig::builder()
                .use_ai_recommendations(false)
                .build()
                .unwrap(),
        )
        .ai_provider(Arc::new(FailingProvider))
        .build()
        .unwrap()
        .clean(&df)
        .unwrap();

    assert_eq!(result.report.recommendation_source, RecommendationSource::Heuristic);
}

// ============================================================================
// Progress and Cancellation
// ============================================================================

#[test]
fn test_progress_updates_end_with_complete() {
    let df = load_csv("customers.csv");
    let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);

    heuristic_pipeline_with(move |update| sink.lock().unwrap().push(update))
        .clean(&df)
        .unwrap();

    let updates = updates.lock().unwrap();
    let stages: Vec<CleaningStage> = updates.iter().map(|u| u.stage).collect();
    assert_eq!(stages.first(), Some(&CleaningStage::Profiling));
    assert_eq!(stages.last(), Some(&CleaningStage::Complete));
    assert!(stages.contains(&CleaningStage::Deduplicating));
    assert!(stages.contains(&CleaningStage::ColumnCleaning));

    let progress: Vec<f32> = updates.iter().map(|u| u.progress).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
}

fn heuristic_pipeline_with<F>(callback: F) -> Pipeline
where
    F: Fn(ProgressUpdate) + Send + Sync + 'static,
{
    Pipeline::builder()
        .config(
            CleaningConfig::builder()
                .use_ai_recommendations(false)
                .build()
                .unwrap(),
        )
        .on_progress(callback)
        .build()
        .unwrap()
}

#[test]
fn test_cancelled_run_returns_cancelled() {
    let df = load_csv("customers.csv");
    let token = CancellationToken::new();
    token.cancel();

    let result = Pipeline::builder()
        .cancellation_token(token)
        .build()
        .unwrap()
        .clean(&df);

    assert!(matches!(result, Err(CleaningError::Cancelled)));
}

#[test]
fn test_empty_dataset_is_rejected() {
    let err = heuristic_pipeline().clean(&DataFrame::empty()).unwrap_err();
    assert!(matches!(err, CleaningError::EmptyDataset));
}
