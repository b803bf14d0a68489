//! Rule-based recommendations from profile statistics.

use super::Recommender;
use crate::config::{CleaningConfig, MissingValueStrategy, OutlierMethod};
use crate::imputers::StatisticalImputer;
use crate::types::{CleaningRecommendation, ColumnProfile, DatasetProfile, DatasetRecommendation};
use anyhow::Result;
use polars::prelude::*;
use tracing::debug;

/// Heuristic recommender.
///
/// Needs no external service, so it doubles as the fallback whenever the
/// external recommender is unavailable.
pub struct HeuristicRecommender {
    config: CleaningConfig,
}

impl HeuristicRecommender {
    pub fn new(config: CleaningConfig) -> Self {
        Self { config }
    }

    fn recommend_column(&self, col: &ColumnProfile) -> CleaningRecommendation {
        let mut rec = CleaningRecommendation::new(&col.name, &col.dtype);
        let mut reasons = Vec::new();

        if col.has_missing() {
            let strategy = StatisticalImputer::default_strategy(col.kind);
            rec = rec.with_missing(
                strategy,
                format!(
                    "{} missing values ({:.1}%), {} fill for a {} column",
                    col.missing_count, col.missing_percent, strategy, col.kind
                ),
            );
            reasons.push("missing values");
        } else {
            rec = rec.with_missing(MissingValueStrategy::None, "No missing values");
        }

        let method = self.config.default_outlier_method;
        if col.kind.is_numeric() && col.outlier_count() > 0 && method != OutlierMethod::None {
            let action = self.config.default_outlier_action;
            rec = rec.with_outliers(
                method,
                action,
                format!(
                    "{} potential outliers under IQR, {} with {}",
                    col.outlier_count(),
                    action,
                    method
                ),
            );
            reasons.push("outliers");
        }

        rec.reasoning = if reasons.is_empty() {
            "No issues detected".to_string()
        } else {
            format!("Detected {}", reasons.join(" and "))
        };
        rec
    }
}

impl Recommender for HeuristicRecommender {
    fn recommend(
        &self,
        _df: &DataFrame,
        profile: &DatasetProfile,
    ) -> Result<DatasetRecommendation> {
        let column_recommendations: Vec<CleaningRecommendation> = profile
            .column_profiles
            .iter()
            .map(|col| self.recommend_column(col))
            .collect();

        let flagged = column_recommendations
            .iter()
            .filter(|r| {
                r.missing_values.method != MissingValueStrategy::None
                    || r.outliers.method != OutlierMethod::None
            })
            .count();
        debug!(
            "Heuristic plan: {} of {} columns need work, {} duplicate rows",
            flagged, profile.columns, profile.duplicate_rows
        );

        let overall_advice = if flagged == 0 && profile.duplicate_rows == 0 {
            "No cleaning needed.".to_string()
        } else {
            format!(
                "Built-in heuristics: {} column(s) need attention; {} exact duplicate row(s).",
                flagged, profile.duplicate_rows
            )
        };

        Ok(DatasetRecommendation {
            duplicate_removal: profile.duplicate_rows > 0,
            duplicate_key: None,
            column_recommendations,
            overall_advice,
        })
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutlierAction;
    use crate::profiler::DataProfiler;

    fn recommend(df: &DataFrame) -> DatasetRecommendation {
        let profile = DataProfiler::default().profile_dataset(df).unwrap();
        HeuristicRecommender::new(CleaningConfig::default())
            .recommend(df, &profile)
            .unwrap()
    }

    #[test]
    fn test_missing_strategy_by_kind() {
        let df = df![
            "age" => [Some(30i64), None, Some(40)],
            "city" => [Some("Paris"), None, Some("Rome")],
        ]
        .unwrap();

        let rec = recommend(&df);
        assert_eq!(
            rec.column("age").unwrap().missing_values.method,
            MissingValueStrategy::Median
        );
        assert_eq!(
            rec.column("city").unwrap().missing_values.method,
            MissingValueStrategy::Mode
        );
        assert!(!rec.duplicate_removal);
    }

    #[test]
    fn test_outliers_use_configured_defaults() {
        let mut values: Vec<f64> = (1..=20).map(f64::from).collect();
        values.push(500.0);
        let df = df!["x" => values].unwrap();

        let col = recommend(&df).column("x").cloned().unwrap();
        assert_eq!(col.outliers.method, OutlierMethod::Iqr);
        assert_eq!(col.outliers.action, OutlierAction::Cap);
        assert_eq!(col.missing_values.method, MissingValueStrategy::None);
        assert_eq!(col.column_importance, 5);
    }

    #[test]
    fn test_small_numeric_column_gets_no_outlier_step() {
        let df = df!["x" => [1.0, 2.0, 1000.0]].unwrap();
        let col = recommend(&df).column("x").cloned().unwrap();
        assert_eq!(col.outliers.method, OutlierMethod::None);
        assert_eq!(col.reasoning, "No issues detected");
    }

    #[test]
    fn test_duplicates_enable_removal() {
        let df = df!["a" => [1i64, 1, 2], "b" => ["x", "x", "y"]].unwrap();
        let rec = recommend(&df);
        assert!(rec.duplicate_removal);
        assert!(rec.duplicate_key.is_none());
    }
}
