//! Fixed, caller-supplied cleaning rules.

use super::Recommender;
use crate::config::{MissingValueStrategy, OutlierAction, OutlierMethod};
use crate::types::{CleaningRecommendation, DatasetProfile, DatasetRecommendation};
use anyhow::Result;
use indexmap::IndexMap;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ManualOutlierRule {
    #[serde(default)]
    pub method: OutlierMethod,
    #[serde(default)]
    pub action: OutlierAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

/// Per-column rules in the shape users write by hand:
///
/// ```json
/// {
///   "missing_values": { "age": "median", "city": "mode" },
///   "outliers": { "price": { "method": "iqr", "action": "cap" } },
///   "remove_duplicates": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualRules {
    pub missing_values: IndexMap<String, MissingValueStrategy>,
    pub outliers: IndexMap<String, ManualOutlierRule>,
    pub remove_duplicates: bool,
    /// Identity columns for duplicate removal; selected automatically when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_key: Option<Vec<String>>,
}

impl ManualRules {
    pub fn is_empty(&self) -> bool {
        self.missing_values.is_empty() && self.outliers.is_empty() && !self.remove_duplicates
    }

    /// Convert to a dataset recommendation.
    ///
    /// Columns follow dataset order; rule names that are not in the dataset
    /// are appended so the executor can report them as skipped.
    pub fn to_recommendation(&self, df: &DataFrame) -> DatasetRecommendation {
        let mut names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|c| c.to_string())
            .filter(|c| self.missing_values.contains_key(c) || self.outliers.contains_key(c))
            .collect();
        for name in self.missing_values.keys().chain(self.outliers.keys()) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }

        let column_recommendations = names
            .into_iter()
            .map(|name| {
                let dtype = df
                    .column(&name)
                    .map(|c| c.dtype().to_string())
                    .unwrap_or_default();
                let mut rec = CleaningRecommendation::new(&name, dtype);
                if let Some(strategy) = self.missing_values.get(&name) {
                    rec = rec.with_missing(*strategy, "manual rule");
                }
                if let Some(rule) = self.outliers.get(&name) {
                    rec = rec.with_outliers(rule.method, rule.action, "manual rule");
                    rec.outliers.threshold = rule.threshold;
                }
                rec.reasoning = "Manual rules".to_string();
                rec
            })
            .collect();

        DatasetRecommendation {
            duplicate_removal: self.remove_duplicates,
            duplicate_key: self.duplicate_key.clone(),
            column_recommendations,
            overall_advice: "Manual cleaning rules".to_string(),
        }
    }
}

/// Recommender that replays [`ManualRules`].
pub struct ManualRecommender {
    rules: ManualRules,
}

impl ManualRecommender {
    pub fn new(rules: ManualRules) -> Self {
        Self { rules }
    }
}

impl Recommender for ManualRecommender {
    fn recommend(
        &self,
        df: &DataFrame,
        _profile: &DatasetProfile,
    ) -> Result<DatasetRecommendation> {
        Ok(self.rules.to_recommendation(df))
    }

    fn name(&self) -> &str {
        "manual"
    }
}
