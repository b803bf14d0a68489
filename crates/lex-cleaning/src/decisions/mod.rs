//! Recommendation engines.
//!
//! A [`Recommender`] turns a dataset and its profile into a
//! [`DatasetRecommendation`]: the per-column plan the executor applies.
//! Three implementations ship with the crate:
//!
//! - [`HeuristicRecommender`]: offline rules, always available.
//! - [`ManualRecommender`]: caller-supplied fixed rules.
//! - [`AiRecommender`]: asks an [`AIProvider`](crate::ai::AIProvider) for a plan.

mod ai_engine;
mod manual;
mod rule_engine;

pub use ai_engine::AiRecommender;
pub use manual::{ManualOutlierRule, ManualRecommender, ManualRules};
pub use rule_engine::HeuristicRecommender;

use crate::types::{DatasetProfile, DatasetRecommendation};
use anyhow::Result;
use polars::prelude::*;

/// Produces a cleaning plan for a dataset.
pub trait Recommender: Send + Sync {
    fn recommend(&self, df: &DataFrame, profile: &DatasetProfile)
    -> Result<DatasetRecommendation>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CleaningConfig;
    use crate::profiler::DataProfiler;

    #[test]
    fn test_recommenders_as_trait_objects() {
        let df = df!["a" => [Some(1.0), None, Some(3.0)]].unwrap();
        let profile = DataProfiler::default().profile_dataset(&df).unwrap();

        let engines: Vec<Box<dyn Recommender>> = vec![
            Box::new(HeuristicRecommender::new(CleaningConfig::default())),
            Box::new(ManualRecommender::new(ManualRules::default())),
        ];

        for engine in &engines {
            let rec = engine.recommend(&df, &profile).unwrap();
            assert!(!engine.name().is_empty());
            assert!(rec.column_recommendations.len() <= 1);
        }
    }
}
