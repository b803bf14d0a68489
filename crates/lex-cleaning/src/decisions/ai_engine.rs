//! Recommendations from an external language model.

use super::Recommender;
use crate::ai::AIProvider;
use crate::error::CleaningError;
use crate::types::{DatasetProfile, DatasetRecommendation};
use anyhow::Result;
use polars::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "You are an expert data scientist providing recommendations \
for cleaning a dataset. Reply with a single JSON object and nothing else.";

const FORMAT_INSTRUCTIONS: &str = r#"Return JSON with exactly this shape:
{
  "duplicate_removal": true | false,
  "duplicate_key": ["column", ...] | null,
  "column_recommendations": [
    {
      "column_name": "<name>",
      "data_type": "<dtype>",
      "missing_values": { "method": "none|drop|mean|median|mode", "reason": "<why>" },
      "outliers": { "method": "none|zscore|iqr", "action": "none|remove|cap", "reason": "<why>" },
      "value_transformations": ["round to 2 decimals", "lowercase", ...],
      "column_importance": 1-10,
      "reasoning": "<why>"
    }
  ],
  "overall_advice": "<summary>"
}
mean and median apply to numeric columns only. Use only column names from the analysis."#;

/// Asks an [`AIProvider`] for a [`DatasetRecommendation`].
///
/// The reply is parsed leniently (code fences and surrounding prose are
/// stripped) and then validated against the dataset: recommendations for
/// unknown columns are dropped and importance is clamped to 1..=10. Every
/// failure is reported as [`CleaningError::RecommendationUnavailable`].
pub struct AiRecommender {
    provider: Arc<dyn AIProvider>,
}

impl AiRecommender {
    pub fn new(provider: Arc<dyn AIProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn build_prompt(profile: &DatasetProfile) -> Result<String> {
        let analysis = serde_json::to_string_pretty(profile)?;
        Ok(format!(
            "Here's the analysis of the dataset:\n{analysis}\n\n\
             Based on this analysis, provide detailed recommendations for cleaning this dataset.\n\
             Focus on handling missing values, outliers, and whether duplicates should be removed.\n\
             For each column, suggest the best approach based on the data characteristics.\n\n\
             {FORMAT_INSTRUCTIONS}"
        ))
    }

    /// Keep only what applies to `df`.
    fn validate(df: &DataFrame, mut rec: DatasetRecommendation) -> DatasetRecommendation {
        let known = |name: &str| df.column(name).is_ok();

        let before = rec.column_recommendations.len();
        rec.column_recommendations.retain(|r| {
            let keep = known(&r.column_name);
            if !keep {
                warn!("Ignoring recommendation for unknown column '{}'", r.column_name);
            }
            keep
        });
        if rec.column_recommendations.len() != before {
            debug!(
                "Kept {} of {} column recommendations",
                rec.column_recommendations.len(),
                before
            );
        }

        if let Some(key) = rec.duplicate_key.take() {
            let key: Vec<String> = key.into_iter().filter(|c| known(c)).collect();
            rec.duplicate_key = (!key.is_empty()).then_some(key);
        }
        rec
    }
}

/// Pull the outermost JSON object out of a model reply.
pub(crate) fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

impl Recommender for AiRecommender {
    fn recommend(&self, df: &DataFrame, profile: &DatasetProfile) -> Result<DatasetRecommendation> {
        let unavailable = |msg: String| CleaningError::RecommendationUnavailable(msg);

        let prompt = Self::build_prompt(profile)?;
        info!("Requesting cleaning recommendations from {}", self.provider.name());

        let reply = self
            .provider
            .complete(SYSTEM_PROMPT, &prompt)
            .map_err(|e| unavailable(format!("{} request failed: {e:#}", self.provider.name())))?;

        let json = extract_json_object(&reply)
            .ok_or_else(|| unavailable("reply contains no JSON object".to_string()))?;
        let rec: DatasetRecommendation = serde_json::from_str(json)
            .map_err(|e| unavailable(format!("reply is not a valid recommendation: {e}")))?;

        let rec = Self::validate(df, rec);
        debug!(
            "{} recommended {} column plan(s), duplicate removal: {}",
            self.provider.name(),
            rec.column_recommendations.len(),
            rec.duplicate_removal
        );
        Ok(rec)
    }

    fn name(&self) -> &str {
        "external"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MissingValueStrategy, OutlierMethod};
    use crate::profiler::DataProfiler;

    struct CannedProvider(std::result::Result<String, String>);

    impl AIProvider for CannedProvider {
        fn complete(&self, system: &str, prompt: &str) -> Result<String> {
            assert!(system.contains("JSON"));
            assert!(prompt.contains("column_recommendations"));
            self.0.clone().map_err(|e| anyhow::anyhow!(e))
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn run(reply: std::result::Result<&str, &str>) -> Result<DatasetRecommendation> {
        let df = df![
            "id" => [1i64, 2, 3],
            "price" => [Some(10.0), None, Some(12.0)],
        ]
        .unwrap();
        let profile = DataProfiler::default().profile_dataset(&df).unwrap();
        let provider = CannedProvider(reply.map(str::to_string).map_err(str::to_string));
        AiRecommender::new(Arc::new(provider)).recommend(&df, &profile)
    }

    #[test]
    fn test_parses_fenced_reply() {
        let reply = "Here you go:\n```json\n{\"duplicate_removal\": true, \
            \"column_recommendations\": [{\"column_name\": \"price\", \
            \"missing_values\": {\"method\": \"median\", \"reason\": \"skew\"}, \
            \"outliers\": {\"method\": \"IQR\", \"action\": \"cap\", \"reason\": \"\"}, \
            \"column_importance\": 42}]}\n```";

        let rec = run(Ok(reply)).unwrap();
        assert!(rec.duplicate_removal);
        let price = rec.column("price").unwrap();
        assert_eq!(price.missing_values.method, MissingValueStrategy::Median);
        assert_eq!(price.outliers.method, OutlierMethod::Iqr);
        assert_eq!(price.column_importance, 10);
    }

    #[test]
    fn test_unknown_columns_are_dropped() {
        let reply = r#"{"duplicate_key": ["ghost"], "column_recommendations": [
            {"column_name": "ghost"}, {"column_name": "id"}]}"#;

        let rec = run(Ok(reply)).unwrap();
        assert_eq!(rec.column_recommendations.len(), 1);
        assert_eq!(rec.column_recommendations[0].column_name, "id");
        assert!(rec.duplicate_key.is_none());
    }

    #[test]
    fn test_provider_failure_is_unavailable() {
        let err = run(Err("timeout")).unwrap_err();
        let err = err.downcast::<CleaningError>().unwrap();
        assert_eq!(err.error_code(), "RECOMMENDATION_UNAVAILABLE");
    }

    #[test]
    fn test_unparsable_reply_is_unavailable() {
        for reply in ["no json here", "{\"column_recommendations\": 7}"] {
            let err = run(Ok(reply)).unwrap_err();
            assert!(err.downcast_ref::<CleaningError>().is_some(), "{reply}");
        }
    }

    #[test]
    fn test_extract_json_object() {
        assert_eq!(extract_json_object("x {\"a\": {}} y"), Some("{\"a\": {}}"));
        assert_eq!(extract_json_object("} {"), None);
    }
}
