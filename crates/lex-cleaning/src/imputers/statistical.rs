//! Statistical resolution of missing values.
//!
//! Mean and median apply to numeric columns only. Mode works for any dtype
//! and keeps the column's dtype; ties go to the smallest value (numeric
//! order for numbers, lexicographic otherwise).

use anyhow::Result;
use polars::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

use crate::config::MissingValueStrategy;
use crate::profiler::statistics;
use crate::types::ColumnKind;
use crate::utils::{
    column_series, fill_nulls_from_row, float_series, is_numeric_dtype, keep_rows, missing_mask,
    numeric_values, string_values,
};

/// Result of resolving missing values in one column.
#[derive(Debug, Clone)]
pub struct ImputationOutcome {
    pub data: DataFrame,
    pub strategy: MissingValueStrategy,
    /// Cells filled, or rows dropped for [`MissingValueStrategy::Drop`].
    pub affected: usize,
    /// Value used to fill, rendered for the audit log.
    pub fill_value: Option<serde_json::Value>,
    /// False when the strategy does not fit the column (mean of text).
    pub applicable: bool,
}

impl ImputationOutcome {
    fn unchanged(df: &DataFrame, strategy: MissingValueStrategy, applicable: bool) -> Self {
        Self {
            data: df.clone(),
            strategy,
            affected: 0,
            fill_value: None,
            applicable,
        }
    }
}

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Strategy used when nothing else is specified: median for numbers, mode otherwise.
    pub fn default_strategy(kind: ColumnKind) -> MissingValueStrategy {
        match kind {
            ColumnKind::Numeric => MissingValueStrategy::Median,
            _ => MissingValueStrategy::Mode,
        }
    }

    /// Resolve missing values in `column`, returning a new frame.
    pub fn resolve(
        df: &DataFrame,
        column: &str,
        strategy: MissingValueStrategy,
    ) -> Result<ImputationOutcome> {
        let series = column_series(df, column)?;
        let missing = missing_mask(series)?;
        let missing_count = missing.iter().filter(|m| **m).count();

        if strategy.requires_numeric() && !is_numeric_dtype(series.dtype()) {
            debug!("Skipping {} imputation for non-numeric column '{}'", strategy, column);
            return Ok(ImputationOutcome::unchanged(df, strategy, false));
        }
        if strategy == MissingValueStrategy::None || missing_count == 0 {
            return Ok(ImputationOutcome::unchanged(df, strategy, true));
        }

        match strategy {
            MissingValueStrategy::None => Ok(ImputationOutcome::unchanged(df, strategy, true)),
            MissingValueStrategy::Drop => {
                let keep: Vec<bool> = missing.iter().map(|m| !m).collect();
                Ok(ImputationOutcome {
                    data: keep_rows(df, &keep)?,
                    strategy,
                    affected: missing_count,
                    fill_value: None,
                    applicable: true,
                })
            }
            MissingValueStrategy::Mean | MissingValueStrategy::Median => {
                let values = numeric_values(series)?;
                let present: Vec<f64> = values.iter().flatten().copied().collect();
                let stat = if strategy == MissingValueStrategy::Mean {
                    statistics::mean(&present)
                } else {
                    statistics::median(&present)
                };
                let Some(fill) = stat else {
                    return Ok(ImputationOutcome::unchanged(df, strategy, true));
                };

                let filled: Vec<Option<f64>> =
                    values.into_iter().map(|v| Some(v.unwrap_or(fill))).collect();
                let mut data = df.clone();
                data.replace(column, float_series(column, filled))?;
                Ok(ImputationOutcome {
                    data,
                    strategy,
                    affected: missing_count,
                    fill_value: Some(serde_json::json!(fill)),
                    applicable: true,
                })
            }
            MissingValueStrategy::Mode => Self::fill_mode(df, column, series, missing_count),
        }
    }

    fn fill_mode(
        df: &DataFrame,
        column: &str,
        series: &Series,
        missing_count: usize,
    ) -> Result<ImputationOutcome> {
        let strategy = MissingValueStrategy::Mode;
        let dtype = series.dtype().clone();

        if matches!(dtype, DataType::Float32 | DataType::Float64) {
            let values = numeric_values(series)?;
            let Some(mode) = numeric_mode(&values) else {
                return Ok(ImputationOutcome::unchanged(df, strategy, true));
            };
            let filled: Vec<Option<f64>> =
                values.into_iter().map(|v| Some(v.unwrap_or(mode))).collect();
            let mut data = df.clone();
            data.replace(column, float_series(column, filled).cast(&dtype)?)?;
            return Ok(ImputationOutcome {
                data,
                strategy,
                affected: missing_count,
                fill_value: Some(serde_json::json!(mode)),
                applicable: true,
            });
        }

        let source = if is_numeric_dtype(&dtype) {
            let values = numeric_values(series)?;
            numeric_mode(&values).and_then(|mode| {
                let row = values.iter().position(|v| *v == Some(mode))?;
                Some((row, serde_json::json!(mode)))
            })
        } else {
            let values = string_values(series)?;
            text_mode(&values).and_then(|mode| {
                let row = values
                    .iter()
                    .position(|v| v.as_deref() == Some(mode.as_str()))?;
                Some((row, serde_json::Value::String(mode)))
            })
        };

        let Some((row, fill_value)) = source else {
            return Ok(ImputationOutcome::unchanged(df, strategy, true));
        };

        let filled = fill_nulls_from_row(series, row)?;
        let fill_value = Some(fill_value);
        let mut data = df.clone();
        data.replace(column, filled)?;
        Ok(ImputationOutcome {
            data,
            strategy,
            affected: missing_count,
            fill_value,
            applicable: true,
        })
    }
}

/// Most frequent value; ties resolve to the smallest.
fn numeric_mode(values: &[Option<f64>]) -> Option<f64> {
    let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
    for v in values.iter().flatten() {
        // fold -0.0 into 0.0 so both count together
        let v = if *v == 0.0 { 0.0 } else { *v };
        counts.entry(v.to_bits()).or_insert((v, 0)).1 += 1;
    }
    counts
        .into_values()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.total_cmp(&a.0)))
        .map(|(v, _)| v)
}

fn text_mode(values: &[Option<String>]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| match a.1.cmp(&b.1) {
            Ordering::Equal => b.0.cmp(a.0),
            other => other,
        })
        .map(|(v, _)| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::missing_count;

    fn age_frame() -> DataFrame {
        df![
            "age" => [Some(20.0), None, Some(30.0), Some(40.0), None],
            "city" => [Some("b"), Some("a"), None, Some("b"), Some("a")],
        ]
        .unwrap()
    }

    #[test]
    fn test_default_strategy() {
        assert_eq!(
            StatisticalImputer::default_strategy(ColumnKind::Numeric),
            MissingValueStrategy::Median
        );
        assert_eq!(
            StatisticalImputer::default_strategy(ColumnKind::Categorical),
            MissingValueStrategy::Mode
        );
    }

    // ------------------------------------------------------------------------
    // Fill strategies
    // ------------------------------------------------------------------------

    #[test]
    fn test_mean_fills_all_missing() {
        let df = age_frame();
        let outcome = StatisticalImputer::resolve(&df, "age", MissingValueStrategy::Mean).unwrap();

        assert_eq!(outcome.affected, 2);
        assert_eq!(outcome.fill_value, Some(serde_json::json!(30.0)));
        let series = column_series(&outcome.data, "age").unwrap();
        assert_eq!(missing_count(series).unwrap(), 0);
        assert_eq!(outcome.data.height(), 5);
    }

    #[test]
    fn test_median_fill_value() {
        let df = df!["price" => [Some(10.0), Some(12.0), Some(11.0), Some(1000.0), None]].unwrap();
        let outcome =
            StatisticalImputer::resolve(&df, "price", MissingValueStrategy::Median).unwrap();

        let values = numeric_values(column_series(&outcome.data, "price").unwrap()).unwrap();
        assert_eq!(values[4], Some(11.5));
    }

    #[test]
    fn test_mode_tie_picks_smallest_text() {
        let df = age_frame();
        let outcome = StatisticalImputer::resolve(&df, "city", MissingValueStrategy::Mode).unwrap();

        assert_eq!(outcome.affected, 1);
        assert_eq!(outcome.fill_value, Some(serde_json::json!("a")));
        let values = string_values(column_series(&outcome.data, "city").unwrap()).unwrap();
        assert_eq!(values[2].as_deref(), Some("a"));
    }

    #[test]
    fn test_mode_preserves_integer_dtype() {
        let df = df!["n" => [Some(3i64), Some(1), None, Some(3), Some(1)]].unwrap();
        let outcome = StatisticalImputer::resolve(&df, "n", MissingValueStrategy::Mode).unwrap();

        let series = column_series(&outcome.data, "n").unwrap();
        assert_eq!(series.dtype(), &DataType::Int64);
        assert_eq!(series.get(2).unwrap().try_extract::<i64>().unwrap(), 1);
    }

    #[test]
    fn test_mode_on_float_column() {
        let df = df!["x" => [Some(2.5), Some(2.5), None, Some(1.0)]].unwrap();
        let outcome = StatisticalImputer::resolve(&df, "x", MissingValueStrategy::Mode).unwrap();
        let values = numeric_values(column_series(&outcome.data, "x").unwrap()).unwrap();
        assert_eq!(values[2], Some(2.5));
    }

    #[test]
    fn test_drop_removes_rows() {
        let df = age_frame();
        let outcome = StatisticalImputer::resolve(&df, "age", MissingValueStrategy::Drop).unwrap();

        assert_eq!(outcome.affected, 2);
        assert_eq!(outcome.data.height(), 3);
        assert_eq!(outcome.data.width(), 2);
    }

    // ------------------------------------------------------------------------
    // No-op cases
    // ------------------------------------------------------------------------

    #[test]
    fn test_mean_on_text_is_not_applicable() {
        let df = age_frame();
        let outcome = StatisticalImputer::resolve(&df, "city", MissingValueStrategy::Mean).unwrap();
        assert!(!outcome.applicable);
        assert_eq!(outcome.affected, 0);
        assert!(outcome.data.equals_missing(&df));
    }

    #[test]
    fn test_all_missing_column_is_noop() {
        let df = df!["x" => [None::<f64>, None, None]].unwrap();
        for strategy in [MissingValueStrategy::Mean, MissingValueStrategy::Median, MissingValueStrategy::Mode] {
            let outcome = StatisticalImputer::resolve(&df, "x", strategy).unwrap();
            assert_eq!(outcome.affected, 0);
            assert!(outcome.applicable);
        }
    }

    #[test]
    fn test_none_strategy_is_noop() {
        let df = age_frame();
        let outcome = StatisticalImputer::resolve(&df, "age", MissingValueStrategy::None).unwrap();
        assert_eq!(outcome.affected, 0);
        assert!(outcome.data.equals_missing(&df));
    }

    #[test]
    fn test_numeric_mode_ties() {
        assert_eq!(numeric_mode(&[Some(5.0), Some(2.0), Some(5.0), Some(2.0)]), Some(2.0));
        assert_eq!(numeric_mode(&[None, None]), None);
    }
}
