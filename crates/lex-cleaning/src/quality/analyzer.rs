//! Read-only data-quality checks: missing values, outliers, duplicates and
//! descriptive statistics, without changing the dataset.

use anyhow::Result;
use indexmap::IndexMap;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cleaner::DuplicateResolver;
use crate::config::{CleaningConfig, OutlierMethod};
use crate::pipeline::OutlierHandler;
use crate::profiler::DataProfiler;
use crate::types::DatasetProfile;
use crate::utils::{is_numeric_dtype, missing_count};

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 10_000.0).round() / 100.0
}

/// Missing values per column; only columns that have any are listed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MissingValueSummary {
    pub total_missing: usize,
    pub columns_with_missing: IndexMap<String, usize>,
    /// Percent of rows, rounded to 2 decimals.
    pub missing_percent: IndexMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierFinding {
    pub count: usize,
    pub percent: f64,
    pub method: OutlierMethod,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DuplicateSummary {
    /// Exact duplicates over all columns.
    pub duplicate_rows: usize,
    pub duplicate_percent: f64,
    pub total_rows: usize,
    pub unique_rows: usize,
}

/// Everything the analyzer reports, in one value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySummary {
    pub missing: MissingValueSummary,
    pub outliers: IndexMap<String, OutlierFinding>,
    pub outlier_method: OutlierMethod,
    pub duplicates: DuplicateSummary,
}

/// Read-only data quality checks. Nothing here modifies the dataset.
#[derive(Debug, Clone, Default)]
pub struct DataQualityAnalyzer {
    config: CleaningConfig,
}

impl DataQualityAnalyzer {
    pub fn new(config: CleaningConfig) -> Self {
        Self { config }
    }

    pub fn missing_values(&self, df: &DataFrame) -> Result<MissingValueSummary> {
        let mut summary = MissingValueSummary::default();
        for col in df.get_columns() {
            let count = missing_count(col.as_materialized_series())?;
            summary.total_missing += count;
            if count > 0 {
                let name = col.name().to_string();
                summary.missing_percent.insert(name.clone(), percent(count, df.height()));
                summary.columns_with_missing.insert(name, count);
            }
        }
        Ok(summary)
    }

    /// Outliers in numeric columns under `method`, with the configured threshold.
    ///
    /// `columns` narrows the check; names that are unknown or not numeric are
    /// ignored. Only columns with at least one outlier are returned.
    pub fn outliers(
        &self,
        df: &DataFrame,
        columns: Option<&[String]>,
        method: OutlierMethod,
    ) -> Result<IndexMap<String, OutlierFinding>> {
        let mut findings = IndexMap::new();
        if method == OutlierMethod::None {
            return Ok(findings);
        }

        let threshold = self.config.default_threshold(method);
        let numeric = df
            .get_columns()
            .iter()
            .filter(|c| is_numeric_dtype(c.dtype()))
            .map(|c| c.name().to_string())
            .filter(|name| columns.is_none_or(|wanted| wanted.contains(name)));

        for name in numeric {
            let count = OutlierHandler::detect(df, &name, method, threshold)?
                .into_iter()
                .filter(|f| *f)
                .count();
            if count > 0 {
                findings.insert(
                    name,
                    OutlierFinding {
                        count,
                        percent: percent(count, df.height()),
                        method,
                    },
                );
            }
        }
        Ok(findings)
    }

    pub fn duplicates(&self, df: &DataFrame) -> Result<DuplicateSummary> {
        let duplicate_rows = DuplicateResolver::count_duplicates(df, None)?;
        Ok(DuplicateSummary {
            duplicate_rows,
            duplicate_percent: percent(duplicate_rows, df.height()),
            total_rows: df.height(),
            unique_rows: df.height() - duplicate_rows,
        })
    }

    /// Column statistics; same as profiling the dataset.
    pub fn statistics(&self, df: &DataFrame) -> Result<DatasetProfile> {
        DataProfiler::new(&self.config).profile_dataset(df)
    }

    /// All checks, with outliers under the configured default method.
    pub fn summarize(&self, df: &DataFrame) -> Result<QualitySummary> {
        let outlier_method = self.config.default_outlier_method;
        Ok(QualitySummary {
            missing: self.missing_values(df)?,
            outliers: self.outliers(df, None, outlier_method)?,
            outlier_method,
            duplicates: self.duplicates(df)?,
        })
    }
}
