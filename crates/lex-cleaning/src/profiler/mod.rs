//! Column and dataset profiling.
//!
//! Profiles are read-only snapshots: numeric summary statistics, an
//! informational IQR outlier count, missing-value counts and, for textual
//! columns, frequency information used by the recommenders.

pub mod statistics;

use anyhow::Result;
use polars::prelude::*;
use rand::prelude::*;
use std::collections::HashSet;

use crate::cleaner::DuplicateResolver;
use crate::config::CleaningConfig;
use crate::types::{ColumnKind, ColumnProfile, DatasetProfile, OutlierProfile};
use crate::utils::{column_kind, column_series, numeric_values, string_values};

/// Builds [`ColumnProfile`]s and [`DatasetProfile`]s.
#[derive(Debug, Clone)]
pub struct DataProfiler {
    iqr_multiplier: f64,
    min_outlier_sample: usize,
    categorical_max_unique: usize,
    categorical_max_ratio: f64,
    sample_size: usize,
}

impl Default for DataProfiler {
    fn default() -> Self {
        Self::new(&CleaningConfig::default())
    }
}

impl DataProfiler {
    pub fn new(config: &CleaningConfig) -> Self {
        Self {
            iqr_multiplier: config.iqr_multiplier,
            min_outlier_sample: config.min_profile_outlier_sample,
            categorical_max_unique: config.categorical_max_unique,
            categorical_max_ratio: config.categorical_max_ratio,
            sample_size: config.sample_size,
        }
    }

    /// Profile every column plus dataset-wide aggregates.
    pub fn profile_dataset(&self, df: &DataFrame) -> Result<DatasetProfile> {
        let column_profiles = df
            .get_column_names()
            .into_iter()
            .map(|name| self.profile_column(df, name.as_str()))
            .collect::<Result<Vec<_>>>()?;

        let total_missing = column_profiles.iter().map(|p| p.missing_count).sum();
        let duplicate_rows = DuplicateResolver::count_duplicates(df, None)?;

        Ok(DatasetProfile {
            rows: df.height(),
            columns: df.width(),
            column_profiles,
            total_missing,
            duplicate_rows,
        })
    }

    pub fn profile_column(&self, df: &DataFrame, name: &str) -> Result<ColumnProfile> {
        let series = column_series(df, name)?;
        let rows = df.height();
        let kind = column_kind(series.dtype());
        let texts = string_values(series)?;

        let mut profile = ColumnProfile {
            name: name.to_string(),
            dtype: series.dtype().to_string(),
            kind,
            missing_count: series.null_count(),
            missing_percent: 0.0,
            unique_count: texts.iter().flatten().collect::<HashSet<_>>().len(),
            sample_values: self.sample_values(&texts),
            numeric: None,
            outliers: None,
            likely_categorical: false,
            most_frequent: None,
            frequencies: Vec::new(),
        };

        match kind {
            ColumnKind::Numeric => {
                let values = numeric_values(series)?;
                let present: Vec<f64> = values.iter().flatten().copied().collect();
                profile.missing_count = rows - present.len();
                profile.numeric = statistics::numeric_stats(&present);
                profile.outliers = Some(self.outlier_profile(&present, rows));
            }
            ColumnKind::Categorical => {
                let table = statistics::frequency_table(&texts);
                profile.most_frequent = table.first().cloned();
                let cap = (self.categorical_max_unique as f64)
                    .min(self.categorical_max_ratio * rows as f64);
                profile.likely_categorical = profile.unique_count > 0 && profile.unique_count as f64 <= cap;
                if profile.likely_categorical {
                    profile.frequencies = table;
                }
            }
            ColumnKind::Other => {}
        }

        if rows > 0 {
            profile.missing_percent = profile.missing_count as f64 / rows as f64 * 100.0;
        }

        Ok(profile)
    }

    fn outlier_profile(&self, present: &[f64], rows: usize) -> OutlierProfile {
        if present.len() < self.min_outlier_sample || rows == 0 {
            return OutlierProfile::default();
        }
        let count = statistics::iqr_outlier_count(present, self.iqr_multiplier);
        OutlierProfile {
            count,
            percent: count as f64 / rows as f64 * 100.0,
        }
    }

    /// Seeded sample so repeated profiles of the same data agree.
    fn sample_values(&self, texts: &[Option<String>]) -> Vec<String> {
        let present: Vec<&String> = texts.iter().flatten().collect();
        let mut rng = StdRng::seed_from_u64(42);
        present
            .choose_multiple(&mut rng, self.sample_size.min(present.len()))
            .map(|s| (*s).clone())
            .collect()
    }
}
