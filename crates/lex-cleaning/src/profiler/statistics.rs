//! Descriptive statistics over plain value slices.
//!
//! Quantiles use linear interpolation between closest ranks
//! (`pos = q * (n - 1)`), and the standard deviation is the sample
//! estimator (ddof = 1). None of these functions produce NaN for finite input.

use std::collections::HashMap;

use crate::types::{NumericStats, ValueFrequency};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation; 0.0 when fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Quantile of an already sorted slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile_sorted(&sorted(values), 0.5)
}

/// First and third quartiles.
pub fn quartiles(values: &[f64]) -> Option<(f64, f64)> {
    let sorted = sorted(values);
    Some((quantile_sorted(&sorted, 0.25)?, quantile_sorted(&sorted, 0.75)?))
}

pub fn numeric_stats(values: &[f64]) -> Option<NumericStats> {
    let sorted = sorted(values);
    let (min, max) = (*sorted.first()?, *sorted.last()?);
    Some(NumericStats {
        min,
        max,
        mean: mean(&sorted)?,
        median: quantile_sorted(&sorted, 0.5)?,
        std: sample_std(&sorted),
    })
}

/// Values outside `[Q1 - m*IQR, Q3 + m*IQR]`.
pub fn iqr_outlier_count(values: &[f64], multiplier: f64) -> usize {
    let Some((q1, q3)) = quartiles(values) else {
        return 0;
    };
    let iqr = q3 - q1;
    let (lower, upper) = (q1 - multiplier * iqr, q3 + multiplier * iqr);
    values.iter().filter(|&&v| v < lower || v > upper).count()
}

/// Counts of non-missing values, most frequent first; ties keep first appearance.
pub fn frequency_table<S: AsRef<str>>(values: &[Option<S>]) -> Vec<ValueFrequency> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values.iter().flatten() {
        let value = value.as_ref();
        let count = counts.entry(value).or_insert_with(|| {
            order.push(value);
            0
        });
        *count += 1;
    }

    let mut table: Vec<ValueFrequency> = order
        .into_iter()
        .map(|value| ValueFrequency {
            value: value.to_string(),
            count: counts[value],
        })
        .collect();
    // stable sort keeps first-appearance order among equal counts
    table.sort_by(|a, b| b.count.cmp(&a.count));
    table
}
