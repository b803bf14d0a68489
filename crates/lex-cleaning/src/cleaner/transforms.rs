//! Free-form value transformation directives.
//!
//! Recommendations carry directives as plain phrases ("round to 2 decimals",
//! "convert to lowercase"). They are parsed into [`ValueTransformation`] and
//! applied cell by cell.

use anyhow::Result;
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::fmt;

use crate::utils::{
    column_series, count_changed, float_series, is_integer_dtype, is_numeric_dtype,
    is_text_dtype, numeric_values, string_values,
};

const DEFAULT_ROUND_DECIMALS: u32 = 2;
const MAX_ROUND_DECIMALS: u32 = 15;

static POSITIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(positive|non-?negative|absolute|abs)\b").expect("Invalid regex: positive")
});
static INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(integer|int|whole numbers?)\b").expect("Invalid regex: integer"));
static ROUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bround(?:ed|ing)?\b(?:\D*?(\d+)\s*(?:decimal|dp|digit|place))?")
        .expect("Invalid regex: round")
});
static LOWER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\blower\s*-?\s*case\b|\blowercase|\bto lower\b").expect("Invalid regex: lower"));
static UPPER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bupper\s*-?\s*case\b|\buppercase|\bto upper\b").expect("Invalid regex: upper"));
static TRIM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(trim|strip|whitespace)").expect("Invalid regex: trim"));

/// A recognized value transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTransformation {
    /// Replace numbers by their absolute value.
    EnsurePositive,
    Round { decimals: u32 },
    /// Round, then store as Int64.
    ToInteger,
    Lowercase,
    Uppercase,
    TrimWhitespace,
}

impl ValueTransformation {
    /// Parse a free-form directive; `None` when nothing is recognized.
    pub fn parse(directive: &str) -> Option<Self> {
        let text = directive.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }

        if POSITIVE.is_match(&text) {
            return Some(Self::EnsurePositive);
        }
        if INTEGER.is_match(&text) {
            return Some(Self::ToInteger);
        }
        if let Some(caps) = ROUND.captures(&text) {
            let decimals = caps
                .get(1)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(DEFAULT_ROUND_DECIMALS)
                .min(MAX_ROUND_DECIMALS);
            return Some(Self::Round { decimals });
        }
        if LOWER.is_match(&text) {
            return Some(Self::Lowercase);
        }
        if UPPER.is_match(&text) {
            return Some(Self::Uppercase);
        }
        if TRIM.is_match(&text) {
            return Some(Self::TrimWhitespace);
        }
        None
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::EnsurePositive | Self::Round { .. } | Self::ToInteger)
    }
}

impl fmt::Display for ValueTransformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnsurePositive => f.write_str("ensure positive"),
            Self::Round { decimals } => write!(f, "round to {decimals} decimals"),
            Self::ToInteger => f.write_str("convert to integer"),
            Self::Lowercase => f.write_str("lowercase"),
            Self::Uppercase => f.write_str("uppercase"),
            Self::TrimWhitespace => f.write_str("trim whitespace"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub data: DataFrame,
    /// Cells whose value changed.
    pub changed: usize,
    /// False when the directive does not fit the column's dtype.
    pub applicable: bool,
}

impl TransformOutcome {
    fn not_applicable(df: &DataFrame) -> Self {
        Self {
            data: df.clone(),
            changed: 0,
            applicable: false,
        }
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Apply one transformation to `column`, returning a new frame.
pub fn apply(
    df: &DataFrame,
    column: &str,
    transformation: ValueTransformation,
) -> Result<TransformOutcome> {
    let series = column_series(df, column)?;
    let dtype = series.dtype().clone();

    if transformation.is_numeric() {
        if !is_numeric_dtype(&dtype) {
            return Ok(TransformOutcome::not_applicable(df));
        }
        apply_numeric(df, column, series, &dtype, transformation)
    } else {
        if !is_text_dtype(&dtype) {
            return Ok(TransformOutcome::not_applicable(df));
        }
        apply_text(df, column, series, transformation)
    }
}

fn apply_numeric(
    df: &DataFrame,
    column: &str,
    series: &Series,
    dtype: &DataType,
    transformation: ValueTransformation,
) -> Result<TransformOutcome> {
    let before = numeric_values(series)?;
    let after: Vec<Option<f64>> = before
        .iter()
        .map(|v| {
            v.map(|x| match transformation {
                ValueTransformation::EnsurePositive => x.abs(),
                ValueTransformation::Round { decimals } => round_to(x, decimals),
                _ => x.round(),
            })
        })
        .collect();
    let changed = count_changed(&before, &after);

    let target = match transformation {
        ValueTransformation::ToInteger => DataType::Int64,
        _ if is_integer_dtype(dtype) => dtype.clone(),
        _ => DataType::Float64,
    };
    if changed == 0 && &target == dtype {
        return Ok(TransformOutcome {
            data: df.clone(),
            changed: 0,
            applicable: true,
        });
    }

    let rebuilt = float_series(column, after).cast(&target)?;
    let mut data = df.clone();
    data.replace(column, rebuilt)?;
    Ok(TransformOutcome {
        data,
        changed,
        applicable: true,
    })
}

fn apply_text(
    df: &DataFrame,
    column: &str,
    series: &Series,
    transformation: ValueTransformation,
) -> Result<TransformOutcome> {
    let before = string_values(series)?;
    let mut changed = 0;
    let after: Vec<Option<String>> = before
        .iter()
        .map(|v| {
            v.as_ref().map(|s| {
                let out = match transformation {
                    ValueTransformation::Lowercase => s.to_lowercase(),
                    ValueTransformation::Uppercase => s.to_uppercase(),
                    _ => s.trim().to_string(),
                };
                if &out != s {
                    changed += 1;
                }
                out
            })
        })
        .collect();

    if changed == 0 {
        return Ok(TransformOutcome {
            data: df.clone(),
            changed: 0,
            applicable: true,
        });
    }

    let mut data = df.clone();
    data.replace(column, Series::new(column.into(), after))?;
    Ok(TransformOutcome {
        data,
        changed,
        applicable: true,
    })
}
