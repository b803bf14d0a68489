//! Identity-key selection and first-kept duplicate removal.

use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

use crate::error::{CleaningError, Result};
use crate::utils::{column_series, keep_rows, string_values};

static TOKEN_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("Invalid regex: token split"));

/// `customerId` -> `customer_Id`, `IDNumber` -> `ID_Number`.
static CAMEL_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([a-z0-9])([A-Z])|([A-Z])([A-Z][a-z])").expect("Invalid regex: camel boundary")
});

/// Name-token groups and the score each contributes (once per group).
const NAME_GROUPS: [(&[&str], u32); 3] = [
    (&["id", "code", "key", "number"], 5),
    (&["name", "customer", "user", "client", "person"], 3),
    (&["email", "phone", "contact"], 4),
];

/// Identifier words also recognized at the end of a glued token (`userid`).
const SUFFIX_WORDS: [&str; 2] = ["id", "key"];

/// Shortest prefix in front of a suffix word; keeps `paid` and `valid` out.
const MIN_SUFFIX_PREFIX: usize = 4;

/// Score at which a column joins the identity key on its own.
const KEY_SCORE: u32 = 5;
const MAX_FALLBACK_KEY_COLUMNS: usize = 3;

const NULL_MARKER: &str = "\u{0}";
const FIELD_SEPARATOR: char = '\u{1f}';

/// Result of a deduplication pass.
#[derive(Debug, Clone)]
pub struct DuplicateOutcome {
    pub data: DataFrame,
    pub removed: usize,
    pub key: Vec<String>,
}

pub struct DuplicateResolver;

impl DuplicateResolver {
    /// Score a column name by identity-like tokens.
    ///
    /// camelCase is split before lowercasing (`CustomerID` is `customer` +
    /// `id`). Short words must match a whole token, except `id` and `key`,
    /// which also match the end of a longer token (`userid`). Words of four or
    /// more letters may appear anywhere in a token (`customername`).
    pub fn name_score(column: &str) -> u32 {
        let split = CAMEL_BOUNDARY.replace_all(column, "${1}${3}_${2}${4}");
        let lower = split.to_lowercase();
        let tokens: Vec<&str> = TOKEN_SPLIT.split(&lower).filter(|t| !t.is_empty()).collect();

        NAME_GROUPS
            .iter()
            .filter(|(words, _)| {
                words
                    .iter()
                    .any(|word| tokens.iter().any(|token| Self::token_matches(token, word)))
            })
            .map(|(_, score)| score)
            .sum()
    }

    fn token_matches(token: &str, word: &str) -> bool {
        if token == word {
            return true;
        }
        if word.len() >= 4 {
            return token.contains(word);
        }
        SUFFIX_WORDS.contains(&word)
            && token.len() >= word.len() + MIN_SUFFIX_PREFIX
            && token.ends_with(word)
    }

    /// Score contributed by the share of distinct non-missing values.
    pub fn uniqueness_score(ratio: f64) -> u32 {
        if ratio >= 1.0 {
            6
        } else if ratio > 0.8 {
            4
        } else if ratio > 0.5 {
            3
        } else {
            0
        }
    }

    /// Pick the identity columns used to decide whether two rows are duplicates.
    ///
    /// Columns scoring at least 5 form the key. Without any, the up to three
    /// best positive-scoring columns are used, and failing that every column.
    pub fn select_key(df: &DataFrame) -> Result<Vec<String>> {
        let rows = df.height();
        let mut scored: Vec<(String, u32)> = Vec::with_capacity(df.width());

        for name in df.get_column_names() {
            let series = column_series(df, name.as_str())?;
            let distinct = string_values(series)?
                .into_iter()
                .flatten()
                .collect::<HashSet<_>>()
                .len();
            let ratio = if rows > 0 {
                distinct as f64 / rows as f64
            } else {
                0.0
            };
            let score = Self::name_score(name.as_str()) + Self::uniqueness_score(ratio);
            scored.push((name.to_string(), score));
        }

        let strong: Vec<String> = scored
            .iter()
            .filter(|(_, score)| *score >= KEY_SCORE)
            .map(|(name, _)| name.clone())
            .collect();
        if !strong.is_empty() {
            return Ok(strong);
        }

        let mut positive: Vec<&(String, u32)> = scored.iter().filter(|(_, s)| *s > 0).collect();
        positive.sort_by(|a, b| b.1.cmp(&a.1));
        if !positive.is_empty() {
            return Ok(positive
                .into_iter()
                .take(MAX_FALLBACK_KEY_COLUMNS)
                .map(|(name, _)| name.clone())
                .collect());
        }

        Ok(scored.into_iter().map(|(name, _)| name).collect())
    }

    /// Drop every row whose key repeats an earlier row, keeping row order.
    ///
    /// With `key = None` (or empty) the key comes from [`Self::select_key`].
    /// An explicit key naming an absent column is an input error.
    pub fn remove_duplicates(df: &DataFrame, key: Option<&[String]>) -> Result<DuplicateOutcome> {
        let key = match key {
            Some(cols) if !cols.is_empty() => {
                Self::check_columns(df, cols)?;
                cols.to_vec()
            }
            _ => Self::select_key(df)?,
        };

        let keep = Self::first_occurrence_mask(df, &key)?;
        let removed = keep.iter().filter(|k| !**k).count();
        let data = if removed > 0 {
            keep_rows(df, &keep)?
        } else {
            df.clone()
        };

        debug!("Removed {} duplicate rows using key {:?}", removed, key);
        Ok(DuplicateOutcome { data, removed, key })
    }

    /// Count rows that repeat an earlier row under `key`; all columns when `None`.
    pub fn count_duplicates(df: &DataFrame, key: Option<&[String]>) -> Result<usize> {
        let key: Vec<String> = match key {
            Some(cols) if !cols.is_empty() => {
                Self::check_columns(df, cols)?;
                cols.to_vec()
            }
            _ => df
                .get_column_names()
                .into_iter()
                .map(|n| n.to_string())
                .collect(),
        };
        let keep = Self::first_occurrence_mask(df, &key)?;
        Ok(keep.iter().filter(|k| !**k).count())
    }

    fn check_columns(df: &DataFrame, cols: &[String]) -> Result<()> {
        for col in cols {
            if df.column(col).is_err() {
                return Err(CleaningError::ColumnNotFound(col.clone()));
            }
        }
        Ok(())
    }

    fn first_occurrence_mask(df: &DataFrame, key: &[String]) -> Result<Vec<bool>> {
        let rows = df.height();
        let mut row_keys = vec![String::new(); rows];

        for (i, col) in key.iter().enumerate() {
            let values = string_values(column_series(df, col)?)?;
            for (row_key, value) in row_keys.iter_mut().zip(values) {
                if i > 0 {
                    row_key.push(FIELD_SEPARATOR);
                }
                row_key.push_str(value.as_deref().unwrap_or(NULL_MARKER));
            }
        }

        let mut seen = HashSet::with_capacity(rows);
        Ok(row_keys.into_iter().map(|k| seen.insert(k)).collect())
    }
}
