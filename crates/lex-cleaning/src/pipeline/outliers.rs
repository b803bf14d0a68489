//! Outlier detection and treatment for numeric columns.
//!
//! Bounds are computed once from the column as it is before any change and
//! decide which values are flagged. IQR caps clip to those bounds; quartiles
//! do not move when extremes are clipped, so a second pass flags nothing.
//!
//! Mean and standard deviation do move, so z-score capping clips to the fences
//! of the column as it will be after capping, solved in closed form.
//! Re-applying the same method and threshold then flags nothing.

use anyhow::Result;
use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{OutlierAction, OutlierMethod};
use crate::profiler::statistics;
use crate::utils::{column_series, float_series, is_numeric_dtype, keep_rows, numeric_values};

/// Relative slack on z-score fences, scaled by `|mean| + std`.
const FENCE_TOLERANCE: f64 = 1e-9;


/// Detection bounds for one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum OutlierBounds {
    ZScore {
        mean: f64,
        std: f64,
        threshold: f64,
        lower: f64,
        upper: f64,
    },
    Iqr {
        q1: f64,
        q3: f64,
        iqr: f64,
        multiplier: f64,
        lower: f64,
        upper: f64,
    },
}

impl OutlierBounds {
    pub fn lower(&self) -> f64 {
        match self {
            Self::ZScore { lower, .. } | Self::Iqr { lower, .. } => *lower,
        }
    }

    pub fn upper(&self) -> f64 {
        match self {
            Self::ZScore { upper, .. } | Self::Iqr { upper, .. } => *upper,
        }
    }

    pub fn method(&self) -> OutlierMethod {
        match self {
            Self::ZScore { .. } => OutlierMethod::ZScore,
            Self::Iqr { .. } => OutlierMethod::Iqr,
        }
    }

    #[inline]
    pub fn is_outlier(&self, value: f64) -> bool {
        let slack = match self {
            Self::ZScore { mean, std, .. } => FENCE_TOLERANCE * (mean.abs() + std),
            Self::Iqr { .. } => 0.0,
        };
        value < self.lower() - slack || value > self.upper() + slack
    }

    /// Clip to the bound on the value's side.
    #[inline]
    pub fn cap(&self, value: f64) -> f64 {
        value.clamp(self.lower(), self.upper())
    }
}

/// Result of applying an outlier policy to one column.
#[derive(Debug, Clone)]
pub struct OutlierOutcome {
    pub data: DataFrame,
    /// Detection bounds of the unmodified column.
    pub bounds: Option<OutlierBounds>,
    /// Fences values were clipped to; only differs from `bounds` for z-score caps.
    pub cap_bounds: Option<OutlierBounds>,
    /// Values that tested as outliers.
    pub flagged: usize,
    /// Rows removed (`remove`) or cells rewritten (`cap`).
    pub changed: usize,
    /// False for non-numeric columns.
    pub applicable: bool,
}

/// Handles outlier detection and treatment.
pub struct OutlierHandler;

impl OutlierHandler {
    /// Compute bounds over non-missing values.
    ///
    /// Returns `None` when nothing can be flagged: no values, `method = none`,
    /// or a z-score over a column with zero spread.
    pub fn compute_bounds(
        values: &[f64],
        method: OutlierMethod,
        threshold: f64,
    ) -> Option<OutlierBounds> {
        if values.is_empty() || !threshold.is_finite() {
            return None;
        }

        match method {
            OutlierMethod::None => None,
            OutlierMethod::ZScore => {
                let mean = statistics::mean(values)?;
                let std = statistics::sample_std(values);
                if std == 0.0 || !std.is_finite() {
                    return None;
                }
                Some(OutlierBounds::ZScore {
                    mean,
                    std,
                    threshold,
                    lower: mean - threshold * std,
                    upper: mean + threshold * std,
                })
            }
            OutlierMethod::Iqr => {
                let (q1, q3) = statistics::quartiles(values)?;
                let iqr = q3 - q1;
                Some(OutlierBounds::Iqr {
                    q1,
                    q3,
                    iqr,
                    multiplier: threshold,
                    lower: q1 - threshold * iqr,
                    upper: q3 + threshold * iqr,
                })
            }
        }
    }

    /// Bounds for a dataframe column; `None` for non-numeric columns.
    pub fn column_bounds(
        df: &DataFrame,
        column: &str,
        method: OutlierMethod,
        threshold: f64,
    ) -> Result<Option<OutlierBounds>> {
        let series = column_series(df, column)?;
        if !is_numeric_dtype(series.dtype()) {
            return Ok(None);
        }
        let present: Vec<f64> = numeric_values(series)?.into_iter().flatten().collect();
        Ok(Self::compute_bounds(&present, method, threshold))
    }

    /// Per-row outlier membership; nulls and non-numeric columns are never flagged.
    pub fn detect(
        df: &DataFrame,
        column: &str,
        method: OutlierMethod,
        threshold: f64,
    ) -> Result<Vec<bool>> {
        let bounds = Self::column_bounds(df, column, method, threshold)?;
        Self::mask(df, column, bounds.as_ref())
    }

    /// Detect with fresh bounds and apply `action`.
    pub fn apply(
        df: &DataFrame,
        column: &str,
        method: OutlierMethod,
        action: OutlierAction,
        threshold: f64,
    ) -> Result<OutlierOutcome> {
        let series = column_series(df, column)?;
        if !is_numeric_dtype(series.dtype()) {
            return Ok(OutlierOutcome {
                data: df.clone(),
                bounds: None,
                cap_bounds: None,
                flagged: 0,
                changed: 0,
                applicable: false,
            });
        }

        let bounds = Self::column_bounds(df, column, method, threshold)?;
        if method == OutlierMethod::ZScore && action == OutlierAction::Cap {
            return Self::cap_zscore(df, column, bounds, threshold);
        }
        Self::apply_with_bounds(df, column, bounds, action)
    }

    /// Apply `action` using previously computed bounds.
    pub fn apply_with_bounds(
        df: &DataFrame,
        column: &str,
        bounds: Option<OutlierBounds>,
        action: OutlierAction,
    ) -> Result<OutlierOutcome> {
        let series = column_series(df, column)?;
        let applicable = is_numeric_dtype(series.dtype());
        let unchanged = |flagged| OutlierOutcome {
            data: df.clone(),
            bounds,
            cap_bounds: None,
            flagged,
            changed: 0,
            applicable,
        };

        let Some(b) = bounds.filter(|_| applicable) else {
            return Ok(unchanged(0));
        };

        let values = numeric_values(series)?;
        let flags: Vec<bool> = values
            .iter()
            .map(|v| v.is_some_and(|x| b.is_outlier(x)))
            .collect();
        let flagged = flags.iter().filter(|f| **f).count();

        if flagged == 0 {
            return Ok(unchanged(0));
        }

        match action {
            OutlierAction::None => Ok(unchanged(flagged)),
            OutlierAction::Remove => {
                let keep: Vec<bool> = flags.iter().map(|f| !f).collect();
                let data = keep_rows(df, &keep)?;
                debug!("Removed {} outlier rows from '{}'", flagged, column);
                Ok(OutlierOutcome {
                    data,
                    bounds,
                    cap_bounds: None,
                    flagged,
                    changed: flagged,
                    applicable,
                })
            }
            OutlierAction::Cap => {
                let capped: Vec<Option<f64>> = values
                    .iter()
                    .map(|v| v.map(|x| b.cap(x)))
                    .collect();
                let mut data = df.clone();
                data.replace(column, float_series(column, capped))?;
                debug!(
                    "Capped {} outliers in '{}' to [{:.4}, {:.4}]",
                    flagged,
                    column,
                    b.lower(),
                    b.upper()
                );
                Ok(OutlierOutcome {
                    data,
                    bounds,
                    cap_bounds: bounds,
                    flagged,
                    changed: flagged,
                    applicable,
                })
            }
        }
    }

    /// Cap to the fences of the column as it will be after capping.
    ///
    /// With `H` values capped high, `L` capped low and `r` left alone, the
    /// settled deviation solves `(n-1)·s² = Q + t²·s²·((H-L)²/r + H + L)`,
    /// where `Q` is the squared spread of the untouched values. Values that
    /// fall outside the solved fences join the capped sets until the sets
    /// stop changing. `flagged` counts outliers against `bounds`; `changed`
    /// can be larger when settled fences pull in further values.
    fn cap_zscore(
        df: &DataFrame,
        column: &str,
        bounds: Option<OutlierBounds>,
        threshold: f64,
    ) -> Result<OutlierOutcome> {
        let values = numeric_values(column_series(df, column)?)?;
        let flagged = bounds.map_or(0, |b| {
            values.iter().flatten().filter(|x| b.is_outlier(**x)).count()
        });

        let Some(initial) = bounds.filter(|_| flagged > 0) else {
            return Ok(OutlierOutcome {
                data: df.clone(),
                bounds,
                cap_bounds: None,
                flagged: 0,
                changed: 0,
                applicable: true,
            });
        };

        let present: Vec<f64> = values.iter().flatten().copied().collect();
        let fences = Self::settle_zscore(&present, initial, threshold);
        let capped: Vec<Option<f64>> = values
            .iter()
            .map(|v| v.map(|x| x.clamp(fences.lower(), fences.upper())))
            .collect();

        let changed = values.iter().zip(&capped).filter(|(a, b)| a != b).count();
        let mut data = df.clone();
        data.replace(column, float_series(column, capped))?;
        debug!(
            "Capped {} z-score outliers in '{}' to [{:.4}, {:.4}] ({} cells changed)",
            flagged,
            column,
            fences.lower(),
            fences.upper(),
            changed
        );

        Ok(OutlierOutcome {
            data,
            bounds,
            cap_bounds: Some(fences),
            flagged,
            changed,
            applicable: true,
        })
    }

    fn settle_zscore(values: &[f64], initial: OutlierBounds, threshold: f64) -> OutlierBounds {
        let n = values.len() as f64;
        let t2 = threshold * threshold;
        let fence = |mean: f64, std: f64| OutlierBounds::ZScore {
            mean,
            std,
            threshold,
            lower: mean - threshold * std,
            upper: mean + threshold * std,
        };

        let mut high: Vec<bool> = values
            .iter()
            .map(|x| *x > initial.upper() && initial.is_outlier(*x))
            .collect();
        let mut low: Vec<bool> = values
            .iter()
            .map(|x| *x < initial.lower() && initial.is_outlier(*x))
            .collect();
        let mut settled = initial;

        for _ in 0..=values.len() {
            let inner: Vec<f64> = values
                .iter()
                .zip(high.iter().zip(&low))
                .filter(|(_, (h, l))| !**h && !**l)
                .map(|(x, _)| *x)
                .collect();

            // Everything capped, or no spread left to solve for: all values meet at the mean.
            let Some(mu) = statistics::mean(&inner) else {
                return fence(statistics::mean(values).unwrap_or(0.0), 0.0);
            };
            let r = inner.len() as f64;
            let kh = high.iter().filter(|h| **h).count() as f64;
            let kl = low.iter().filter(|l| **l).count() as f64;
            let q: f64 = inner.iter().map(|x| (x - mu).powi(2)).sum();
            let denom = (n - 1.0) - t2 * ((kh - kl).powi(2) / r + kh + kl);
            if denom <= 0.0 {
                return fence(mu, 0.0);
            }

            let std = (q / denom).sqrt();
            let mean = mu + (kh - kl) * threshold * std / r;
            settled = fence(mean, std);

            let next_high: Vec<bool> = values.iter().map(|x| *x > settled.upper()).collect();
            let next_low: Vec<bool> = values.iter().map(|x| *x < settled.lower()).collect();
            if next_high == high && next_low == low {
                return settled;
            }
            high = next_high;
            low = next_low;
        }

        warn!("Z-score caps did not settle; using the last solved fences");
        settled
    }

    fn mask(df: &DataFrame, column: &str, bounds: Option<&OutlierBounds>) -> Result<Vec<bool>> {
        let series = column_series(df, column)?;
        let Some(b) = bounds else {
            return Ok(vec![false; series.len()]);
        };
        Ok(numeric_values(series)?
            .iter()
            .map(|v| v.is_some_and(|x| b.is_outlier(x)))
            .collect())
    }
}
