//! Missing-value resolution.
//!
//! Strategies: leave as-is, drop the row, or fill with the column's mean,
//! median or mode.

mod statistical;

pub use statistical::{ImputationOutcome, StatisticalImputer};
