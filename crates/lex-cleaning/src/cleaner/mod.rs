//! Row- and value-level cleaning operations.
//!
//! - Duplicate resolution with heuristic identity keys
//! - Value transformation directives (rounding, casing, trimming, ...)

mod duplicates;
pub mod transforms;

pub use duplicates::{DuplicateOutcome, DuplicateResolver};
pub use transforms::{TransformOutcome, ValueTransformation};
