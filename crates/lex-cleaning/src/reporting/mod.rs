//! Report rendering and output.
//!
//! [`ReportFormatter`] turns a [`CleaningReport`](crate::types::CleaningReport)
//! into a short text summary. [`ReportGenerator`] handles JSON and files:
//!
//! ```rust,ignore
//! use lex_cleaning::reporting::ReportGenerator;
//!
//! let generator = ReportGenerator::new("outputs");
//! let document = ReportGenerator::build_document(&result.report, Some("data.csv"), None, None);
//! generator.write_report_to_file(&document, "data")?;
//! ```

mod formatter;
mod generator;

pub use formatter::ReportFormatter;
pub use generator::{MinimalReport, ReportDocument, ReportGenerator};
