//! Plain-text rendering of a [`CleaningReport`].

use indexmap::IndexMap;

use crate::config::{MissingValueStrategy, OutlierAction, OutlierMethod};
use crate::types::{AuditOperation, CleaningReport};

/// Renders reports as short, deterministic prose.
///
/// Sections with no effect are left out entirely:
///
/// ```text
/// Dataset cleaning summary:
/// - Original size: 5 rows, 2 columns
/// - Removed 1 duplicate rows
/// - Handled 1 missing values:
///   * median: price
/// - Outlier handling (iqr, cap):
///   * price: 1 outlier capped
/// - Final size: 4 rows, 2 columns
/// ```
pub struct ReportFormatter;

impl ReportFormatter {
    pub fn render(report: &CleaningReport) -> String {
        let mut lines = vec![
            "Dataset cleaning summary:".to_string(),
            format!(
                "- Original size: {} rows, {} columns",
                report.original_rows, report.original_columns
            ),
        ];

        if report.duplicates_removed > 0 {
            lines.push(format!(
                "- Removed {} duplicate rows",
                report.duplicates_removed
            ));
        }

        lines.extend(Self::missing_section(report));
        lines.extend(Self::outlier_section(report));

        let transformed: usize = report
            .audit_log
            .iter()
            .filter(|e| e.operation == AuditOperation::ValuesTransformed)
            .map(|e| e.rows_affected)
            .sum();
        if transformed > 0 {
            lines.push(format!("- Transformed {transformed} values"));
        }

        lines.push(format!(
            "- Final size: {} rows, {} columns",
            report.final_rows, report.final_columns
        ));
        lines.join("\n")
    }

    fn missing_section(report: &CleaningReport) -> Vec<String> {
        let mut groups: IndexMap<MissingValueStrategy, Vec<&str>> = IndexMap::new();
        for (column, strategy) in &report.missing_values_handled {
            if report.missing_values_before.get(column).copied().unwrap_or(0) == 0 {
                continue;
            }
            groups.entry(*strategy).or_default().push(column.as_str());
        }

        if groups.is_empty() {
            return Vec::new();
        }

        // counted after deduplication, so taken from the audit log
        let handled: usize = report
            .audit_log
            .iter()
            .filter(|e| {
                matches!(
                    e.operation,
                    AuditOperation::MissingValuesImputed | AuditOperation::MissingRowsDropped
                )
            })
            .map(|e| e.rows_affected)
            .sum();

        let mut lines = vec![format!("- Handled {handled} missing values:")];
        lines.extend(
            groups
                .iter()
                .map(|(strategy, columns)| format!("  * {}: {}", strategy, columns.join(", "))),
        );
        lines
    }

    fn outlier_section(report: &CleaningReport) -> Vec<String> {
        let mut groups: IndexMap<(OutlierMethod, OutlierAction), Vec<(&str, usize)>> =
            IndexMap::new();
        for (column, summary) in &report.outliers_handled {
            if summary.count == 0 {
                continue;
            }
            groups
                .entry((summary.method, summary.action))
                .or_default()
                .push((column.as_str(), summary.count));
        }

        let mut lines = Vec::new();
        for ((method, action), columns) in &groups {
            lines.push(format!("- Outlier handling ({method}, {action}):"));
            let verb = match action {
                OutlierAction::None => "flagged",
                OutlierAction::Remove => "removed",
                OutlierAction::Cap => "capped",
            };
            for (column, count) in columns {
                let noun = if *count == 1 { "outlier" } else { "outliers" };
                lines.push(format!("  * {column}: {count} {noun} {verb}"));
            }
        }
        lines
    }
}
