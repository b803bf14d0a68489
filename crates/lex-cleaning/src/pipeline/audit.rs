//! Append-only audit log.

use serde::Serialize;

use crate::types::{AuditEntry, AuditOperation};

/// Ordered record of every step a run applied or skipped.
///
/// Entries can only be appended; the log is handed over to the report
/// as a plain `Vec` once the run finishes.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: AuditEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows removed across all row-removing operations.
    pub fn rows_removed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.operation.removes_rows())
            .map(|e| e.rows_affected)
            .sum()
    }

    /// Entries of one kind, in log order.
    pub fn of_kind(&self, operation: AuditOperation) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(move |e| e.operation == operation)
    }

    pub fn into_entries(self) -> Vec<AuditEntry> {
        self.entries
    }
}
