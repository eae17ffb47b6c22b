//! Session-scoped result state.
//!
//! The result table is shared between the batch surface (which writes it)
//! and the dashboard surface (which only reads it). Instead of a
//! process-wide slot, the table lives in an explicit [`Session`] context
//! object passed to both: created empty at session start, replaced
//! wholesale after each batch run, read-only from the analytics view.

use crate::models::ResultTable;

/// The in-memory session state. Lifetime = one interactive session;
/// nothing is persisted across restarts.
#[derive(Debug, Default)]
pub struct Session {
    table: ResultTable,
}

impl Session {
    /// Start a session with an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session table wholesale with the latest batch result.
    pub fn publish(&mut self, table: ResultTable) {
        self.table = table;
    }

    /// Read-only view of the current table for the analytics surface.
    pub fn table(&self) -> &ResultTable {
        &self.table
    }

    /// Whether a batch has produced anything to show yet.
    pub fn has_data(&self) -> bool {
        !self.table.is_empty()
    }
}
