//! Contract between the import engine and the relational store.
//!
//! The engine never talks SQL directly. It asks the store whether a table
//! exists, creates tables, manages the savepoint that bounds one file's
//! import, and inserts rows through a [`PreparedInsert`] that is prepared
//! once per file and reused for every row.

use itertools::Itertools;
use thiserror::Error;

use crate::schema::FieldList;

/// Failure reported by the store, carrying its native message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnInfo {
    pub is_integer: bool,
    pub not_null: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableDescriptor {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// A reusable parameterized insert. Positions are 0-based.
pub trait PreparedInsert {
    /// Binds `value` at `index`; `None` binds SQL NULL.
    fn bind(&mut self, index: usize, value: Option<&str>) -> Result<(), StoreError>;

    fn execute(&mut self) -> Result<(), StoreError>;

    fn reset(&mut self);

    /// Sets every parameter back to NULL.
    fn clear_bindings(&mut self);

    fn finalize(self: Box<Self>);
}

pub trait Store {
    /// Describes the table called `name`, or `None` when no such table exists.
    fn object_exists(&self, name: &str) -> Result<Option<TableDescriptor>, StoreError>;

    fn create_table(&self, name: &str, fields: &FieldList) -> Result<(), StoreError>;

    fn begin_savepoint(&self, name: &str) -> Result<(), StoreError>;

    /// Undoes everything since `begin_savepoint(name)` and discards the savepoint.
    fn rollback_to_savepoint(&self, name: &str) -> Result<(), StoreError>;

    /// Keeps everything since `begin_savepoint(name)` and discards the savepoint.
    fn release_savepoint(&self, name: &str) -> Result<(), StoreError>;

    fn prepare_insert(
        &self,
        table: &str,
        column_count: usize,
    ) -> Result<Box<dyn PreparedInsert + '_>, StoreError>;

    fn escape_identifier(&self, name: &str) -> String {
        escape_identifier(name)
    }
}

/// Double-quotes `name` for use as an SQL identifier.
pub fn escape_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `INSERT INTO <table> VALUES(?1,?2,...)` with one positional placeholder
/// per column.
pub fn insert_statement(escaped_table: &str, column_count: usize) -> String {
    let placeholders = (1..=column_count).map(|idx| format!("?{idx}")).join(",");
    format!("INSERT INTO {escaped_table} VALUES({placeholders})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_identifier_doubles_embedded_quotes() {
        assert_eq!(escape_identifier("orders"), "\"orders\"");
        assert_eq!(escape_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn insert_statement_has_one_placeholder_per_column() {
        assert_eq!(
            insert_statement("\"t\"", 3),
            "INSERT INTO \"t\" VALUES(?1,?2,?3)"
        );
    }
}
