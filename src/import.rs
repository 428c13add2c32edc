//! Import transaction engine.
//!
//! One call to [`Importer::import`] moves one source into one table:
//!
//! 1. infer the field list from the first rows (an empty list ends the run
//!    with [`ImportResult::NothingToImport`])
//! 2. resolve the target: create a new table, or append to an existing one
//!    with the same column count
//! 3. open a uniquely named savepoint
//! 4. create the table when needed
//! 5. prepare one insert statement and reuse it for every row
//! 6. stream the full source through the tokenizer, inserting row by row
//! 7. on failure or cancellation roll back to the savepoint; on success leave
//!    the savepoint open for the caller to release
//!
//! Errors raised before the savepoint exists are returned as `Err`; failures
//! inside the row loop are reported in the [`ImportOutcome`] after rollback.

use std::fmt;

use log::{debug, info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{ImportError, Result},
    io_utils::CsvSource,
    progress::ProgressSink,
    schema::{self, DEFAULT_SAMPLE_ROWS, FieldList, InferOptions},
    store::{ColumnInfo, PreparedInsert, Store, StoreError},
    tokenizer::{ParseResult, Tokenizer},
};

pub const SAVEPOINT_PREFIX: &str = "csvimport";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportMode {
    CreateNew,
    AppendExisting,
}

/// What an empty CSV field becomes when appending into an existing column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NullValue {
    Literal(String),
    Null,
}

impl NullValue {
    pub fn for_column(column: &ColumnInfo) -> Self {
        match (column.is_integer, column.not_null) {
            (true, true) => NullValue::Literal("0".to_string()),
            (true, false) => NullValue::Null,
            (false, _) => NullValue::Literal(String::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportTarget {
    pub table_name: String,
    pub mode: ImportMode,
    /// Positional, aligned with the existing table's columns. Empty for new
    /// tables.
    pub null_values: Vec<NullValue>,
}

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    pub use_header: bool,
    /// Whether an existing table with a matching column count may receive
    /// the rows.
    pub allow_append: bool,
    pub detect_integers: bool,
    pub sample_limit: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            use_header: false,
            allow_append: true,
            detect_integers: false,
            sample_limit: DEFAULT_SAMPLE_ROWS,
        }
    }
}

impl ImportOptions {
    pub fn with_header(use_header: bool) -> Self {
        Self {
            use_header,
            ..Self::default()
        }
    }

    fn infer_options(&self) -> InferOptions {
        InferOptions {
            use_header: self.use_header,
            sample_limit: self.sample_limit,
            detect_integers: self.detect_integers,
        }
    }
}

#[derive(Debug)]
pub enum ImportResult {
    Success,
    Cancelled,
    Failed {
        /// 1-based record number, counting a header row if present.
        row: Option<usize>,
        error: ImportError,
    },
    NothingToImport,
}

impl ImportResult {
    pub fn label(&self) -> &'static str {
        match self {
            ImportResult::Success => "success",
            ImportResult::Cancelled => "cancelled",
            ImportResult::Failed { .. } => "failed",
            ImportResult::NothingToImport => "empty",
        }
    }
}

impl fmt::Display for ImportResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportResult::Failed { row, error } => {
                f.write_str("Error importing data")?;
                if let Some(row) = row {
                    write!(f, " from record number {row}")?;
                }
                write!(f, ". {}: {error}", error.class())
            }
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Debug)]
pub struct ImportOutcome {
    pub table: String,
    pub rows_processed: usize,
    /// Open savepoint to release (commit) or roll back. Only set on success.
    pub savepoint: Option<String>,
    pub result: ImportResult,
}

impl ImportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, ImportResult::Success)
    }
}

pub struct Importer<'s, S: Store + ?Sized> {
    store: &'s S,
    tokenizer: Tokenizer,
}

impl<'s, S: Store + ?Sized> Importer<'s, S> {
    pub fn new(store: &'s S, tokenizer: Tokenizer) -> Self {
        Self { store, tokenizer }
    }

    pub fn resolve_target(
        &self,
        table: &str,
        fields: &FieldList,
        options: &ImportOptions,
    ) -> Result<ImportTarget> {
        let Some(existing) = self.store.object_exists(table)? else {
            return Ok(ImportTarget {
                table_name: table.to_string(),
                mode: ImportMode::CreateNew,
                null_values: Vec::new(),
            });
        };
        if existing.column_count() != fields.len() {
            return Err(ImportError::SchemaMismatch {
                table: table.to_string(),
                existing: existing.column_count(),
                inferred: fields.len(),
            });
        }
        if !options.allow_append {
            return Err(ImportError::TableExists(table.to_string()));
        }
        Ok(ImportTarget {
            table_name: table.to_string(),
            mode: ImportMode::AppendExisting,
            null_values: existing.columns.iter().map(NullValue::for_column).collect(),
        })
    }

    pub fn import<C>(
        &self,
        source: &C,
        table: &str,
        options: &ImportOptions,
        progress: &mut dyn ProgressSink,
    ) -> Result<ImportOutcome>
    where
        C: CsvSource + ?Sized,
    {
        let fields = schema::infer(source, &self.tokenizer, &options.infer_options())?;
        if fields.is_empty() {
            info!("Nothing to import from {}", source.describe());
            return Ok(ImportOutcome {
                table: table.to_string(),
                rows_processed: 0,
                savepoint: None,
                result: ImportResult::NothingToImport,
            });
        }

        let target = self.resolve_target(table, &fields, options)?;
        debug!(
            "Importing {} into '{}' as {:?} with null policy {:?}",
            source.describe(),
            target.table_name,
            target.mode,
            target.null_values
        );

        let savepoint = savepoint_name();
        self.store
            .begin_savepoint(&savepoint)
            .map_err(ImportError::Savepoint)?;
        debug!("Opened savepoint {savepoint}");

        if target.mode == ImportMode::CreateNew {
            if let Err(err) = self.store.create_table(&target.table_name, &fields) {
                self.rollback(&savepoint);
                return Err(ImportError::CreateTable(err));
            }
        }

        let mut insert = match self.store.prepare_insert(&target.table_name, fields.len()) {
            Ok(insert) => insert,
            Err(err) => {
                self.rollback(&savepoint);
                return Err(ImportError::Store(err));
            }
        };

        let column_count = fields.len();
        let mut rows_processed = 0usize;
        let mut current_row = 0usize;
        let mut failure: Option<ImportError> = None;
        let parsed = self
            .tokenizer
            .parse(source, None, progress, |row_index, row| {
                current_row = row_index + 1;
                if row_index == 0 && options.use_header {
                    return true;
                }
                match insert_row(insert.as_mut(), &target, column_count, row) {
                    Ok(()) => {
                        rows_processed += 1;
                        true
                    }
                    Err(err) => {
                        failure = Some(ImportError::Insert(err));
                        false
                    }
                }
            });
        insert.finalize();

        let result = match (failure, parsed) {
            (Some(error), _) => ImportResult::Failed {
                row: Some(current_row),
                error,
            },
            (None, ParseResult::Error(error)) => ImportResult::Failed {
                row: Some(current_row + 1),
                error,
            },
            (None, ParseResult::Cancelled) => ImportResult::Cancelled,
            (None, ParseResult::Success) => ImportResult::Success,
        };

        if let ImportResult::Success = result {
            info!(
                "Imported {rows_processed} row(s) from {} into '{}'",
                source.describe(),
                target.table_name
            );
            return Ok(ImportOutcome {
                table: target.table_name,
                rows_processed,
                savepoint: Some(savepoint),
                result,
            });
        }

        warn!(
            "Rolling back import of {} into '{}': {result}",
            source.describe(),
            target.table_name
        );
        self.rollback(&savepoint);
        Ok(ImportOutcome {
            table: target.table_name,
            rows_processed,
            savepoint: None,
            result,
        })
    }

    /// Releases the savepoint of a successful import, making its rows part of
    /// the enclosing transaction (or durable when none is open).
    pub fn commit(&self, outcome: &mut ImportOutcome) -> Result<()> {
        if let Some(savepoint) = outcome.savepoint.take() {
            self.store.release_savepoint(&savepoint)?;
            debug!("Released savepoint {savepoint}");
        }
        Ok(())
    }

    /// Undoes a successful import whose savepoint is still open.
    pub fn revert(&self, outcome: &mut ImportOutcome) -> Result<()> {
        if let Some(savepoint) = outcome.savepoint.take() {
            self.store.rollback_to_savepoint(&savepoint)?;
        }
        Ok(())
    }

    fn rollback(&self, savepoint: &str) {
        if let Err(err) = self.store.rollback_to_savepoint(savepoint) {
            warn!("Rolling back to savepoint {savepoint} failed: {err}");
        }
    }
}

fn insert_row(
    insert: &mut dyn PreparedInsert,
    target: &ImportTarget,
    column_count: usize,
    row: &[String],
) -> std::result::Result<(), StoreError> {
    for (index, value) in row.iter().take(column_count).enumerate() {
        if target.mode == ImportMode::AppendExisting && value.is_empty() {
            match target.null_values.get(index) {
                Some(NullValue::Null) => continue,
                Some(NullValue::Literal(literal)) => {
                    insert.bind(index, Some(literal))?;
                    continue;
                }
                None => {}
            }
        }
        insert.bind(index, Some(value))?;
    }
    insert.execute()?;
    insert.reset();
    insert.clear_bindings();
    Ok(())
}

fn savepoint_name() -> String {
    format!("{SAVEPOINT_PREFIX}_{}", Uuid::new_v4().simple())
}
