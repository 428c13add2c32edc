use std::io;

use thiserror::Error;

use crate::store::StoreError;

pub type Result<T, E = ImportError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to decode input as {encoding} near byte {offset}")]
    Decoding {
        encoding: &'static str,
        offset: u64,
    },

    #[error("Reading input failed: {0}")]
    Io(#[from] io::Error),

    #[error(
        "Table '{table}' already exists with {existing} column(s) but the file has {inferred} \
         (column count mismatch)"
    )]
    SchemaMismatch {
        table: String,
        existing: usize,
        inferred: usize,
    },

    #[error("Table '{0}' already exists and appending was not allowed")]
    TableExists(String),

    #[error("Creating restore point failed: {0}")]
    Savepoint(StoreError),

    #[error("Creating the table failed: {0}")]
    CreateTable(StoreError),

    #[error("Inserting row failed: {0}")]
    Insert(StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid dialect: {0}")]
    InvalidDialect(String),

    #[error("Unknown encoding '{0}'")]
    UnknownEncoding(String),
}

impl ImportError {
    /// Short class name used when reporting failures to users.
    pub fn class(&self) -> &'static str {
        match self {
            ImportError::Decoding { .. } => "DecodingError",
            ImportError::Io(_) => "IoError",
            ImportError::SchemaMismatch { .. } | ImportError::TableExists(_) => {
                "SchemaMismatchError"
            }
            ImportError::Savepoint(_)
            | ImportError::CreateTable(_)
            | ImportError::Insert(_)
            | ImportError::Store(_) => "StoreError",
            ImportError::InvalidDialect(_) | ImportError::UnknownEncoding(_) => "ConfigError",
        }
    }
}
