//! Multi-file import runs.
//!
//! Files are processed strictly one after another. Each file is its own unit
//! of atomicity: a successful file is committed (its savepoint released)
//! before the next one starts, so a later failure or cancellation never
//! touches rows that are already in the store.

use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use crate::{
    error::{ImportError, Result},
    import::{ImportOptions, ImportOutcome, ImportResult, Importer},
    io_utils::{self, FileSource},
    matcher,
    progress::ProgressSink,
    schema::{self, FieldList},
    store::Store,
    tokenizer::Tokenizer,
};

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Table receiving every file. Defaults to the first file's base name.
    pub table: Option<String>,
    /// Import each file into a table named after the file instead.
    pub separate_tables: bool,
    /// Only files whose header matches this file's are imported.
    pub reference: Option<PathBuf>,
    /// Import files even when their header does not match the reference.
    pub force: bool,
    pub import: ImportOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Imported,
    Empty,
    Cancelled,
    Failed,
    Excluded,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub table: Option<String>,
    pub status: FileStatus,
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn count(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|file| file.status == status).count()
    }

    pub fn total_rows(&self) -> usize {
        self.files
            .iter()
            .filter(|file| file.status == FileStatus::Imported)
            .map(|file| file.rows)
            .sum()
    }

    pub fn has_failures(&self) -> bool {
        self.count(FileStatus::Failed) > 0
    }
}

pub fn table_name_for(path: &Path, files: &[PathBuf], options: &BatchOptions) -> Option<String> {
    if options.separate_tables {
        return io_utils::file_base_name(path);
    }
    options
        .table
        .clone()
        .or_else(|| files.first().and_then(|first| io_utils::file_base_name(first)))
}

pub fn run<S, F>(
    store: &S,
    tokenizer: Tokenizer,
    files: &[PathBuf],
    options: &BatchOptions,
    mut progress_for: F,
) -> Result<BatchReport>
where
    S: Store + ?Sized,
    F: FnMut(&Path) -> Box<dyn ProgressSink>,
{
    let importer = Importer::new(store, tokenizer);
    let infer_options = schema::InferOptions {
        use_header: options.import.use_header,
        sample_limit: options.import.sample_limit,
        detect_integers: false,
    };
    let reference: Option<FieldList> = match &options.reference {
        Some(path) => Some(schema::infer(&FileSource::new(path), &tokenizer, &infer_options)?),
        None => None,
    };

    let mut report = BatchReport::default();
    for path in files {
        let table = table_name_for(path, files, options);

        if let Some(reference) = &reference {
            let fields = match schema::infer(&FileSource::new(path), &tokenizer, &infer_options) {
                Ok(fields) => fields,
                Err(err) => {
                    report.files.push(failed(path, table, 0, &err));
                    continue;
                }
            };
            if !matcher::compatible(reference, &fields) {
                if options.force {
                    warn!("Header of {path:?} differs from the reference; importing anyway");
                } else {
                    warn!("Skipping {path:?}: header differs from the reference file");
                    report.files.push(FileReport {
                        path: path.clone(),
                        table,
                        status: FileStatus::Excluded,
                        rows: 0,
                        message: Some(format!("header {:?} does not match", fields.names())),
                    });
                    continue;
                }
            }
        }

        let Some(table) = table else {
            report.files.push(FileReport {
                path: path.clone(),
                table: None,
                status: FileStatus::Failed,
                rows: 0,
                message: Some("cannot derive a table name from the file name".to_string()),
            });
            continue;
        };

        let mut progress = progress_for(path);
        let outcome = importer.import(
            &FileSource::new(path),
            &table,
            &options.import,
            progress.as_mut(),
        );
        let entry = match outcome {
            Ok(mut outcome) if outcome.is_success() => match importer.commit(&mut outcome) {
                Ok(()) => {
                    info!("✓ Imported {path:?} into '{}'", outcome.table);
                    report_for(path, &outcome)
                }
                Err(err) => failed(path, Some(table), outcome.rows_processed, &err),
            },
            Ok(outcome) => report_for(path, &outcome),
            Err(err) => {
                warn!("Importing {path:?} failed: {err}");
                failed(path, Some(table), 0, &err)
            }
        };
        report.files.push(entry);
    }

    info!(
        "Imported {} row(s) from {} of {} file(s)",
        report.total_rows(),
        report.count(FileStatus::Imported),
        files.len()
    );
    Ok(report)
}

fn report_for(path: &Path, outcome: &ImportOutcome) -> FileReport {
    let (status, message) = match &outcome.result {
        ImportResult::Success => (FileStatus::Imported, None),
        ImportResult::NothingToImport => (FileStatus::Empty, None),
        ImportResult::Cancelled => (FileStatus::Cancelled, None),
        result @ ImportResult::Failed { .. } => (FileStatus::Failed, Some(result.to_string())),
    };
    FileReport {
        path: path.to_path_buf(),
        table: Some(outcome.table.clone()),
        status,
        rows: if status == FileStatus::Imported {
            outcome.rows_processed
        } else {
            0
        },
        message,
    }
}

fn failed(path: &Path, table: Option<String>, rows: usize, err: &ImportError) -> FileReport {
    FileReport {
        path: path.to_path_buf(),
        table,
        status: FileStatus::Failed,
        rows,
        message: Some(format!("{}: {err}", err.class())),
    }
}
