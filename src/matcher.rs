//! Header compatibility across files of a multi-file import.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    error::Result,
    io_utils::FileSource,
    schema::{self, FieldList, InferOptions},
    tokenizer::Tokenizer,
};

/// True when both lists have the same length and the same names in the same
/// order. Field kinds are ignored.
pub fn compatible(reference: &FieldList, candidate: &FieldList) -> bool {
    reference.len() == candidate.len()
        && reference
            .iter()
            .zip(candidate)
            .all(|(left, right)| left.name == right.name)
}

#[derive(Debug, Clone, Serialize)]
pub struct FileMatch {
    pub path: PathBuf,
    pub columns: usize,
    pub compatible: bool,
}

/// Infers every file's field list and compares it with the reference file's.
pub fn match_files<P>(
    reference: &Path,
    files: &[P],
    tokenizer: &Tokenizer,
    options: &InferOptions,
) -> Result<Vec<FileMatch>>
where
    P: AsRef<Path>,
{
    let reference_fields = schema::infer(&FileSource::new(reference), tokenizer, options)?;
    files
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let fields = schema::infer(&FileSource::new(path), tokenizer, options)?;
            Ok(FileMatch {
                path: path.to_path_buf(),
                columns: fields.len(),
                compatible: compatible(&reference_fields, &fields),
            })
        })
        .collect()
}
