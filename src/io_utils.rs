//! Input sources and encoding resolution.
//!
//! Every read of a delimited file flows through a [`CsvSource`]. Sources are
//! restartable: inference reads a bounded prefix, then the import reopens the
//! same source and reads it in full.

use std::{
    fs::File,
    io::{self, BufReader, Cursor, Read},
    path::{Path, PathBuf},
};

use encoding_rs::{Encoding, UTF_8};

use crate::error::{ImportError, Result};

pub const DEFAULT_ENCODING_LABEL: &str = "UTF-8";

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => Encoding::for_label(value.as_bytes())
            .ok_or_else(|| ImportError::UnknownEncoding(value.to_string())),
        None => Ok(UTF_8),
    }
}

/// A restartable byte source.
pub trait CsvSource {
    /// Opens a fresh reader positioned at the start of the data.
    fn open(&self) -> io::Result<Box<dyn Read + '_>>;

    /// Total size in bytes when known up front.
    fn size_hint(&self) -> Option<u64>;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CsvSource for FileSource {
    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        let file = File::open(&self.path).map_err(|err| {
            io::Error::new(
                err.kind(),
                format!("Opening input file {:?}: {err}", self.path),
            )
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn size_hint(&self) -> Option<u64> {
        std::fs::metadata(&self.path).ok().map(|meta| meta.len())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl From<&str> for MemorySource {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl CsvSource for MemorySource {
    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.bytes.as_slice())))
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.bytes.len() as u64)
    }

    fn describe(&self) -> String {
        format!("<memory: {} byte(s)>", self.bytes.len())
    }
}

/// File name up to its first `.`, used as the default table name for a file.
pub fn file_base_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let base = name.split('.').next().unwrap_or(name);
    if base.is_empty() {
        None
    } else {
        Some(base.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn resolve_encoding_defaults_to_utf8() {
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
        assert_eq!(resolve_encoding(Some("  ")).unwrap(), UTF_8);
    }

    #[test]
    fn resolve_encoding_accepts_labels_case_insensitively() {
        assert_eq!(resolve_encoding(Some("Windows-1252")).unwrap(), WINDOWS_1252);
        assert_eq!(resolve_encoding(Some("latin1")).unwrap(), WINDOWS_1252);
    }

    #[test]
    fn resolve_encoding_rejects_unknown_label() {
        let err = resolve_encoding(Some("klingon-8")).unwrap_err();
        assert!(matches!(err, ImportError::UnknownEncoding(label) if label == "klingon-8"));
    }

    #[test]
    fn file_base_name_stops_at_first_dot() {
        assert_eq!(
            file_base_name(Path::new("/tmp/sales.2024.csv")).as_deref(),
            Some("sales")
        );
        assert_eq!(file_base_name(Path::new("orders")).as_deref(), Some("orders"));
        assert_eq!(file_base_name(Path::new(".hidden")), None);
    }

    #[test]
    fn memory_source_reopens_from_start() {
        let source = MemorySource::from("a,b\n");
        for _ in 0..2 {
            let mut text = String::new();
            source.open().unwrap().read_to_string(&mut text).unwrap();
            assert_eq!(text, "a,b\n");
        }
        assert_eq!(source.size_hint(), Some(4));
    }
}
