#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use csv_import::sqlite::SqliteStore;
use rusqlite::types::Value;
use tempfile::{TempDir, tempdir};

/// Scratch directory that removes its CSV files and databases on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn database(&self) -> PathBuf {
        self.temp_dir.path().join("import.db")
    }
}

/// Numbered `id,label` rows, optionally preceded by a header line.
pub fn numbered_rows(count: usize, header: bool) -> String {
    let mut contents = String::new();
    if header {
        contents.push_str("id,label\n");
    }
    for id in 1..=count {
        contents.push_str(&format!("{id},row {id}\n"));
    }
    contents
}

/// Every row of `table` as SQLite values, in rowid order.
pub fn table_rows(store: &SqliteStore, table: &str) -> Vec<Vec<Value>> {
    let sql = format!("SELECT * FROM \"{table}\" ORDER BY rowid");
    let mut stmt = store.connection().prepare(&sql).expect("prepare select");
    let column_count = stmt.column_count();
    stmt.query_map([], |row| {
        (0..column_count)
            .map(|idx| row.get::<_, Value>(idx))
            .collect::<Result<Vec<_>, _>>()
    })
    .expect("query rows")
    .collect::<Result<Vec<_>, _>>()
    .expect("collect rows")
}

pub fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}
