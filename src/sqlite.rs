//! SQLite implementation of the [`Store`] contract, built on `rusqlite`.

use std::path::Path;

use log::debug;
use rusqlite::{Connection, OptionalExtension, Statement, params};

use crate::{
    schema::FieldList,
    store::{
        ColumnInfo, PreparedInsert, Store, StoreError, TableDescriptor, escape_identifier,
        insert_statement,
    },
};

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::new(err.to_string())
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Names of all tables, sorted.
    pub fn table_names(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn row_count(&self, table: &str) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", escape_identifier(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl Store for SqliteStore {
    fn object_exists(&self, name: &str) -> Result<Option<TableDescriptor>, StoreError> {
        let stored_name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        let Some(stored_name) = stored_name else {
            return Ok(None);
        };

        let sql = format!("PRAGMA table_info({})", escape_identifier(&stored_name));
        let mut stmt = self.conn.prepare(&sql)?;
        let columns = stmt
            .query_map([], |row| {
                let declared: Option<String> = row.get(2)?;
                let not_null: i64 = row.get(3)?;
                Ok(ColumnInfo {
                    is_integer: declared
                        .map(|ty| ty.to_ascii_uppercase().contains("INT"))
                        .unwrap_or(false),
                    not_null: not_null != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(TableDescriptor {
            name: stored_name,
            columns,
        }))
    }

    fn create_table(&self, name: &str, fields: &FieldList) -> Result<(), StoreError> {
        let columns = fields
            .iter()
            .map(|field| format!("{} {}", escape_identifier(&field.name), field.kind.sql_type()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("CREATE TABLE {} ({columns})", escape_identifier(name));
        debug!("{sql}");
        self.conn.execute(&sql, [])?;
        Ok(())
    }

    fn begin_savepoint(&self, name: &str) -> Result<(), StoreError> {
        self.conn
            .execute_batch(&format!("SAVEPOINT {}", escape_identifier(name)))?;
        Ok(())
    }

    fn rollback_to_savepoint(&self, name: &str) -> Result<(), StoreError> {
        let escaped = escape_identifier(name);
        self.conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {escaped}; RELEASE SAVEPOINT {escaped};"
        ))?;
        Ok(())
    }

    fn release_savepoint(&self, name: &str) -> Result<(), StoreError> {
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {}", escape_identifier(name)))?;
        Ok(())
    }

    fn prepare_insert(
        &self,
        table: &str,
        column_count: usize,
    ) -> Result<Box<dyn PreparedInsert + '_>, StoreError> {
        let sql = insert_statement(&self.escape_identifier(table), column_count);
        let stmt = self.conn.prepare(&sql)?;
        Ok(Box::new(SqliteInsert { stmt }))
    }
}

struct SqliteInsert<'conn> {
    stmt: Statement<'conn>,
}

impl PreparedInsert for SqliteInsert<'_> {
    fn bind(&mut self, index: usize, value: Option<&str>) -> Result<(), StoreError> {
        self.stmt.raw_bind_parameter(index + 1, value)?;
        Ok(())
    }

    fn execute(&mut self) -> Result<(), StoreError> {
        self.stmt.raw_execute()?;
        Ok(())
    }

    fn reset(&mut self) {
        // raw_execute already resets the statement after stepping it.
    }

    fn clear_bindings(&mut self) {
        self.stmt.clear_bindings();
    }

    fn finalize(self: Box<Self>) {
        let this = *self;
        if let Err(err) = this.stmt.finalize() {
            debug!("Finalizing insert statement failed: {err}");
        }
    }
}
