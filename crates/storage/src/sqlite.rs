use std::path::Path;

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, DatabaseName, Row, Statement, ToSql};
use tracing::{debug, warn};

use typedsql_core::NativeValue;

use crate::blob::IncrementalBlob;
use crate::config::{EngineConfig, apply_pragmas};
use crate::error::StorageError;

/// Borrowed view of a cell for binding into a statement.
pub struct Bound<'a>(pub &'a NativeValue);

impl ToSql for Bound<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(match self.0 {
            NativeValue::Null => ValueRef::Null,
            NativeValue::Integer(n) => ValueRef::Integer(*n),
            NativeValue::Real(r) => ValueRef::Real(*r),
            NativeValue::Text(s) => ValueRef::Text(s.as_bytes()),
            NativeValue::Blob(b) => ValueRef::Blob(&b[..]),
        }))
    }
}

/// Copy a cell out of the engine. Text that is not valid UTF-8 is kept as
/// its raw bytes, so string reads of it fail and byte reads see it intact.
pub fn native_from_ref(value: ValueRef<'_>) -> NativeValue {
    match value {
        ValueRef::Null => NativeValue::Null,
        ValueRef::Integer(n) => NativeValue::Integer(n),
        ValueRef::Real(r) => NativeValue::Real(r),
        ValueRef::Text(t) => match std::str::from_utf8(t) {
            Ok(text) => NativeValue::Text(text.to_owned()),
            Err(_) => NativeValue::Blob(t.into()),
        },
        ValueRef::Blob(b) => NativeValue::Blob(b.into()),
    }
}

/// Bind `value` at 1-based `position`.
pub fn bind(stmt: &mut Statement<'_>, position: usize, value: &NativeValue) -> Result<(), StorageError> {
    stmt.raw_bind_parameter(position, Bound(value))?;
    Ok(())
}

/// Every column of the cursor's current row, in select order.
pub fn read_row(row: &Row<'_>, column_count: usize) -> Result<Vec<NativeValue>, StorageError> {
    (0..column_count)
        .map(|i| Ok(native_from_ref(row.get_ref(i)?)))
        .collect()
}

/// The embedded engine behind a session: one SQLite connection.
pub struct SqliteEngine {
    conn: Connection,
}

impl SqliteEngine {
    pub fn open(path: impl AsRef<Path>, config: &EngineConfig) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        apply_pragmas(&conn, config, false)?;
        debug!(path = %path.display(), "opened database");
        Ok(Self { conn })
    }

    pub fn open_in_memory(config: &EngineConfig) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        apply_pragmas(&conn, config, true)?;
        debug!("opened in-memory database");
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run one or more SQL statements that return no rows.
    pub fn execute_batch(&self, sql: &str) -> Result<(), StorageError> {
        self.conn.execute_batch(sql).map_err(|e| {
            warn!(error = %e, sql, "batch execution failed");
            StorageError::Sqlite(e)
        })
    }

    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>, StorageError> {
        self.conn.prepare(sql).map_err(|e| {
            warn!(error = %e, sql, "prepare failed");
            StorageError::Sqlite(e)
        })
    }

    /// Rowid assigned by the most recent successful insert on this connection.
    pub fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    /// Rows modified by the most recent insert, update or delete.
    pub fn changes(&self) -> u64 {
        self.conn.changes()
    }

    /// Read-only incremental handle on one blob cell.
    pub fn open_blob(&self, table: &str, column: &str, rowid: i64) -> Result<IncrementalBlob<'_>, StorageError> {
        let blob = self
            .conn
            .blob_open(DatabaseName::Main, table, column, rowid, true)?;
        Ok(IncrementalBlob::new(blob))
    }

    pub fn close(self) -> Result<(), StorageError> {
        self.conn.close().map_err(|(_, e)| StorageError::Sqlite(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SqliteEngine {
        SqliteEngine::open_in_memory(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn cells_keep_their_storage_class() {
        let engine = engine();
        engine
            .execute_batch("CREATE TABLE t (a, b, c, d, e)")
            .unwrap();
        let values = [
            NativeValue::Null,
            NativeValue::Integer(-5),
            NativeValue::Real(2.5),
            NativeValue::Text("hi".into()),
            NativeValue::from(vec![0u8, 255]),
        ];
        let mut stmt = engine.prepare("INSERT INTO t VALUES (?, ?, ?, ?, ?)").unwrap();
        for (i, v) in values.iter().enumerate() {
            bind(&mut stmt, i + 1, v).unwrap();
        }
        assert_eq!(stmt.raw_execute().unwrap(), 1);

        let mut select = engine.prepare("SELECT a, b, c, d, e FROM t").unwrap();
        let mut rows = select.raw_query();
        let row = rows.next().unwrap().unwrap();
        assert_eq!(read_row(row, 5).unwrap(), values);
    }

    #[test]
    fn invalid_utf8_text_keeps_its_bytes() {
        let engine = engine();
        let mut select = engine.prepare("SELECT CAST(x'fffe' AS TEXT), 'ok'").unwrap();
        let mut rows = select.raw_query();
        let row = rows.next().unwrap().unwrap();
        assert_eq!(
            read_row(row, 2).unwrap(),
            vec![NativeValue::from(vec![0xffu8, 0xfe]), NativeValue::Text("ok".into())]
        );
    }

    #[test]
    fn engine_errors_are_surfaced() {
        let engine = engine();
        let err = engine.execute_batch("CREATE TABLEX nope").unwrap_err();
        assert!(matches!(err, StorageError::Sqlite(_)));
        assert!(err.to_string().contains("syntax error"));
    }

    #[test]
    fn last_insert_rowid_tracks_inserts() {
        let engine = engine();
        engine
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v); INSERT INTO t (v) VALUES (1); INSERT INTO t (v) VALUES (2);")
            .unwrap();
        assert_eq!(engine.last_insert_rowid(), 2);
        assert_eq!(engine.changes(), 1);
    }
}
