use std::fmt;
use std::sync::Arc;

use rusqlite::{Rows, Statement};
use tracing::trace;
use typedsql_core::{
    AccessorType, BlobHandle, CoercedValue, FromNative, NativeValue, SqlObject, Timestamp, coerce,
};
use typedsql_storage::StorageError;
use typedsql_storage::sqlite::read_row;

use crate::error::EngineError;

/// A column reference: a 1-based position or an exact, case-sensitive label.
pub trait ColumnIndex {
    /// 0-based offset into the row.
    fn resolve(&self, rs: &ResultSet<'_>) -> Result<usize, EngineError>;
}

impl ColumnIndex for usize {
    fn resolve(&self, rs: &ResultSet<'_>) -> Result<usize, EngineError> {
        let count = rs.column_count();
        if *self == 0 || *self > count {
            return Err(EngineError::ColumnOutOfRange { index: *self, count });
        }
        Ok(self - 1)
    }
}

impl ColumnIndex for &str {
    fn resolve(&self, rs: &ResultSet<'_>) -> Result<usize, EngineError> {
        rs.find_column(self).map(|i| i - 1)
    }
}

/// Forward-only cursor over a query result.
///
/// Typed getters read from the current row and record whether the cell was
/// NULL. [`ResultSet::was_null`] reports that flag for the most recent read
/// only; every read overwrites it, whichever column it touches.
///
/// The cursor steps the engine one row per [`ResultSet::next`], so it borrows
/// its statement until dropped or closed. An engine error raised while
/// stepping surfaces from the `next` call that hit it, after every earlier
/// row has been readable. Each row's cells are copied out as the cursor
/// reaches it; blob handles share that copy and stay usable after the
/// cursor moves on.
pub struct ResultSet<'stmt> {
    columns: Vec<String>,
    rows: Option<Rows<'stmt>>,
    current: Option<Vec<NativeValue>>,
    was_null: bool,
    closed: bool,
}

impl fmt::Debug for ResultSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("columns", &self.columns)
            .field("exhausted", &self.rows.is_none())
            .field("current", &self.current)
            .field("closed", &self.closed)
            .finish()
    }
}

impl<'stmt> ResultSet<'stmt> {
    /// Start stepping a statement whose parameters are already bound.
    pub(crate) fn open(stmt: &'stmt mut Statement<'_>) -> Self {
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        trace!(columns = columns.len(), "query opened");
        Self {
            columns,
            rows: Some(stmt.raw_query()),
            current: None,
            was_null: false,
            closed: false,
        }
    }

    /// Advance to the next row. Returns `false` once the rows are exhausted.
    pub fn next(&mut self) -> Result<bool, EngineError> {
        if self.closed {
            return Err(EngineError::Closed);
        }
        self.current = None;
        let Some(rows) = self.rows.as_mut() else {
            return Ok(false);
        };
        let count = self.columns.len();
        let fetched = match rows.next() {
            Ok(Some(row)) => read_row(row, count).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::from(e)),
        };
        match fetched? {
            Some(values) => {
                self.current = Some(values);
                Ok(true)
            }
            None => {
                self.rows = None;
                trace!("query exhausted");
                Ok(false)
            }
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// 1-based position of the first column labelled exactly `name`.
    pub fn find_column(&self, name: &str) -> Result<usize, EngineError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| i + 1)
            .ok_or_else(|| EngineError::UnknownColumn(name.to_owned()))
    }

    fn cell(&mut self, column: impl ColumnIndex) -> Result<&NativeValue, EngineError> {
        if self.closed {
            return Err(EngineError::Closed);
        }
        let idx = column.resolve(self)?;
        let value = self
            .current
            .as_ref()
            .and_then(|row| row.get(idx))
            .ok_or(EngineError::NoCurrentRow)?;
        self.was_null = value.is_null();
        Ok(value)
    }

    /// Read a column as any [`FromNative`] type.
    pub fn get<T: FromNative>(&mut self, column: impl ColumnIndex) -> Result<T, EngineError> {
        let value = self.cell(column)?;
        Ok(T::from_native(value)?)
    }

    /// Read a column through an accessor chosen at runtime.
    pub fn get_coerced(&mut self, column: impl ColumnIndex, target: AccessorType) -> Result<CoercedValue, EngineError> {
        let value = self.cell(column)?;
        let (coerced, _) = coerce(value, target)?;
        Ok(coerced)
    }

    /// True when the most recent read on this result set hit a NULL cell.
    pub fn was_null(&self) -> bool {
        self.was_null
    }

    pub fn get_byte(&mut self, column: impl ColumnIndex) -> Result<i8, EngineError> {
        self.get(column)
    }

    pub fn get_short(&mut self, column: impl ColumnIndex) -> Result<i16, EngineError> {
        self.get(column)
    }

    pub fn get_int(&mut self, column: impl ColumnIndex) -> Result<i32, EngineError> {
        self.get(column)
    }

    pub fn get_long(&mut self, column: impl ColumnIndex) -> Result<i64, EngineError> {
        self.get(column)
    }

    pub fn get_boolean(&mut self, column: impl ColumnIndex) -> Result<bool, EngineError> {
        self.get(column)
    }

    pub fn get_float(&mut self, column: impl ColumnIndex) -> Result<f32, EngineError> {
        self.get(column)
    }

    pub fn get_double(&mut self, column: impl ColumnIndex) -> Result<f64, EngineError> {
        self.get(column)
    }

    pub fn get_string(&mut self, column: impl ColumnIndex) -> Result<Option<String>, EngineError> {
        self.get(column)
    }

    pub fn get_bytes(&mut self, column: impl ColumnIndex) -> Result<Option<Vec<u8>>, EngineError> {
        self.get(column)
    }

    pub fn get_object(&mut self, column: impl ColumnIndex) -> Result<Option<SqlObject>, EngineError> {
        self.get(column)
    }

    pub fn get_timestamp(&mut self, column: impl ColumnIndex) -> Result<Option<Timestamp>, EngineError> {
        self.get(column)
    }

    /// Handle on a binary cell. Non-blob cells are exposed through their
    /// byte form; NULL yields `None`.
    pub fn get_blob(&mut self, column: impl ColumnIndex) -> Result<Option<BlobHandle>, EngineError> {
        let value = self.cell(column)?;
        if let Some(handle) = BlobHandle::from_native(value) {
            return Ok(Some(handle));
        }
        let bytes: Option<Vec<u8>> = FromNative::from_native(value)?;
        Ok(bytes.map(|b| BlobHandle::new(Arc::from(b))))
    }

    /// Stop stepping and reset the statement. Safe to call more than once.
    pub fn close(&mut self) {
        if !self.closed {
            self.rows = None;
            self.current = None;
            self.closed = true;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
