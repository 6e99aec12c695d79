use std::collections::BTreeMap;
use std::io::Read;

use rusqlite::Statement;
use tracing::debug;
use typedsql_core::{NativeValue, SqlObject, Timestamp, timestamp};
use typedsql_storage::sqlite::bind;

use crate::error::{BindingError, EngineError};
use crate::keys::{GeneratedKeys, assigns_rowid};
use crate::result_set::ResultSet;
use crate::session::Session;

/// A compiled statement plus the parameters pending for its next execution.
///
/// Positions are 1-based. Binding a position twice keeps the later value.
/// Pending parameters are consumed by the next execution; every position
/// must be bound again before the one after. The exception is a position
/// skipped by numbered placeholders, which may be left unset.
pub struct PreparedStatement<'s> {
    session: &'s Session,
    stmt: Statement<'s>,
    params: BTreeMap<usize, NativeValue>,
    keys: GeneratedKeys,
    assigns_rowid: bool,
    generated_key: Option<i64>,
}

impl<'s> PreparedStatement<'s> {
    pub(crate) fn new(session: &'s Session, sql: &str, stmt: Statement<'s>, keys: GeneratedKeys) -> Self {
        Self {
            session,
            stmt,
            params: BTreeMap::new(),
            keys,
            assigns_rowid: assigns_rowid(sql),
            generated_key: None,
        }
    }

    /// Number of parameter positions declared by the SQL text.
    pub fn parameter_count(&self) -> usize {
        self.stmt.parameter_count()
    }

    fn set(&mut self, position: usize, value: NativeValue) -> Result<(), EngineError> {
        let count = self.parameter_count();
        if position == 0 || position > count {
            return Err(BindingError::OutOfRange { position, count }.into());
        }
        self.params.insert(position, value);
        Ok(())
    }

    pub fn set_null(&mut self, position: usize) -> Result<(), EngineError> {
        self.set(position, NativeValue::Null)
    }

    pub fn set_byte(&mut self, position: usize, value: i8) -> Result<(), EngineError> {
        self.set(position, NativeValue::Integer(value.into()))
    }

    pub fn set_short(&mut self, position: usize, value: i16) -> Result<(), EngineError> {
        self.set(position, NativeValue::Integer(value.into()))
    }

    pub fn set_int(&mut self, position: usize, value: i32) -> Result<(), EngineError> {
        self.set(position, NativeValue::Integer(value.into()))
    }

    pub fn set_long(&mut self, position: usize, value: i64) -> Result<(), EngineError> {
        self.set(position, NativeValue::Integer(value))
    }

    /// Stored as integer 1 or 0.
    pub fn set_boolean(&mut self, position: usize, value: bool) -> Result<(), EngineError> {
        self.set(position, NativeValue::Integer(value.into()))
    }

    pub fn set_float(&mut self, position: usize, value: f32) -> Result<(), EngineError> {
        self.set(position, NativeValue::Real(value.into()))
    }

    pub fn set_double(&mut self, position: usize, value: f64) -> Result<(), EngineError> {
        self.set(position, NativeValue::Real(value))
    }

    pub fn set_string(&mut self, position: usize, value: &str) -> Result<(), EngineError> {
        self.set(position, NativeValue::Text(value.to_owned()))
    }

    pub fn set_bytes(&mut self, position: usize, value: &[u8]) -> Result<(), EngineError> {
        self.set(position, NativeValue::Blob(value.into()))
    }

    pub fn set_timestamp(&mut self, position: usize, value: &Timestamp) -> Result<(), EngineError> {
        self.set(position, timestamp::encode(value))
    }

    /// Bind a boxed value; `None` binds NULL.
    pub fn set_object(&mut self, position: usize, value: Option<&SqlObject>) -> Result<(), EngineError> {
        self.set(position, value.map_or(NativeValue::Null, SqlObject::to_native))
    }

    /// Drain exactly `length` bytes from `reader` into a blob parameter.
    /// Bytes past `length` are left unread; a stream that ends early fails.
    pub fn set_binary_stream(&mut self, position: usize, reader: impl Read, length: u64) -> Result<(), EngineError> {
        let count = self.parameter_count();
        if position == 0 || position > count {
            return Err(BindingError::OutOfRange { position, count }.into());
        }
        let mut buf = Vec::new();
        reader
            .take(length)
            .read_to_end(&mut buf)
            .map_err(BindingError::Io)?;
        let read = buf.len() as u64;
        if read < length {
            return Err(BindingError::ShortStream { declared: length, read }.into());
        }
        self.set(position, NativeValue::Blob(buf.into()))
    }

    /// Drop all pending parameters.
    pub fn clear_parameters(&mut self) {
        self.params.clear();
    }

    /// Whether `position` must be bound before execution. Numbered
    /// placeholders (`?NNN`) can leave gaps, such as position 2 in
    /// `?1, ?3`; a gap has no name and no placeholder in the SQL text, so
    /// it is optional and binds NULL when left unset.
    fn is_required(&self, position: usize, numbered: bool) -> bool {
        !numbered || self.stmt.parameter_name(position).is_some()
    }

    /// Push every pending parameter into the engine statement, consuming them.
    fn bind_pending(&mut self) -> Result<(), EngineError> {
        let count = self.parameter_count();
        let numbered = (1..=count)
            .filter_map(|p| self.stmt.parameter_name(p))
            .any(|name| name.starts_with('?'));
        if let Some(position) =
            (1..=count).find(|&p| self.is_required(p, numbered) && !self.params.contains_key(&p))
        {
            return Err(BindingError::Unbound { position }.into());
        }
        let params = std::mem::take(&mut self.params);
        let null = NativeValue::Null;
        for position in 1..=count {
            // Engine bindings outlive an execution; reset unset gaps.
            bind(&mut self.stmt, position, params.get(&position).unwrap_or(&null))?;
        }
        Ok(())
    }

    /// Run a write and return the number of rows it changed.
    pub fn execute_update(&mut self) -> Result<usize, EngineError> {
        self.bind_pending()?;
        let rows = self.stmt.raw_execute()?;
        if self.keys == GeneratedKeys::Return {
            // The connection's last rowid is stale after anything but an insert.
            let key = (rows > 0 && self.assigns_rowid).then(|| self.session.last_insert_id());
            self.generated_key = key;
            self.session.key_tracker().record(key);
            debug!(rows, key, "write executed");
        } else {
            debug!(rows, "write executed");
        }
        Ok(rows)
    }

    /// Run a query. The returned cursor borrows this statement, so it must
    /// be dropped or closed before the statement runs again.
    pub fn execute_query(&mut self) -> Result<ResultSet<'_>, EngineError> {
        self.bind_pending()?;
        Ok(ResultSet::open(&mut self.stmt))
    }

    /// Rowid assigned by this statement's latest write, when it was
    /// prepared with [`GeneratedKeys::Return`]. `None` for updates, deletes
    /// and inserts that wrote nothing.
    pub fn generated_key(&self) -> Option<i64> {
        self.generated_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn session() -> Session {
        let session = Session::open_in_memory().unwrap();
        session.execute("CREATE TABLE t (a, b)").unwrap();
        session
    }

    #[test]
    fn position_must_be_declared() {
        let session = session();
        let mut stmt = session.prepare("INSERT INTO t (a, b) VALUES (?, ?)").unwrap();
        assert_eq!(stmt.parameter_count(), 2);
        assert!(matches!(
            stmt.set_int(0, 1),
            Err(EngineError::Binding(BindingError::OutOfRange { position: 0, count: 2 }))
        ));
        assert!(matches!(
            stmt.set_int(3, 1),
            Err(EngineError::Binding(BindingError::OutOfRange { position: 3, count: 2 }))
        ));
    }

    #[test]
    fn unbound_position_fails_execution() {
        let session = session();
        let mut stmt = session.prepare("INSERT INTO t (a, b) VALUES (?, ?)").unwrap();
        stmt.set_int(1, 1).unwrap();
        assert!(matches!(
            stmt.execute_update(),
            Err(EngineError::Binding(BindingError::Unbound { position: 2 }))
        ));
        stmt.set_null(2).unwrap();
        assert_eq!(stmt.execute_update().unwrap(), 1);
    }

    #[test]
    fn parameters_are_consumed_by_execution() {
        let session = session();
        let mut stmt = session.prepare("INSERT INTO t (a, b) VALUES (?, ?)").unwrap();
        stmt.set_int(1, 1).unwrap();
        stmt.set_int(2, 2).unwrap();
        stmt.execute_update().unwrap();
        assert!(matches!(
            stmt.execute_update(),
            Err(EngineError::Binding(BindingError::Unbound { position: 1 }))
        ));
    }

    #[test]
    fn rebinding_overwrites() {
        let session = session();
        let mut stmt = session.prepare("INSERT INTO t (a, b) VALUES (?, ?)").unwrap();
        stmt.set_int(1, 1).unwrap();
        stmt.set_string(1, "second").unwrap();
        stmt.set_null(2).unwrap();
        stmt.execute_update().unwrap();

        let mut query = session.prepare("SELECT a FROM t").unwrap();
        let mut rs = query.execute_query().unwrap();
        assert!(rs.next().unwrap());
        assert_eq!(rs.get_string(1).unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn numbered_gaps_need_no_binding() {
        let session = session();
        let mut stmt = session.prepare("INSERT INTO t (a, b) VALUES (?1, ?3)").unwrap();
        assert_eq!(stmt.parameter_count(), 3);
        stmt.set_int(1, 10).unwrap();
        assert!(matches!(
            stmt.execute_update(),
            Err(EngineError::Binding(BindingError::Unbound { position: 3 }))
        ));
        stmt.set_int(3, 30).unwrap();
        assert_eq!(stmt.execute_update().unwrap(), 1);
        stmt.set_int(1, 11).unwrap();
        stmt.set_null(2).unwrap();
        stmt.set_int(3, 31).unwrap();
        stmt.execute_update().unwrap();

        let mut query = session.prepare("SELECT a, b FROM t ORDER BY rowid").unwrap();
        let mut rs = query.execute_query().unwrap();
        for (a, b) in [(10, 30), (11, 31)] {
            assert!(rs.next().unwrap());
            assert_eq!(rs.get_int(1).unwrap(), a);
            assert_eq!(rs.get_int(2).unwrap(), b);
        }
        assert!(!rs.next().unwrap());
    }

    #[test]
    fn cleared_parameters_must_be_rebound() {
        let session = session();
        let mut stmt = session.prepare("INSERT INTO t (a, b) VALUES (?, ?)").unwrap();
        stmt.set_int(1, 1).unwrap();
        stmt.set_int(2, 2).unwrap();
        stmt.clear_parameters();
        assert!(stmt.execute_update().is_err());
    }

    #[test]
    fn binary_stream_is_cut_at_declared_length() {
        let session = session();
        let mut stmt = session.prepare("INSERT INTO t (a, b) VALUES (?, ?)").unwrap();
        stmt.set_int(1, 1).unwrap();
        stmt.set_binary_stream(2, Cursor::new(vec![1u8, 2, 3, 4, 5]), 3).unwrap();
        stmt.execute_update().unwrap();

        let mut query = session.prepare("SELECT b FROM t").unwrap();
        let mut rs = query.execute_query().unwrap();
        rs.next().unwrap();
        assert_eq!(rs.get_bytes(1).unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn short_binary_stream_is_rejected() {
        let session = session();
        let mut stmt = session.prepare("INSERT INTO t (a, b) VALUES (?, ?)").unwrap();
        match stmt.set_binary_stream(2, Cursor::new(vec![1u8, 2]), 5) {
            Err(EngineError::Binding(BindingError::ShortStream { declared, read })) => {
                assert_eq!(declared, 5);
                assert_eq!(read, 2);
            }
            other => panic!("expected ShortStream, got {other:?}"),
        }
    }

    #[test]
    fn boxed_null_binds_null() {
        let session = session();
        let mut stmt = session.prepare("INSERT INTO t (a, b) VALUES (?, ?)").unwrap();
        stmt.set_object(1, None).unwrap();
        stmt.set_object(2, Some(&SqlObject::Boolean(true))).unwrap();
        stmt.execute_update().unwrap();

        let mut query = session.prepare("SELECT a, b FROM t").unwrap();
        let mut rs = query.execute_query().unwrap();
        rs.next().unwrap();
        assert_eq!(rs.get_object(1).unwrap(), None);
        assert!(rs.was_null());
        assert_eq!(rs.get_int(2).unwrap(), 1);
        assert!(!rs.was_null());
    }

    #[test]
    fn engine_failures_surface_verbatim() {
        let session = session();
        session.execute("CREATE TABLE u (id INTEGER PRIMARY KEY)").unwrap();
        let mut stmt = session.prepare("INSERT INTO u (id) VALUES (?)").unwrap();
        stmt.set_int(1, 1).unwrap();
        stmt.execute_update().unwrap();
        stmt.set_int(1, 1).unwrap();
        let err = stmt.execute_update().unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));
        assert!(err.to_string().contains("UNIQUE constraint failed"));
    }
}
