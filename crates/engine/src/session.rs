use std::path::Path;

use tracing::debug;
use typedsql_storage::{EngineConfig, IncrementalBlob, SqliteEngine};

use crate::error::EngineError;
use crate::keys::{GeneratedKeyTracker, GeneratedKeys};
use crate::statement::PreparedStatement;

/// One logical connection to a database file.
///
/// A session is single-threaded: its generated-key state and its statements'
/// pending parameters are unsynchronized, and callers sharing a session must
/// serialize access themselves.
pub struct Session {
    engine: SqliteEngine,
    keys: GeneratedKeyTracker,
}

impl Session {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Self::open_with(path, &EngineConfig::default())
    }

    pub fn open_with(path: impl AsRef<Path>, config: &EngineConfig) -> Result<Self, EngineError> {
        Ok(Self::from_engine(SqliteEngine::open(path, config)?))
    }

    pub fn open_in_memory() -> Result<Self, EngineError> {
        Ok(Self::from_engine(SqliteEngine::open_in_memory(&EngineConfig::default())?))
    }

    pub fn from_engine(engine: SqliteEngine) -> Self {
        Self {
            engine,
            keys: GeneratedKeyTracker::new(),
        }
    }

    pub fn engine(&self) -> &SqliteEngine {
        &self.engine
    }

    /// Run SQL that returns no rows, such as DDL. Several statements may be
    /// separated by semicolons.
    pub fn execute(&self, sql: &str) -> Result<(), EngineError> {
        self.engine.execute_batch(sql)?;
        Ok(())
    }

    /// Run a single parameterless write and return the rows it changed.
    pub fn execute_update(&self, sql: &str) -> Result<usize, EngineError> {
        self.prepare(sql)?.execute_update()
    }

    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement<'_>, EngineError> {
        self.prepare_with_keys(sql, GeneratedKeys::None)
    }

    pub fn prepare_with_keys(&self, sql: &str, keys: GeneratedKeys) -> Result<PreparedStatement<'_>, EngineError> {
        let stmt = self.engine.prepare(sql)?;
        debug!(sql, params = stmt.parameter_count(), ?keys, "prepared statement");
        Ok(PreparedStatement::new(self, sql, stmt, keys))
    }

    /// The engine's own last-insert rowid for this session.
    pub fn last_insert_id(&self) -> i64 {
        self.engine.last_insert_rowid()
    }

    /// Key captured by the latest write prepared with
    /// [`GeneratedKeys::Return`]. Only meaningful right after that write.
    pub fn generated_key(&self) -> Option<i64> {
        self.keys.last()
    }

    pub(crate) fn key_tracker(&self) -> &GeneratedKeyTracker {
        &self.keys
    }

    /// Lazy, read-only view of one stored blob, addressed by table, column
    /// and rowid.
    pub fn open_blob(&self, table: &str, column: &str, rowid: i64) -> Result<IncrementalBlob<'_>, EngineError> {
        Ok(self.engine.open_blob(table, column, rowid)?)
    }

    /// Close the connection, surfacing any error the engine reports.
    pub fn close(self) -> Result<(), EngineError> {
        self.engine.close()?;
        Ok(())
    }
}
