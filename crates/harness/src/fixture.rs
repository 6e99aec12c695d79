use std::path::{Path, PathBuf};

use tempfile::TempDir;
use typedsql_engine::{EngineError, Session};

/// One column per primitive accessor, each declared with a different type
/// name. Declared types are advisory; the engine stores whatever is bound.
pub const DUMMY_TABLE_SQL: &str = "CREATE TABLE dummytable (id int, aString VARCHAR(254), aByte byte, \
     aShort short, anInt int, aLong long, aBool boolean, aFloat float, aDouble double, aText text)";

/// A session on a fresh database file in its own temporary directory. The
/// directory is removed when the fixture drops.
pub struct TestDb {
    pub session: Session,
    path: PathBuf,
    _dir: TempDir,
}

impl TestDb {
    pub fn new(filename: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(filename);
        let session = Session::open(&path)?;
        Ok(Self {
            session,
            path,
            _dir: dir,
        })
    }

    /// Fresh database with `DUMMY_TABLE_SQL` already applied.
    pub fn with_dummy_table(filename: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Self::new(filename)?;
        db.session.execute(DUMMY_TABLE_SQL)?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the session and open a new one on the same file.
    pub fn reopen(self) -> Result<Self, EngineError> {
        let TestDb { session, path, _dir } = self;
        session.close()?;
        let session = Session::open(&path)?;
        Ok(Self { session, path, _dir })
    }
}
