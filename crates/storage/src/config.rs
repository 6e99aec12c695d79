use rusqlite::Connection;
use serde::Deserialize;

use crate::error::StorageError;

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    Wal,
    Off,
}

impl JournalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Persist => "PERSIST",
            Self::Memory => "MEMORY",
            Self::Wal => "WAL",
            Self::Off => "OFF",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Synchronous {
    Off,
    Normal,
    Full,
    Extra,
}

impl Synchronous {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
            Self::Extra => "EXTRA",
        }
    }
}

/// Connection settings applied as pragmas when a database is opened.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
    /// Ignored for in-memory databases.
    pub journal_mode: JournalMode,
    pub synchronous: Synchronous,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            foreign_keys: true,
            journal_mode: JournalMode::Wal,
            synchronous: Synchronous::Normal,
        }
    }
}

pub fn apply_pragmas(conn: &Connection, config: &EngineConfig, in_memory: bool) -> Result<(), StorageError> {
    if !in_memory {
        conn.execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.as_str()))?;
    }
    conn.execute_batch(&format!(
        "
        PRAGMA synchronous = {};
        PRAGMA foreign_keys = {};
        PRAGMA busy_timeout = {};
    ",
        config.synchronous.as_str(),
        if config.foreign_keys { "ON" } else { "OFF" },
        config.busy_timeout_ms,
    ))?;
    Ok(())
}
