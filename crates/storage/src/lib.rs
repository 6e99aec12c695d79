pub mod blob;
pub mod config;
pub mod error;
pub mod sqlite;

pub use blob::IncrementalBlob;
pub use config::{EngineConfig, JournalMode, Synchronous};
pub use error::StorageError;
pub use sqlite::SqliteEngine;
