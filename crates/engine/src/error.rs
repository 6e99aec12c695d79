use thiserror::Error;
use typedsql_core::CoreError;
use typedsql_storage::StorageError;

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("parameter {position} is not bound")]
    Unbound { position: usize },

    #[error("parameter index {position} out of range (statement has {count})")]
    OutOfRange { position: usize, count: usize },

    #[error("stream ended after {read} of {declared} declared bytes")]
    ShortStream { declared: u64, read: u64 },

    #[error("reading parameter stream: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("no column labelled '{0}'")]
    UnknownColumn(String),

    #[error("column index {index} out of range (1..={count})")]
    ColumnOutOfRange { index: usize, count: usize },

    #[error("no current row")]
    NoCurrentRow,

    #[error("result set is closed")]
    Closed,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::Storage(StorageError::Sqlite(e))
    }
}
