pub mod error;
pub mod keys;
pub mod result_set;
pub mod session;
pub mod statement;

pub use error::{BindingError, EngineError};
pub use keys::{GeneratedKeyTracker, GeneratedKeys};
pub use result_set::{ColumnIndex, ResultSet};
pub use session::Session;
pub use statement::PreparedStatement;
