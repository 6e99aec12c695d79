pub mod blob;
pub mod coerce;
pub mod error;
pub mod timestamp;
pub mod value;

pub use blob::{BlobHandle, BlobRead};
pub use coerce::{AccessorType, CoercedValue, FromNative, SqlObject, coerce};
pub use error::CoreError;
pub use timestamp::Timestamp;
pub use value::NativeValue;
