use thiserror::Error;

use crate::coerce::AccessorType;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("cannot read {stored} value as {target}: {detail}")]
    Coercion {
        stored: &'static str,
        target: AccessorType,
        detail: String,
    },

    #[error("blob range out of bounds: offset {offset}, length {length}, extent {extent}")]
    Range { offset: u64, length: usize, extent: u64 },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
