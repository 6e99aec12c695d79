use std::io::Cursor;
use std::sync::Arc;

use crate::error::CoreError;
use crate::value::NativeValue;

/// Ranged reads over a stored binary value.
///
/// Range policy: an `offset` past the end of the blob is a
/// [`CoreError::Range`]; a range that starts in bounds but runs past the
/// end is clamped, and the read comes back short.
pub trait BlobRead {
    type Error: From<CoreError>;

    /// Length of the stored value in bytes.
    fn extent(&self) -> u64;

    /// Fill `buf` from `offset`. Callers guarantee the range is in bounds.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Bytes `[offset, offset + length)`, 0-based, clamped to the extent.
    fn get_bytes(&self, offset: u64, length: usize) -> Result<Vec<u8>, Self::Error> {
        let len = clamp_range(offset, length, self.extent())?;
        let mut buf = vec![0u8; len];
        if len > 0 {
            self.read_exact_at(offset, &mut buf)?;
        }
        Ok(buf)
    }
}

/// Number of bytes a read of `length` at `offset` yields from a blob of
/// `extent` bytes.
pub fn clamp_range(offset: u64, length: usize, extent: u64) -> Result<usize, CoreError> {
    if offset > extent {
        return Err(CoreError::Range {
            offset,
            length,
            extent,
        });
    }
    let available = extent - offset;
    Ok(usize::try_from(available).map_or(length, |a| a.min(length)))
}

/// A blob extracted from a result row. Shares the row's buffer, so taking
/// a handle copies nothing and the handle outlives the cursor position.
#[derive(Debug, Clone)]
pub struct BlobHandle {
    data: Arc<[u8]>,
}

impl BlobHandle {
    pub fn new(data: Arc<[u8]>) -> Self {
        Self { data }
    }

    /// Handle over a stored cell; `None` unless the cell holds a blob.
    pub fn from_native(value: &NativeValue) -> Option<Self> {
        match value {
            NativeValue::Blob(b) => Some(Self::new(Arc::clone(b))),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sequential reader over the whole value.
    pub fn stream(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.data[..])
    }
}

impl BlobRead for BlobHandle {
    type Error = CoreError;

    fn extent(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), CoreError> {
        let start = offset as usize;
        let end = start + buf.len();
        let src = self.data.get(start..end).ok_or(CoreError::Range {
            offset,
            length: buf.len(),
            extent: self.extent(),
        })?;
        buf.copy_from_slice(src);
        Ok(())
    }
}
