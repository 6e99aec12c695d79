use rusqlite::blob::Blob;

use typedsql_core::BlobRead;

use crate::error::StorageError;

/// A blob cell read in place through SQLite's incremental I/O. Nothing is
/// buffered; every ranged read goes to the engine.
pub struct IncrementalBlob<'conn> {
    blob: Blob<'conn>,
}

impl<'conn> IncrementalBlob<'conn> {
    pub(crate) fn new(blob: Blob<'conn>) -> Self {
        Self { blob }
    }
}

impl BlobRead for IncrementalBlob<'_> {
    type Error = StorageError;

    fn extent(&self) -> u64 {
        self.blob.len() as u64
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        self.blob.read_at_exact(buf, offset as usize)?;
        Ok(())
    }
}
