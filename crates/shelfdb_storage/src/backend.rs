//! The log backend trait.

use crate::error::StorageResult;

/// An append-only byte log.
///
/// The engine writes one frame per committed transaction and reads the whole
/// log back when a database is opened. Backends only move bytes.
///
/// # Invariants
///
/// - `append` returns the offset the bytes were written at
/// - `read_at` returns exactly the bytes previously appended at that offset
/// - `size` is the offset the next `append` will write to
/// - after `sync` returns, appended bytes survive process termination
pub trait LogBackend: Send + Sync {
    /// Appends `data` and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the range is not
    /// fully inside the log.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Returns the current log size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Makes every appended byte durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Cuts the log down to `len` bytes.
    ///
    /// Used to drop a torn tail frame on open and to rewrite the log during
    /// compaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::InvalidTruncate`] if `len` is greater
    /// than the current size.
    fn truncate(&mut self, len: u64) -> StorageResult<()>;

    /// Reads the whole log.
    ///
    /// # Errors
    ///
    /// Returns an error if the size or the read fails.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        let len = usize::try_from(size).map_err(|_| crate::StorageError::ReadPastEnd {
            offset: 0,
            len: usize::MAX,
            size,
        })?;
        self.read_at(0, len)
    }
}
