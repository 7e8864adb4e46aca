//! In-memory log backend.

use crate::backend::LogBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// A log held in process memory.
///
/// Clones share the same buffer, so a test can keep a handle to the bytes a
/// database wrote and reopen a second database over them.
///
/// ```rust
/// use shelfdb_storage::{InMemoryLog, LogBackend};
///
/// let mut log = InMemoryLog::new();
/// let shared = log.clone();
/// log.append(b"abc").unwrap();
/// assert_eq!(shared.size().unwrap(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryLog {
    data: Arc<RwLock<Vec<u8>>>,
}

impl InMemoryLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log that starts with `data`, for recovery tests.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns a copy of the bytes in the log.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl LogBackend for InMemoryLog {
    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = start.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[start..end].to_vec())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if len > size {
            return Err(StorageError::InvalidTruncate {
                requested: len,
                size,
            });
        }
        data.truncate(usize::try_from(len).unwrap_or(usize::MAX));
        Ok(())
    }
}
