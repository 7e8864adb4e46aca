//! File-backed log.

use crate::backend::LogBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A log stored in one file.
///
/// - `flush()` hands buffered bytes to the OS
/// - `sync()` calls `File::sync_all()`
///
/// ```no_run
/// use shelfdb_storage::{FileLog, LogBackend};
/// use std::path::Path;
///
/// let mut log = FileLog::open(Path::new("telemetry.shelf")).unwrap();
/// log.append(b"frame").unwrap();
/// log.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileLog {
    path: PathBuf,
    file: Mutex<File>,
    size: u64,
}

impl FileLog {
    /// Opens the log at `path`, creating an empty file if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size,
        })
    }

    /// Opens the log, creating missing parent directories first.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory or the file cannot be created.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogBackend for FileLog {
    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.size;
        if data.is_empty() {
            return Ok(offset);
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        self.size += data.len() as u64;

        Ok(offset)
    }

    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = self.size;
        let end = offset.saturating_add(len as u64);
        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.size)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.lock().flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> StorageResult<()> {
        if len > self.size {
            return Err(StorageError::InvalidTruncate {
                requested: len,
                size: self.size,
            });
        }

        let file = self.file.lock();
        file.set_len(len)?;
        file.sync_all()?;
        self.size = len;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.shelf");

        let log = FileLog::open(&path).unwrap();
        assert_eq!(log.size().unwrap(), 0);
        assert!(path.exists());
        assert_eq!(log.path(), path);
    }

    #[test]
    fn bytes_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.shelf");

        {
            let mut log = FileLog::open(&path).unwrap();
            log.append(b"first").unwrap();
            log.append(b"second").unwrap();
            log.sync().unwrap();
        }

        let log = FileLog::open(&path).unwrap();
        assert_eq!(log.size().unwrap(), 11);
        assert_eq!(log.read_all().unwrap(), b"firstsecond");
        assert_eq!(log.read_at(5, 6).unwrap(), b"second");
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempdir().unwrap();
        let mut log = FileLog::open(&dir.path().join("db.shelf")).unwrap();
        log.append(b"abc").unwrap();
        assert!(matches!(
            log.read_at(1, 5),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn truncate_shrinks_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.shelf");

        let mut log = FileLog::open(&path).unwrap();
        log.append(b"0123456789").unwrap();
        log.truncate(4).unwrap();
        assert_eq!(log.append(b"x").unwrap(), 4);
        drop(log);

        let log = FileLog::open(&path).unwrap();
        assert_eq!(log.read_all().unwrap(), b"0123x");
    }

    #[test]
    fn create_dirs_for_nested_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("db.shelf");
        let log = FileLog::open_with_create_dirs(&path).unwrap();
        assert_eq!(log.size().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn opening_a_directory_fails() {
        let dir = tempdir().unwrap();
        assert!(matches!(FileLog::open(dir.path()), Err(StorageError::Io(_))));
    }
}
