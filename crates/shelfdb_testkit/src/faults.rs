//! Fault injection for log backends.

use shelfdb_core::{Config, ShelfDb};
use shelfdb_storage::{InMemoryLog, LogBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared switch that makes a [`FaultyLog`] fail its writes.
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch(Arc<AtomicBool>);

impl FaultSwitch {
    /// Creates a switch in the healthy position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following append and sync fail.
    pub fn trip(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Restores normal operation.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Returns `true` while writes fail.
    pub fn is_tripped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An in-memory log whose writes fail while its switch is tripped.
#[derive(Debug, Clone)]
pub struct FaultyLog {
    inner: InMemoryLog,
    switch: FaultSwitch,
}

impl FaultyLog {
    /// Wraps `inner`, failing writes while `switch` is tripped.
    pub fn new(inner: InMemoryLog, switch: FaultSwitch) -> Self {
        Self { inner, switch }
    }

    fn check(&self) -> StorageResult<()> {
        if self.switch.is_tripped() {
            return Err(StorageError::Io(io::Error::other("injected write failure")));
        }
        Ok(())
    }
}

impl LogBackend for FaultyLog {
    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        self.check()?;
        self.inner.append(data)
    }

    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.check()?;
        self.inner.flush()
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.check()?;
        self.inner.sync()
    }

    fn truncate(&mut self, len: u64) -> StorageResult<()> {
        self.inner.truncate(len)
    }
}

/// A shelf over a [`FaultyLog`], with the switch that controls it.
pub fn faulty_shelf(config: Config) -> (ShelfDb, FaultSwitch) {
    let switch = FaultSwitch::new();
    let log = FaultyLog::new(InMemoryLog::new(), switch.clone());
    let shelf = ShelfDb::with_log_factory(config, move || -> StorageResult<Box<dyn LogBackend>> {
        Ok(Box::new(log.clone()))
    });
    (shelf, switch)
}
