//! Database handle: open, upgrade, transactions and compaction.

use crate::error::{EngineError, EngineResult};
use crate::log::{self, LogEntry};
use crate::schema::StoreParams;
use crate::store::{Mutation, StoreState};
use crate::transaction::{Transaction, TransactionMode};
use crate::upgrade::UpgradeTransaction;
use parking_lot::{Mutex, RwLock};
use shelfdb_storage::LogBackend;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Options for [`Database::open`].
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Database name, used in logs.
    pub name: String,
    /// Requested schema version. `None` keeps the stored version, or opens a
    /// new database at version 1.
    pub version: Option<u32>,
    /// Whether to sync the log on every commit (safer but slower).
    pub sync_on_commit: bool,
}

impl OpenOptions {
    /// Creates options for the named database.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            sync_on_commit: true,
        }
    }

    /// Sets the requested version.
    #[must_use]
    pub const fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets whether commits sync the log.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}

pub(crate) struct StoreSlot {
    pub(crate) data: Arc<StoreState>,
    /// Held by the read-write transaction in progress.
    pub(crate) writer: Arc<AsyncMutex<()>>,
}

impl StoreSlot {
    fn new(data: Arc<StoreState>) -> Self {
        Self {
            data,
            writer: Arc::new(AsyncMutex::new(())),
        }
    }
}

pub(crate) struct Catalog {
    pub(crate) version: u32,
    pub(crate) stores: BTreeMap<String, StoreSlot>,
}

pub(crate) struct Shared {
    name: String,
    pub(crate) catalog: RwLock<Catalog>,
    log: Arc<Mutex<Box<dyn LogBackend>>>,
    sync_on_commit: bool,
    /// Serializes upgrades and compaction.
    maintenance: AsyncMutex<()>,
}

impl Shared {
    /// Appends one entry to the log off the async runtime.
    ///
    /// On failure the log is cut back to its previous size so that a later
    /// append does not land behind a partial frame.
    pub(crate) async fn append(&self, entry: &LogEntry) -> EngineResult<()> {
        let frame = log::encode_frame(entry)?;
        let log = Arc::clone(&self.log);
        let sync = self.sync_on_commit;

        run_blocking(move || {
            let mut log = log.lock();
            let start = log.size()?;
            let written = log.append(&frame).and_then(|_| {
                if sync {
                    log.sync()
                } else {
                    log.flush()
                }
            });
            if let Err(err) = written {
                if let Err(rollback) = log.truncate(start) {
                    warn!(error = %rollback, "failed to roll back partial log append");
                }
                return Err(err.into());
            }
            Ok(())
        })
        .await
    }
}

async fn run_blocking<T, F>(f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EngineError::Task {
            message: e.to_string(),
        })?
}

/// An open database.
///
/// Cheap to clone; clones share the same stores and log.
#[derive(Clone)]
pub struct Database {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.shared.name)
            .field("version", &self.version())
            .field("stores", &self.store_names())
            .finish()
    }
}

impl Database {
    /// Opens a database over `log`.
    ///
    /// The log is replayed first. If the requested version is above the
    /// stored one, `upgrade` runs and its schema changes are written to the
    /// log before the database is returned.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Version`] if the requested version is below the
    ///   stored one
    /// - [`EngineError::Corrupted`] if the log fails validation
    /// - any error returned by `upgrade`, in which case nothing is applied
    pub async fn open<F>(
        options: OpenOptions,
        log: Box<dyn LogBackend>,
        upgrade: F,
    ) -> EngineResult<Self>
    where
        F: FnOnce(&mut UpgradeTransaction) -> EngineResult<()>,
    {
        let log = Arc::new(Mutex::new(log));
        let replay_log = Arc::clone(&log);
        let recovered = run_blocking(move || {
            let mut guard = replay_log.lock();
            log::recover(&mut **guard)
        })
        .await?;

        let current = recovered.version;
        let stores = recovered
            .stores
            .into_iter()
            .map(|(name, state)| (name, StoreSlot::new(Arc::new(state))))
            .collect();

        let db = Self {
            shared: Arc::new(Shared {
                name: options.name,
                catalog: RwLock::new(Catalog {
                    version: current,
                    stores,
                }),
                log,
                sync_on_commit: options.sync_on_commit,
                maintenance: AsyncMutex::new(()),
            }),
        };

        let requested = options.version.unwrap_or(current.max(1));
        if requested < current {
            return Err(EngineError::Version { requested, current });
        }
        if requested > current {
            db.upgrade(requested, upgrade).await?;
        }

        debug!(name = %db.shared.name, version = db.version(), "database opened");
        Ok(db)
    }

    /// Raises the schema version and applies `f` as the upgrade step.
    ///
    /// Waits for in-flight read-write transactions to finish.
    ///
    /// # Errors
    ///
    /// [`EngineError::Version`] unless `version` is above the current one,
    /// or any error from `f` or from writing the log. On error nothing is
    /// applied.
    pub async fn upgrade<F>(&self, version: u32, f: F) -> EngineResult<()>
    where
        F: FnOnce(&mut UpgradeTransaction) -> EngineResult<()>,
    {
        let _maintenance = self.shared.maintenance.lock().await;
        let _writers = self.lock_writers().await;

        let (current, stores) = {
            let catalog = self.shared.catalog.read();
            let stores: BTreeMap<String, Arc<StoreState>> = catalog
                .stores
                .iter()
                .map(|(name, slot)| (name.clone(), Arc::clone(&slot.data)))
                .collect();
            (catalog.version, stores)
        };
        if version <= current {
            return Err(EngineError::Version {
                requested: version,
                current,
            });
        }

        debug!(name = %self.shared.name, from = current, to = version, "running upgrade");
        let mut txn = UpgradeTransaction::new(current, version, stores);
        f(&mut txn)?;

        self.shared
            .append(&LogEntry::schema(version, &txn.stores))
            .await?;

        let mut catalog = self.shared.catalog.write();
        catalog.version = version;
        for (name, data) in txn.stores {
            match catalog.stores.get_mut(&name) {
                Some(slot) => slot.data = data,
                None => {
                    catalog.stores.insert(name, StoreSlot::new(data));
                }
            }
        }
        Ok(())
    }

    /// Takes every store's writer lock, in name order.
    async fn lock_writers(&self) -> Vec<OwnedMutexGuard<()>> {
        let writers: Vec<Arc<AsyncMutex<()>>> = self
            .shared
            .catalog
            .read()
            .stores
            .values()
            .map(|slot| Arc::clone(&slot.writer))
            .collect();

        let mut guards = Vec::with_capacity(writers.len());
        for writer in writers {
            guards.push(writer.lock_owned().await);
        }
        guards
    }

    /// Begins a transaction on one store.
    ///
    /// A read-write transaction waits for the previous one on the same store
    /// to finish. A read-only transaction reads the last committed state and
    /// never waits.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StoreNotFound`] if there is no such store.
    pub async fn transaction(&self, store: &str, mode: TransactionMode) -> EngineResult<Transaction> {
        let writer = match mode {
            TransactionMode::ReadOnly => None,
            TransactionMode::ReadWrite => {
                let lock = self
                    .shared
                    .catalog
                    .read()
                    .stores
                    .get(store)
                    .map(|slot| Arc::clone(&slot.writer))
                    .ok_or_else(|| EngineError::store_not_found(store))?;
                Some(lock.lock_owned().await)
            }
        };

        let snapshot = self
            .shared
            .catalog
            .read()
            .stores
            .get(store)
            .map(|slot| Arc::clone(&slot.data))
            .ok_or_else(|| EngineError::store_not_found(store))?;

        Ok(Transaction::new(
            Arc::clone(&self.shared),
            store.to_string(),
            mode,
            snapshot,
            writer,
        ))
    }

    /// Rewrites the log as one schema entry plus one commit per store.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing the log fails.
    pub async fn compact(&self) -> EngineResult<()> {
        let _maintenance = self.shared.maintenance.lock().await;
        let _writers = self.lock_writers().await;

        let (version, stores) = {
            let catalog = self.shared.catalog.read();
            let stores: BTreeMap<String, Arc<StoreState>> = catalog
                .stores
                .iter()
                .map(|(name, slot)| (name.clone(), Arc::clone(&slot.data)))
                .collect();
            (catalog.version, stores)
        };

        let mut bytes = log::encode_frame(&LogEntry::schema(version, &stores))?;
        for (name, state) in &stores {
            let mutations = state
                .records
                .iter()
                .map(|(key, value)| Mutation::Put {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect();
            bytes.extend(log::encode_frame(&LogEntry::Commit {
                store: name.clone(),
                next_key: state.next_key,
                mutations,
            })?);
        }

        let log = Arc::clone(&self.shared.log);
        let before = run_blocking(move || {
            let mut log = log.lock();
            let previous = log.read_all()?;
            let rewritten = log
                .truncate(0)
                .and_then(|()| log.append(&bytes))
                .and_then(|_| log.sync());
            if let Err(err) = rewritten {
                warn!(error = %err, "compaction failed, restoring previous log");
                log.truncate(0)?;
                log.append(&previous)?;
                log.sync()?;
                return Err(err.into());
            }
            Ok(previous.len() as u64)
        })
        .await?;

        info!(name = %self.shared.name, before, after = self.log_size()?, "log compacted");
        Ok(())
    }

    /// The database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The current schema version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.shared.catalog.read().version
    }

    /// Names of all stores, sorted.
    #[must_use]
    pub fn store_names(&self) -> Vec<String> {
        self.shared.catalog.read().stores.keys().cloned().collect()
    }

    /// Returns `true` if the store exists.
    #[must_use]
    pub fn contains_store(&self, store: &str) -> bool {
        self.shared.catalog.read().stores.contains_key(store)
    }

    /// Index names of a store, or `None` if the store does not exist.
    #[must_use]
    pub fn index_names(&self, store: &str) -> Option<Vec<String>> {
        self.shared
            .catalog
            .read()
            .stores
            .get(store)
            .map(|slot| slot.data.indexes.keys().cloned().collect())
    }

    /// Creation parameters of a store.
    #[must_use]
    pub fn store_params(&self, store: &str) -> Option<StoreParams> {
        self.shared
            .catalog
            .read()
            .stores
            .get(store)
            .map(|slot| slot.data.params.clone())
    }

    /// Current size of the log in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report its size.
    pub fn log_size(&self) -> EngineResult<u64> {
        Ok(self.shared.log.lock().size()?)
    }
}
