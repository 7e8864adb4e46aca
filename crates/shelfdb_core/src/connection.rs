//! The connection handle.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::executor;
use crate::schema::{self, StoreDeclaration};
use shelfdb_engine::{Database, EngineError, EngineResult, OpenOptions, Transaction, TransactionMode};
use shelfdb_storage::{FileLog, InMemoryLog, LogBackend, StorageResult};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error};

/// Creates the log backend when the database is first opened.
pub type LogFactory = Arc<dyn Fn() -> StorageResult<Box<dyn LogBackend>> + Send + Sync>;

#[derive(Clone)]
enum Backing {
    Memory(InMemoryLog),
    File(PathBuf),
    Custom(LogFactory),
}

impl Backing {
    fn create(&self) -> StorageResult<Box<dyn LogBackend>> {
        match self {
            Self::Memory(log) => Ok(Box::new(log.clone())),
            Self::File(path) => Ok(Box::new(FileLog::open_with_create_dirs(path)?)),
            Self::Custom(factory) => factory(),
        }
    }
}

impl std::fmt::Debug for Backing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory(_) => f.write_str("Memory"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Handle to one ShelfDB database.
///
/// Constructing a handle does no I/O. The database is opened by the first
/// [`ShelfDb::initialize`] and cached for the handle's lifetime; every
/// other operation fails with [`CoreError::NotInitialized`] until then.
///
/// ```rust
/// use shelfdb_core::{Config, ShelfDb, StoreDeclaration};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> shelfdb_core::CoreResult<()> {
/// let shelf = ShelfDb::open_in_memory(Config::new().name("telemetry"));
/// shelf
///     .initialize(&[StoreDeclaration::new("time").key_path("id").index("value")])
///     .await?;
///
/// shelf.add("time", json!({"id": "a1", "value": 100})).await?;
/// let found = shelf.get("time", ["a1", "missing"]).await?;
/// assert_eq!(found, vec![json!({"id": "a1", "value": 100})]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ShelfDb {
    pub(crate) config: Config,
    backing: Backing,
    db: OnceCell<Database>,
}

impl ShelfDb {
    /// A handle over an in-memory log.
    #[must_use]
    pub fn open_in_memory(config: Config) -> Self {
        Self::with_backing(config, Backing::Memory(InMemoryLog::new()))
    }

    /// A handle over the log file at `path`. Missing parent directories
    /// are created on initialization.
    #[must_use]
    pub fn open_file(config: Config, path: impl Into<PathBuf>) -> Self {
        Self::with_backing(config, Backing::File(path.into()))
    }

    /// A handle over a caller-supplied log backend.
    #[must_use]
    pub fn with_log_factory<F>(config: Config, factory: F) -> Self
    where
        F: Fn() -> StorageResult<Box<dyn LogBackend>> + Send + Sync + 'static,
    {
        Self::with_backing(config, Backing::Custom(Arc::new(factory)))
    }

    fn with_backing(config: Config, backing: Backing) -> Self {
        Self {
            config,
            backing,
            db: OnceCell::new(),
        }
    }

    /// The handle's configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens the database and makes sure the declared collections exist.
    ///
    /// Idempotent: once open, later calls return the same database without
    /// looking at `schema`. Concurrent first calls wait for one shared open.
    /// A failed open leaves the handle uninitialized so it can be retried.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Init`] if the log cannot be opened, is corrupt,
    /// or the schema upgrade fails.
    pub async fn initialize(&self, schema: &[StoreDeclaration]) -> CoreResult<&Database> {
        self.db
            .get_or_try_init(|| self.open(schema))
            .await
            .inspect_err(|err| error!(name = %self.config.name, error = %err, "initialization failed"))
    }

    async fn open(&self, declarations: &[StoreDeclaration]) -> CoreResult<Database> {
        let log = self.backing.create().map_err(EngineError::from)?;

        let mut options =
            OpenOptions::new(self.config.name.clone()).sync_on_commit(self.config.sync_on_commit);
        if let Some(version) = self.config.version {
            options = options.version(version);
        }

        let db = Database::open(options, log, |upgrade| schema::apply(upgrade, declarations)).await?;

        if self.config.version.is_none() && !schema::is_satisfied(&db, declarations) {
            let next = db.version() + 1;
            debug!(name = %self.config.name, version = next, "declarations changed, upgrading schema");
            db.upgrade(next, |upgrade| schema::apply(upgrade, declarations))
                .await?;
        }

        debug!(name = %self.config.name, version = db.version(), stores = ?db.store_names(), "initialized");
        Ok(db)
    }

    /// Returns `true` once `initialize` has succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.db.initialized()
    }

    /// Collection names, or an empty list before initialization.
    #[must_use]
    pub fn store_list(&self) -> Vec<String> {
        self.db.get().map(Database::store_names).unwrap_or_default()
    }

    /// The open database.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before a successful
    /// `initialize`.
    pub fn database(&self) -> CoreResult<&Database> {
        self.db.get().ok_or(CoreError::NotInitialized)
    }

    /// Runs `f` inside one transaction on `collection`, committing if it
    /// returns `Ok`.
    ///
    /// For batches of engine calls that must succeed or fail together.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotInitialized`], or [`CoreError::Transaction`] if `f`
    /// fails or the commit does.
    pub async fn transact<T, F>(
        &self,
        collection: &str,
        mode: TransactionMode,
        f: F,
    ) -> CoreResult<T>
    where
        F: FnOnce(&mut Transaction) -> EngineResult<T>,
    {
        executor::run(self.database()?, collection, mode, f).await
    }

    /// Rewrites the log to hold only live data.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotInitialized`], or [`CoreError::Transaction`] if the
    /// rewrite fails.
    pub async fn compact(&self) -> CoreResult<()> {
        let db = self.database()?;
        db.compact()
            .await
            .map_err(|err| CoreError::transaction(db.name(), err))
    }
}
