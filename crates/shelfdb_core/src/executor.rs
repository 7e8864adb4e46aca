//! Transaction executor.
//!
//! Every operation runs inside exactly one engine transaction on one
//! collection. The caller's result is released only after the transaction
//! settles: a commit failure turns a successful operation into an error.

use crate::error::{CoreError, CoreResult};
use shelfdb_engine::{Database, EngineError, Transaction, TransactionMode};
use tracing::debug;

/// One open transaction waiting to be settled.
pub(crate) struct Scope {
    collection: String,
    txn: Transaction,
}

impl Scope {
    pub(crate) async fn begin(
        db: &Database,
        collection: &str,
        mode: TransactionMode,
    ) -> CoreResult<Self> {
        let txn = db
            .transaction(collection, mode)
            .await
            .map_err(|err| CoreError::transaction(collection, err))?;
        debug!(collection, ?mode, "transaction started");
        Ok(Self {
            collection: collection.to_string(),
            txn,
        })
    }

    pub(crate) fn txn(&mut self) -> &mut Transaction {
        &mut self.txn
    }

    /// Commits, then hands back `value`.
    pub(crate) async fn settle<T>(self, value: T) -> CoreResult<T> {
        let Self { collection, txn } = self;
        txn.commit()
            .await
            .map_err(|err| CoreError::transaction(collection, err))?;
        Ok(value)
    }

    /// Aborts and reports `err` as a transaction failure.
    pub(crate) fn fail<T>(self, err: EngineError) -> CoreResult<T> {
        let Self { collection, txn } = self;
        txn.abort();
        Err(CoreError::transaction(collection, err))
    }
}

/// Runs `f` in a transaction and settles it.
pub(crate) async fn run<T, F>(
    db: &Database,
    collection: &str,
    mode: TransactionMode,
    f: F,
) -> CoreResult<T>
where
    F: FnOnce(&mut Transaction) -> Result<T, EngineError>,
{
    let mut scope = Scope::begin(db, collection, mode).await?;
    match f(scope.txn()) {
        Ok(value) => scope.settle(value).await,
        Err(err) => scope.fail(err),
    }
}
