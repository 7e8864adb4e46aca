//! Schema changes during a version upgrade.

use crate::error::{EngineError, EngineResult};
use crate::keypath::KeyPath;
use crate::schema::{IndexParams, StoreParams};
use crate::store::StoreState;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// The schema-changing transaction handed to an upgrade callback.
///
/// Changes are staged on copies. They become visible, and are written to
/// the log, only if the callback returns `Ok`.
#[derive(Debug)]
pub struct UpgradeTransaction {
    old_version: u32,
    new_version: u32,
    pub(crate) stores: BTreeMap<String, Arc<StoreState>>,
}

impl UpgradeTransaction {
    pub(crate) fn new(
        old_version: u32,
        new_version: u32,
        stores: BTreeMap<String, Arc<StoreState>>,
    ) -> Self {
        Self {
            old_version,
            new_version,
            stores,
        }
    }

    /// Version before the upgrade. `0` for a new database.
    #[must_use]
    pub fn old_version(&self) -> u32 {
        self.old_version
    }

    /// Version being upgraded to.
    #[must_use]
    pub fn new_version(&self) -> u32 {
        self.new_version
    }

    /// Names of all stores, sorted.
    #[must_use]
    pub fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    /// Returns `true` if a store with this name exists.
    #[must_use]
    pub fn contains_store(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// Creates a store.
    ///
    /// # Errors
    ///
    /// - [`EngineError::StoreExists`] if the name is taken
    /// - [`EngineError::Data`] for an empty name or a composite key path
    pub fn create_store(
        &mut self,
        name: &str,
        params: StoreParams,
    ) -> EngineResult<UpgradeStore<'_>> {
        if name.is_empty() {
            return Err(EngineError::data("store name must not be empty"));
        }
        if self.stores.contains_key(name) {
            return Err(EngineError::StoreExists {
                name: name.to_string(),
            });
        }
        params.validate()?;

        debug!(store = name, key_path = ?params.key_path, auto_increment = params.auto_increment, "creating store");
        let state = self
            .stores
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(StoreState::new(params)));
        Ok(UpgradeStore {
            name: name.to_string(),
            state,
        })
    }

    /// Opens an existing store for index changes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StoreNotFound`] if there is no such store.
    pub fn store(&mut self, name: &str) -> EngineResult<UpgradeStore<'_>> {
        let state = self
            .stores
            .get_mut(name)
            .ok_or_else(|| EngineError::store_not_found(name))?;
        Ok(UpgradeStore {
            name: name.to_string(),
            state,
        })
    }
}

/// A store inside an [`UpgradeTransaction`].
#[derive(Debug)]
pub struct UpgradeStore<'a> {
    name: String,
    state: &'a mut Arc<StoreState>,
}

impl UpgradeStore<'_> {
    /// The store's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The store's creation parameters.
    #[must_use]
    pub fn params(&self) -> &StoreParams {
        &self.state.params
    }

    /// The store's key path.
    #[must_use]
    pub fn key_path(&self) -> Option<&KeyPath> {
        self.state.params.key_path.as_ref()
    }

    /// Names of the store's indexes, sorted.
    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        self.state.indexes.keys().cloned().collect()
    }

    /// Returns `true` if the store has an index with this name.
    #[must_use]
    pub fn contains_index(&self, name: &str) -> bool {
        self.state.indexes.contains_key(name)
    }

    /// Creates an index and fills it from the records already stored.
    ///
    /// # Errors
    ///
    /// - [`EngineError::IndexExists`] if the name is taken
    /// - [`EngineError::Constraint`] if a unique index meets duplicates
    /// - [`EngineError::Data`] for an invalid key path
    pub fn create_index(&mut self, name: &str, params: IndexParams) -> EngineResult<()> {
        if name.is_empty() {
            return Err(EngineError::data("index name must not be empty"));
        }
        debug!(store = %self.name, index = name, key_path = ?params.key_path, "creating index");
        Arc::make_mut(self.state).create_index(&self.name, name, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_store_then_index() {
        let mut upgrade = UpgradeTransaction::new(0, 1, BTreeMap::new());
        {
            let mut store = upgrade
                .create_store("time", StoreParams::new().key_path("id"))
                .unwrap();
            store.create_index("by_value", IndexParams::new("value")).unwrap();
            assert!(store.contains_index("by_value"));
            assert_eq!(store.key_path(), Some(&KeyPath::from("id")));
        }
        assert!(upgrade.contains_store("time"));
        assert_eq!(upgrade.store_names(), vec!["time".to_string()]);
        assert_eq!(upgrade.store("time").unwrap().index_names(), vec!["by_value"]);
    }

    #[test]
    fn duplicate_store_and_bad_names_fail() {
        let mut upgrade = UpgradeTransaction::new(0, 1, BTreeMap::new());
        upgrade.create_store("a", StoreParams::new()).unwrap();
        assert!(matches!(
            upgrade.create_store("a", StoreParams::new()),
            Err(EngineError::StoreExists { .. })
        ));
        assert!(upgrade.create_store("", StoreParams::new()).is_err());
        assert!(upgrade
            .create_store("b", StoreParams::new().key_path(["x", "y"]))
            .is_err());
        assert!(matches!(
            upgrade.store("missing"),
            Err(EngineError::StoreNotFound { .. })
        ));
    }

    #[test]
    fn staged_index_does_not_touch_shared_state() {
        let shared = Arc::new(StoreState::new(StoreParams::new()));
        let mut stores = BTreeMap::new();
        stores.insert("a".to_string(), Arc::clone(&shared));

        let mut upgrade = UpgradeTransaction::new(1, 2, stores);
        upgrade
            .store("a")
            .unwrap()
            .create_index("by_x", IndexParams::new("x"))
            .unwrap();
        assert!(shared.indexes.is_empty());
        assert!(upgrade.stores["a"].indexes.contains_key("by_x"));
    }
}
