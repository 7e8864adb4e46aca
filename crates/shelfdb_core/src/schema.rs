//! Collection declarations and the schema manager.
//!
//! Declarations describe the collections an application expects. The
//! schema manager runs them inside the engine's upgrade step: absent
//! collections are created with their indexes, present collections only
//! gain the indexes they lack. Key paths of existing collections are never
//! touched.

use serde::{Deserialize, Serialize};
use shelfdb_engine::{Database, EngineResult, IndexParams, KeyPath, StoreParams, UpgradeTransaction};
use tracing::debug;

/// Declares one collection.
///
/// Deserializes from the same shape applications write in configuration:
///
/// ```json
/// { "storeName": "time", "keyPath": "id", "indexes": ["value"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDeclaration {
    /// Collection name.
    #[serde(alias = "storeName")]
    pub name: String,

    /// In-line key path; absent means engine-assigned keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<KeyPath>,

    /// Key generator flag. Unset means on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_increment: Option<bool>,

    /// Indexes the collection must have.
    #[serde(default)]
    pub indexes: Vec<IndexDeclaration>,
}

impl StoreDeclaration {
    /// Declares a collection with engine-assigned keys.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: None,
            auto_increment: None,
            indexes: Vec::new(),
        }
    }

    /// Sets the in-line key path.
    #[must_use]
    pub fn key_path(mut self, path: impl Into<KeyPath>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Sets the key generator flag explicitly.
    #[must_use]
    pub fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = Some(value);
        self
    }

    /// Adds an index declaration.
    #[must_use]
    pub fn index(mut self, index: impl Into<IndexDeclaration>) -> Self {
        self.indexes.push(index.into());
        self
    }

    /// Engine parameters for creating this collection.
    #[must_use]
    pub fn params(&self) -> StoreParams {
        StoreParams {
            key_path: self.key_path.clone(),
            auto_increment: self.auto_increment.unwrap_or(true),
        }
    }
}

/// Declares one index.
///
/// A bare string names an index whose key path is the same string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IndexRepr", rename_all = "camelCase")]
pub struct IndexDeclaration {
    /// Index name.
    pub name: String,
    /// Path the indexed value is read from.
    pub key_path: KeyPath,
    /// Whether index keys must be unique.
    pub unique: bool,
    /// Whether array values index each element.
    pub multi_entry: bool,
}

impl IndexDeclaration {
    /// Declares a non-unique, single-entry index.
    #[must_use]
    pub fn new(name: impl Into<String>, key_path: impl Into<KeyPath>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            unique: false,
            multi_entry: false,
        }
    }

    /// Sets the uniqueness flag.
    #[must_use]
    pub fn unique(mut self, value: bool) -> Self {
        self.unique = value;
        self
    }

    /// Sets the multi-entry flag.
    #[must_use]
    pub fn multi_entry(mut self, value: bool) -> Self {
        self.multi_entry = value;
        self
    }

    /// Engine parameters for creating this index.
    #[must_use]
    pub fn params(&self) -> IndexParams {
        IndexParams::new(self.key_path.clone())
            .unique(self.unique)
            .multi_entry(self.multi_entry)
    }
}

impl From<&str> for IndexDeclaration {
    fn from(name: &str) -> Self {
        Self::new(name, name)
    }
}

impl From<String> for IndexDeclaration {
    fn from(name: String) -> Self {
        Self::new(name.clone(), name)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IndexRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default, rename = "keyPath")]
        key_path: Option<KeyPath>,
        #[serde(default)]
        unique: bool,
        #[serde(default, rename = "multiEntry")]
        multi_entry: bool,
    },
}

impl From<IndexRepr> for IndexDeclaration {
    fn from(repr: IndexRepr) -> Self {
        match repr {
            IndexRepr::Name(name) => Self::from(name),
            IndexRepr::Full {
                name,
                key_path,
                unique,
                multi_entry,
            } => {
                let key_path = key_path.unwrap_or_else(|| KeyPath::Single(name.clone()));
                Self::new(name, key_path)
                    .unique(unique)
                    .multi_entry(multi_entry)
            }
        }
    }
}

/// Creates every declared collection and index that does not exist yet.
///
/// Runs inside an upgrade step. An error aborts the whole upgrade.
///
/// # Errors
///
/// Returns the engine error of the first failing creation.
pub fn apply(upgrade: &mut UpgradeTransaction, declarations: &[StoreDeclaration]) -> EngineResult<()> {
    for declaration in declarations {
        if upgrade.contains_store(&declaration.name) {
            let mut store = upgrade.store(&declaration.name)?;
            for index in &declaration.indexes {
                if !store.contains_index(&index.name) {
                    store.create_index(&index.name, index.params())?;
                }
            }
        } else {
            let mut store = upgrade.create_store(&declaration.name, declaration.params())?;
            for index in &declaration.indexes {
                if !store.contains_index(&index.name) {
                    store.create_index(&index.name, index.params())?;
                }
            }
        }
    }
    debug!(
        from = upgrade.old_version(),
        to = upgrade.new_version(),
        stores = declarations.len(),
        "schema applied"
    );
    Ok(())
}

/// Returns `true` when every declared collection and index exists.
#[must_use]
pub fn is_satisfied(db: &Database, declarations: &[StoreDeclaration]) -> bool {
    declarations.iter().all(|declaration| {
        db.index_names(&declaration.name).is_some_and(|existing| {
            declaration
                .indexes
                .iter()
                .all(|index| existing.contains(&index.name))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auto_increment_defaults_to_on() {
        assert!(StoreDeclaration::new("queue").params().auto_increment);
        assert!(StoreDeclaration::new("time").key_path("id").params().auto_increment);
        assert!(!StoreDeclaration::new("time")
            .key_path("id")
            .auto_increment(false)
            .params()
            .auto_increment);
    }

    #[test]
    fn bare_index_name_is_its_key_path() {
        let index = IndexDeclaration::from("value");
        assert_eq!(index.key_path, KeyPath::from("value"));
        assert!(!index.unique);
        assert!(!index.multi_entry);
    }

    #[test]
    fn deserializes_application_shape() {
        let declaration: StoreDeclaration = serde_json::from_value(json!({
            "storeName": "time",
            "keyPath": "id",
            "autoIncrement": false,
            "indexes": [
                "value",
                {"name": "by_tag", "keyPath": "tags", "multiEntry": true},
                {"name": "email", "unique": true}
            ]
        }))
        .unwrap();

        assert_eq!(declaration.name, "time");
        assert_eq!(declaration.key_path, Some(KeyPath::from("id")));
        assert_eq!(declaration.auto_increment, Some(false));
        assert_eq!(declaration.indexes[0], IndexDeclaration::from("value"));
        assert_eq!(
            declaration.indexes[1],
            IndexDeclaration::new("by_tag", "tags").multi_entry(true)
        );
        assert_eq!(
            declaration.indexes[2],
            IndexDeclaration::new("email", "email").unique(true)
        );
    }

    #[test]
    fn minimal_declaration_deserializes() {
        let declaration: StoreDeclaration =
            serde_json::from_value(json!({"name": "queue"})).unwrap();
        assert_eq!(declaration, StoreDeclaration::new("queue"));
    }
}
