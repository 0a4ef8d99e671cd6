//! Records held by the two stores

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::app_id::AppId;
use crate::error::{Result, SyncError};

/// Default namespace for categories owned by this crate.
pub const DEFAULT_CATEGORY_PREFIX: &str = "srm-";

/// Namespaced key shared by both stores for a category name.
pub fn category_key(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name)
}

/// A category as kept in the client's UI cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub name: String,
    #[serde(default)]
    pub added: Vec<AppId>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl CategoryRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            added: Vec::new(),
            is_deleted: false,
        }
    }

    /// Deleted records count as absent.
    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }
}

/// All category records of one user, by key.
pub type CategoryRecords = BTreeMap<String, CategoryRecord>;

/// A collection entry inside `localconfig.vdf`'s `user-collections` payload.
///
/// Fields the client adds that are not modelled here survive in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub id: String,
    pub added: Vec<AppId>,
    pub removed: Vec<AppId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CollectionRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            added: Vec::new(),
            removed: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn from_value(key: &str, value: &Value) -> Result<Self> {
        let record: Self =
            serde_json::from_value(value.clone()).map_err(|e| SyncError::Structural {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        if record.id != key {
            return Err(SyncError::Structural {
                key: key.to_string(),
                message: format!("id '{}' does not match its key", record.id),
            });
        }
        Ok(record)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// The decoded `user-collections` object.
///
/// Entries are kept as raw JSON so collections owned by the client itself
/// (favourites, hidden, dynamic collections) pass through untouched. Only
/// entries this crate reads are validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserCollections {
    entries: Map<String, Value>,
}

impl UserCollections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(entries: Map<String, Value>) -> Self {
        Self { entries }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.entries
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    /// Typed view of one entry; malformed entries are a structural error.
    pub fn get(&self, key: &str) -> Result<Option<CollectionRecord>> {
        self.entries
            .get(key)
            .map(|value| CollectionRecord::from_value(key, value))
            .transpose()
    }

    /// Insert or replace the entry keyed by `record.id`.
    pub fn insert(&mut self, record: &CollectionRecord) -> Result<()> {
        self.entries.insert(record.id.clone(), record.to_value()?);
        Ok(())
    }
}
