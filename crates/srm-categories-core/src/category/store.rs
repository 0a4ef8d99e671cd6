//! Category store adapter
//!
//! The client's UI cache is an external key-value database. This module
//! defines the handle contract the sync engine relies on and an in-process
//! implementation of it.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::category::record::{CategoryRecord, CategoryRecords};
use crate::error::{Result, SyncError};
use crate::plan::UserId;

/// An open per-user category store.
///
/// `read` fails with [`SyncError::StoreNotFound`] when the user has never had
/// categories; callers treat that as an empty store. A handle must be closed
/// on every path. The underlying database admits a single writer.
#[async_trait]
pub trait CategoryStore: Send {
    fn path(&self) -> &Path;

    async fn read(&mut self) -> Result<()>;

    fn get(&self, key: &str) -> Option<&CategoryRecord>;

    /// Everything loaded by `read`, plus anything `add`ed since.
    fn records(&self) -> &CategoryRecords;

    fn add(&mut self, key: &str, record: CategoryRecord);

    async fn save(&mut self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait CategoryStoreOpener: Send + Sync {
    type Store: CategoryStore;

    async fn open(&self, path: &Path, user: UserId) -> Result<Self::Store>;
}

type StoreId = (PathBuf, UserId);

#[derive(Debug, Default)]
struct MemoryState {
    stores: HashMap<StoreId, CategoryRecords>,
    open: HashSet<StoreId>,
}

/// In-process stores keyed by (path, user), shared by every handle the
/// opener hands out. Saved data outlives the handle.
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreOpener {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStoreOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store as if it had been saved earlier.
    pub fn insert(&self, path: impl Into<PathBuf>, user: UserId, records: CategoryRecords) {
        lock(&self.state).stores.insert((path.into(), user), records);
    }

    pub fn snapshot(&self, path: &Path, user: UserId) -> Option<CategoryRecords> {
        lock(&self.state)
            .stores
            .get(&(path.to_path_buf(), user))
            .cloned()
    }

    /// Handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        lock(&self.state).open.len()
    }
}

#[async_trait]
impl CategoryStoreOpener for MemoryStoreOpener {
    type Store = MemoryCategoryStore;

    async fn open(&self, path: &Path, user: UserId) -> Result<MemoryCategoryStore> {
        let id = (path.to_path_buf(), user);
        if !lock(&self.state).open.insert(id.clone()) {
            return Err(SyncError::StoreRead {
                path: path.to_path_buf(),
                message: format!("store for user {} is already open", user),
            });
        }
        Ok(MemoryCategoryStore {
            id,
            state: Arc::clone(&self.state),
            records: CategoryRecords::new(),
            closed: false,
        })
    }
}

#[derive(Debug)]
pub struct MemoryCategoryStore {
    id: StoreId,
    state: Arc<Mutex<MemoryState>>,
    records: CategoryRecords,
    closed: bool,
}

impl MemoryCategoryStore {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(SyncError::StoreWrite {
                path: self.id.0.clone(),
                message: "store handle is closed".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CategoryStore for MemoryCategoryStore {
    fn path(&self) -> &Path {
        &self.id.0
    }

    async fn read(&mut self) -> Result<()> {
        self.ensure_open()?;
        match lock(&self.state).stores.get(&self.id) {
            Some(records) => {
                self.records = records.clone();
                Ok(())
            }
            None => Err(SyncError::StoreNotFound {
                path: self.id.0.clone(),
            }),
        }
    }

    fn get(&self, key: &str) -> Option<&CategoryRecord> {
        self.records.get(key)
    }

    fn records(&self) -> &CategoryRecords {
        &self.records
    }

    fn add(&mut self, key: &str, record: CategoryRecord) {
        self.records.insert(key.to_string(), record);
    }

    async fn save(&mut self) -> Result<()> {
        self.ensure_open()?;
        lock(&self.state)
            .stores
            .insert(self.id.clone(), self.records.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            lock(&self.state).open.remove(&self.id);
        }
        Ok(())
    }
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_id::AppId;

    #[tokio::test]
    async fn test_read_missing_store_is_not_found() {
        let opener = MemoryStoreOpener::new();
        let mut store = opener.open(Path::new("/db"), UserId(1)).await.unwrap();
        let err = store.read().await.unwrap_err();
        assert!(err.is_store_not_found());
        store.close().await.unwrap();
        assert_eq!(opener.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_save_survives_reopen() {
        let opener = MemoryStoreOpener::new();
        let path = Path::new("/db");

        let mut store = opener.open(path, UserId(1)).await.unwrap();
        let mut record = CategoryRecord::new("SNES");
        record.added.push(AppId(10));
        store.add("srm-SNES", record.clone());
        store.save().await.unwrap();
        store.close().await.unwrap();

        let mut store = opener.open(path, UserId(1)).await.unwrap();
        store.read().await.unwrap();
        assert_eq!(store.get("srm-SNES"), Some(&record));
        store.close().await.unwrap();

        assert!(opener.snapshot(path, UserId(2)).is_none());
    }

    #[tokio::test]
    async fn test_second_open_is_refused_until_close() {
        let opener = MemoryStoreOpener::new();
        let path = Path::new("/db");
        let mut first = opener.open(path, UserId(1)).await.unwrap();
        assert!(opener.open(path, UserId(1)).await.is_err());
        // other users live in the same database but are separate stores
        let mut other = opener.open(path, UserId(2)).await.unwrap();
        assert_eq!(opener.open_handles(), 2);

        first.close().await.unwrap();
        other.close().await.unwrap();
        let mut again = opener.open(path, UserId(1)).await.unwrap();
        again.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_handle_rejects_save() {
        let opener = MemoryStoreOpener::new();
        let mut store = opener.open(Path::new("/db"), UserId(1)).await.unwrap();
        store.close().await.unwrap();
        store.close().await.unwrap();
        assert!(store.save().await.is_err());
    }
}
