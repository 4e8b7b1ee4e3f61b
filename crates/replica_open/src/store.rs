//! Local store engine boundary.
//!
//! The store engine owns the on-disk format. The coordinator only needs a
//! structural open: once `open_local` returns, the handle is usable even
//! if no server data has arrived yet.

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use replica_config::StoreLayout;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Opens local replicas.
pub trait StoreEngine: Send + Sync {
    /// Handle to an opened store. Handles outlive the open call.
    type Store: Clone + Send + Sync + 'static;

    /// Opens (creating if missing) the store at `layout`.
    fn open_local(&self, layout: &StoreLayout) -> StoreResult<Self::Store>;
}

/// An in-memory store handle.
///
/// Handles opened for the same layout share their contents.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    layout: Arc<StoreLayout>,
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Returns the layout this store was opened at.
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Stores a value.
    pub fn put(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.data.write().insert(key.into(), value.into());
    }

    /// Reads a value.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns true if both handles refer to the same store.
    pub fn same_store(&self, other: &MemoryStore) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

/// A store engine keeping every replica in memory.
#[derive(Debug, Default)]
pub struct MemoryStoreEngine {
    stores: Mutex<HashMap<PathBuf, MemoryStore>>,
    opens: AtomicUsize,
    corrupt: Mutex<Option<String>>,
}

impl MemoryStoreEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `open_local` calls so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Makes subsequent opens fail with `Corrupt`, or clears the failure.
    pub fn set_corrupt(&self, reason: Option<String>) {
        *self.corrupt.lock() = reason;
    }
}

impl StoreEngine for MemoryStoreEngine {
    type Store = MemoryStore;

    fn open_local(&self, layout: &StoreLayout) -> StoreResult<MemoryStore> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.corrupt.lock().clone() {
            return Err(StoreError::Corrupt(reason));
        }

        let store = self
            .stores
            .lock()
            .entry(layout.store_file().to_path_buf())
            .or_insert_with(|| MemoryStore {
                layout: Arc::new(layout.clone()),
                data: Arc::new(RwLock::new(BTreeMap::new())),
            })
            .clone();
        Ok(store)
    }
}

/// A file-backed store handle.
///
/// Holds a shared advisory lock on the lock file until the last clone is
/// dropped.
#[derive(Debug, Clone)]
pub struct FileStore {
    layout: Arc<StoreLayout>,
    _lock: Arc<File>,
}

impl FileStore {
    /// Returns the layout this store was opened at.
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Size of the store data file in bytes.
    pub fn store_size(&self) -> StoreResult<u64> {
        Ok(fs::metadata(self.layout.store_file())?.len())
    }
}

/// A store engine creating the store, lock and management entries on disk.
#[derive(Debug, Default)]
pub struct FileStoreEngine;

impl FileStoreEngine {
    /// Creates a file store engine.
    pub fn new() -> Self {
        Self
    }
}

impl StoreEngine for FileStoreEngine {
    type Store = FileStore;

    fn open_local(&self, layout: &StoreLayout) -> StoreResult<FileStore> {
        fs::create_dir_all(layout.directory())?;
        fs::create_dir_all(layout.management_dir())?;

        let lock = open_or_create(layout.lock_file())?;
        if let Err(e) = FileExt::try_lock_shared(&lock) {
            return Err(if e.kind() == io::ErrorKind::WouldBlock {
                StoreError::Locked(layout.lock_file().display().to_string())
            } else {
                StoreError::Io(e)
            });
        }

        open_or_create(layout.store_file())?;
        debug!(path = %layout.store_file().display(), "opened local store");

        Ok(FileStore {
            layout: Arc::new(layout.clone()),
            _lock: Arc::new(lock),
        })
    }
}

fn open_or_create(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}
