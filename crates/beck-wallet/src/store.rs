//! Durable lock store implementations.
//!
//! [`MemoryLockStore`] backs tests and ephemeral wallets;
//! [`FileLockStore`] persists locks as a JSON array next to the wallet
//! data so they survive restarts.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use beck_core::error::StoreError;
use beck_core::traits::LockStore;
use beck_core::types::OutPoint;
use parking_lot::Mutex;

/// In-memory lock store.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    locks: Mutex<BTreeSet<OutPoint>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockStore for MemoryLockStore {
    fn persist_lock(&self, outpoint: &OutPoint) -> Result<(), StoreError> {
        self.locks.lock().insert(*outpoint);
        Ok(())
    }

    fn erase_lock(&self, outpoint: &OutPoint) -> Result<(), StoreError> {
        self.locks.lock().remove(outpoint);
        Ok(())
    }

    fn load_locks(&self) -> Result<Vec<OutPoint>, StoreError> {
        Ok(self.locks.lock().iter().copied().collect())
    }
}

/// JSON-file-backed lock store.
///
/// The whole set is rewritten on every change; lock sets are small and the
/// simplicity beats incremental updates.
#[derive(Debug)]
pub struct FileLockStore {
    path: PathBuf,
    cached: Mutex<BTreeSet<OutPoint>>,
}

impl FileLockStore {
    /// Open a store at `path`, loading any existing lock file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let cached = if path.exists() {
            let data = std::fs::read(&path).map_err(|e| StoreError(e.to_string()))?;
            serde_json::from_slice(&data)
                .map_err(|e| StoreError(format!("corrupt lock file: {e}")))?
        } else {
            BTreeSet::new()
        };
        Ok(Self {
            path,
            cached: Mutex::new(cached),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_out(&self, locks: &BTreeSet<OutPoint>) -> Result<(), StoreError> {
        let data =
            serde_json::to_vec_pretty(locks).map_err(|e| StoreError(e.to_string()))?;
        std::fs::write(&self.path, data).map_err(|e| StoreError(e.to_string()))
    }
}

impl LockStore for FileLockStore {
    fn persist_lock(&self, outpoint: &OutPoint) -> Result<(), StoreError> {
        let mut locks = self.cached.lock();
        if locks.insert(*outpoint) {
            self.write_out(&locks)?;
        }
        Ok(())
    }

    fn erase_lock(&self, outpoint: &OutPoint) -> Result<(), StoreError> {
        let mut locks = self.cached.lock();
        if locks.remove(outpoint) {
            self.write_out(&locks)?;
        }
        Ok(())
    }

    fn load_locks(&self) -> Result<Vec<OutPoint>, StoreError> {
        Ok(self.cached.lock().iter().copied().collect())
    }
}
