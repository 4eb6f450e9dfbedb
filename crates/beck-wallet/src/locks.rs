//! Lock manager: outputs excluded from automatic coin selection.
//!
//! Locks are memory-only by default; persistent locks are written through
//! the durable [`LockStore`] and reloaded on startup. Unlocking always
//! clears both memory and durable state, however the lock was taken.
//!
//! Distinct from build-scoped reservations (see
//! [`builder`](crate::builder)): locks are user-facing and outlive
//! requests; reservations exist only for the duration of one build.

use std::collections::HashMap;

use beck_core::traits::LockStore;
use beck_core::types::OutPoint;
use tracing::debug;

use crate::error::WalletError;

/// Tracks outputs excluded from automatic selection.
#[derive(Debug, Default)]
pub struct LockManager {
    /// Locked outpoint → whether the lock is persisted.
    locked: HashMap<OutPoint, bool>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock an output.
    ///
    /// Re-locking an already-locked output with `persistent = false` is an
    /// idempotent no-op and returns `Ok(false)`. Re-locking with
    /// `persistent = true` promotes a memory lock to a durable one.
    /// Returns `Ok(true)` when the lock state changed.
    pub fn lock(
        &mut self,
        outpoint: OutPoint,
        persistent: bool,
        store: &dyn LockStore,
    ) -> Result<bool, WalletError> {
        match self.locked.get(&outpoint).copied() {
            Some(true) => Ok(false),
            Some(false) if !persistent => Ok(false),
            Some(false) => {
                store.persist_lock(&outpoint)?;
                self.locked.insert(outpoint, true);
                debug!(%outpoint, "promoted lock to persistent");
                Ok(true)
            }
            None => {
                if persistent {
                    store.persist_lock(&outpoint)?;
                }
                self.locked.insert(outpoint, persistent);
                debug!(%outpoint, persistent, "locked coin");
                Ok(true)
            }
        }
    }

    /// Unlock an output. Fails with [`WalletError::NotLocked`] if it is not
    /// locked. Durable state is cleared regardless of how the lock was
    /// taken.
    pub fn unlock(
        &mut self,
        outpoint: OutPoint,
        store: &dyn LockStore,
    ) -> Result<(), WalletError> {
        if !self.locked.contains_key(&outpoint) {
            return Err(WalletError::NotLocked(outpoint));
        }
        store.erase_lock(&outpoint)?;
        self.locked.remove(&outpoint);
        debug!(%outpoint, "unlocked coin");
        Ok(())
    }

    /// Clear every lock, durable entries included.
    ///
    /// Durable erasure happens before memory is touched, so a store failure
    /// leaves the lock set unchanged.
    pub fn unlock_all(&mut self, store: &dyn LockStore) -> Result<(), WalletError> {
        for (outpoint, persistent) in &self.locked {
            if *persistent {
                store.erase_lock(outpoint)?;
            }
        }
        let count = self.locked.len();
        self.locked.clear();
        debug!(count, "unlocked all coins");
        Ok(())
    }

    /// Lock a batch that has already been validated by the caller.
    ///
    /// All-or-nothing over the durable store: if persisting entry `k`
    /// fails, entries `0..k` are erased again and no memory state changes.
    pub fn lock_many(
        &mut self,
        outpoints: &[OutPoint],
        persistent: bool,
        store: &dyn LockStore,
    ) -> Result<(), WalletError> {
        if persistent {
            let mut written = Vec::with_capacity(outpoints.len());
            for outpoint in outpoints {
                if let Err(e) = store.persist_lock(outpoint) {
                    for undo in written {
                        let _ = store.erase_lock(undo);
                    }
                    return Err(e.into());
                }
                written.push(outpoint);
            }
        }
        for outpoint in outpoints {
            let entry = self.locked.entry(*outpoint).or_insert(persistent);
            *entry |= persistent;
        }
        Ok(())
    }

    /// Unlock a batch that has already been validated by the caller.
    ///
    /// All-or-nothing over the durable store: if erasing entry `k` fails,
    /// the persistent entries among `0..k` are written back and no memory
    /// state changes.
    pub fn unlock_many(
        &mut self,
        outpoints: &[OutPoint],
        store: &dyn LockStore,
    ) -> Result<(), WalletError> {
        let mut erased = Vec::with_capacity(outpoints.len());
        for outpoint in outpoints {
            if let Err(e) = store.erase_lock(outpoint) {
                for undo in erased {
                    if self.locked.get(undo).copied() == Some(true) {
                        let _ = store.persist_lock(undo);
                    }
                }
                return Err(e.into());
            }
            erased.push(outpoint);
        }
        for outpoint in outpoints {
            self.locked.remove(outpoint);
        }
        Ok(())
    }

    /// Adopt locks loaded from the durable store.
    pub fn adopt_persisted(&mut self, outpoints: impl IntoIterator<Item = OutPoint>) -> usize {
        let mut adopted = 0;
        for outpoint in outpoints {
            self.locked.insert(outpoint, true);
            adopted += 1;
        }
        adopted
    }

    pub fn is_locked(&self, outpoint: &OutPoint) -> bool {
        self.locked.contains_key(outpoint)
    }

    /// All locked outpoints, ordered for stable output.
    pub fn list_locked(&self) -> Vec<OutPoint> {
        let mut out: Vec<OutPoint> = self.locked.keys().copied().collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        self.locked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLockStore;
    use beck_core::error::StoreError;
    use beck_core::types::Hash256;

    fn op(tag: u8) -> OutPoint {
        OutPoint::new(Hash256([tag; 32]), tag as u32)
    }

    /// Store that fails after a set number of writes.
    struct FlakyStore {
        inner: MemoryLockStore,
        fail_after: std::sync::atomic::AtomicUsize,
    }

    impl FlakyStore {
        fn new(fail_after: usize) -> Self {
            Self {
                inner: MemoryLockStore::new(),
                fail_after: std::sync::atomic::AtomicUsize::new(fail_after),
            }
        }
    }

    impl LockStore for FlakyStore {
        fn persist_lock(&self, outpoint: &OutPoint) -> Result<(), StoreError> {
            use std::sync::atomic::Ordering;
            if self.fail_after.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_err() {
                return Err(StoreError("write failed".into()));
            }
            self.inner.persist_lock(outpoint)
        }
        fn erase_lock(&self, outpoint: &OutPoint) -> Result<(), StoreError> {
            self.inner.erase_lock(outpoint)
        }
        fn load_locks(&self) -> Result<Vec<OutPoint>, StoreError> {
            self.inner.load_locks()
        }
    }

    #[test]
    fn lock_and_unlock() {
        let store = MemoryLockStore::new();
        let mut locks = LockManager::new();
        assert!(locks.lock(op(1), false, &store).unwrap());
        assert!(locks.is_locked(&op(1)));
        locks.unlock(op(1), &store).unwrap();
        assert!(!locks.is_locked(&op(1)));
    }

    #[test]
    fn relock_is_noop_success() {
        let store = MemoryLockStore::new();
        let mut locks = LockManager::new();
        assert!(locks.lock(op(1), false, &store).unwrap());
        assert!(!locks.lock(op(1), false, &store).unwrap());
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn unlock_never_locked_fails() {
        let store = MemoryLockStore::new();
        let mut locks = LockManager::new();
        let err = locks.unlock(op(1), &store).unwrap_err();
        assert_eq!(err, WalletError::NotLocked(op(1)));
    }

    #[test]
    fn persistent_lock_writes_store() {
        let store = MemoryLockStore::new();
        let mut locks = LockManager::new();
        locks.lock(op(1), true, &store).unwrap();
        assert_eq!(store.load_locks().unwrap(), vec![op(1)]);
        // Memory-only lock leaves the store untouched.
        locks.lock(op(2), false, &store).unwrap();
        assert_eq!(store.load_locks().unwrap(), vec![op(1)]);
    }

    #[test]
    fn promotion_writes_store() {
        let store = MemoryLockStore::new();
        let mut locks = LockManager::new();
        locks.lock(op(1), false, &store).unwrap();
        assert!(store.load_locks().unwrap().is_empty());
        assert!(locks.lock(op(1), true, &store).unwrap());
        assert_eq!(store.load_locks().unwrap(), vec![op(1)]);
        // Already persistent: nothing to change.
        assert!(!locks.lock(op(1), true, &store).unwrap());
    }

    #[test]
    fn unlock_clears_persisted_state() {
        let store = MemoryLockStore::new();
        let mut locks = LockManager::new();
        locks.lock(op(1), true, &store).unwrap();
        locks.unlock(op(1), &store).unwrap();
        assert!(store.load_locks().unwrap().is_empty());
    }

    #[test]
    fn unlock_all_clears_everything() {
        let store = MemoryLockStore::new();
        let mut locks = LockManager::new();
        locks.lock(op(1), true, &store).unwrap();
        locks.lock(op(2), false, &store).unwrap();
        locks.unlock_all(&store).unwrap();
        assert!(locks.is_empty());
        assert!(store.load_locks().unwrap().is_empty());
    }

    #[test]
    fn list_locked_is_sorted() {
        let store = MemoryLockStore::new();
        let mut locks = LockManager::new();
        locks.lock(op(3), false, &store).unwrap();
        locks.lock(op(1), false, &store).unwrap();
        locks.lock(op(2), false, &store).unwrap();
        assert_eq!(locks.list_locked(), vec![op(1), op(2), op(3)]);
    }

    #[test]
    fn lock_many_rolls_back_on_store_failure() {
        let store = FlakyStore::new(1);
        let mut locks = LockManager::new();
        let batch = [op(1), op(2), op(3)];
        let err = locks.lock_many(&batch, true, &store).unwrap_err();
        assert!(matches!(err, WalletError::Store(_)));
        assert!(locks.is_empty());
        assert!(store.load_locks().unwrap().is_empty());
    }

    #[test]
    fn lock_many_batch_succeeds() {
        let store = MemoryLockStore::new();
        let mut locks = LockManager::new();
        locks.lock_many(&[op(1), op(2)], true, &store).unwrap();
        assert_eq!(locks.len(), 2);
        assert_eq!(store.load_locks().unwrap().len(), 2);
    }

    #[test]
    fn unlock_many_restores_store_on_failure() {
        /// Store whose erase fails after a set number of calls.
        struct ErasureFails {
            inner: MemoryLockStore,
            fail_after: std::sync::atomic::AtomicUsize,
        }

        impl LockStore for ErasureFails {
            fn persist_lock(&self, outpoint: &OutPoint) -> Result<(), StoreError> {
                self.inner.persist_lock(outpoint)
            }
            fn erase_lock(&self, outpoint: &OutPoint) -> Result<(), StoreError> {
                use std::sync::atomic::Ordering;
                if self
                    .fail_after
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_err()
                {
                    return Err(StoreError("erase failed".into()));
                }
                self.inner.erase_lock(outpoint)
            }
            fn load_locks(&self) -> Result<Vec<OutPoint>, StoreError> {
                self.inner.load_locks()
            }
        }

        let store = ErasureFails {
            inner: MemoryLockStore::new(),
            fail_after: std::sync::atomic::AtomicUsize::new(1),
        };
        let mut locks = LockManager::new();
        locks.lock_many(&[op(1), op(2)], true, &store).unwrap();

        let err = locks.unlock_many(&[op(1), op(2)], &store).unwrap_err();
        assert!(matches!(err, WalletError::Store(_)));
        // Both locks still held, and the store matches memory again.
        assert_eq!(locks.len(), 2);
        assert_eq!(store.load_locks().unwrap().len(), 2);
    }

    #[test]
    fn adopt_persisted_restores_locks() {
        let mut locks = LockManager::new();
        assert_eq!(locks.adopt_persisted([op(1), op(2)]), 2);
        assert!(locks.is_locked(&op(1)));
        // Adopted locks count as persistent: unlock erases from the store.
        let store = MemoryLockStore::new();
        store.persist_lock(&op(1)).unwrap();
        locks.unlock(op(1), &store).unwrap();
        assert!(store.load_locks().unwrap().is_empty());
    }
}
