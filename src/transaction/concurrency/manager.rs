use std::collections::HashMap;
use std::sync::Arc;

use crate::storage::file::BlockId;
use crate::transaction::concurrency::lock_table::{LockError, LockTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockKind {
    Shared,
    Exclusive,
}

/// Per-transaction view of the global lock table.
///
/// Tracks which locks this transaction already holds so repeated requests
/// are free, and implements the deadlock-free upgrade: an exclusive lock is
/// always taken by first acquiring the shared lock, then upgrading. All
/// locks are held until `release`, which gives strict two-phase locking.
pub struct ConcurrencyManager {
    locktable: Arc<LockTable>,
    locks: HashMap<BlockId, LockKind>,
}

impl ConcurrencyManager {
    pub fn new(locktable: Arc<LockTable>) -> Self {
        Self {
            locktable,
            locks: HashMap::new(),
        }
    }

    /// Obtains a shared lock on the block unless one is already held.
    pub fn slock(&mut self, block: &BlockId) -> Result<(), LockError> {
        if !self.locks.contains_key(block) {
            self.locktable.slock(block)?;
            self.locks.insert(block.clone(), LockKind::Shared);
        }
        Ok(())
    }

    /// Obtains an exclusive lock on the block, upgrading a shared lock if
    /// necessary.
    pub fn xlock(&mut self, block: &BlockId) -> Result<(), LockError> {
        if self.locks.get(block) != Some(&LockKind::Exclusive) {
            if !self.locks.contains_key(block) {
                self.locktable.slock(block)?;
                self.locks.insert(block.clone(), LockKind::Shared);
            }
            self.locktable.xlock(block)?;
            self.locks.insert(block.clone(), LockKind::Exclusive);
        }
        Ok(())
    }

    /// Releases every lock held by this transaction.
    pub fn release(&mut self) {
        for block in self.locks.keys() {
            self.locktable.unlock(block);
        }
        self.locks.clear();
    }
}
