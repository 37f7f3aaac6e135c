use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::storage::file::BlockId;

/// Default time to wait for a lock before reporting a timeout.
pub const MAX_WAIT: Duration = Duration::from_secs(10);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("lock acquisition timed out on block {0}")]
    Timeout(BlockId),
}

pub type Result<T> = std::result::Result<T, LockError>;

/// The global lock table, shared by every transaction.
///
/// Each entry maps a block to its lock state: `-1` means one exclusive
/// holder, a positive count means that many shared holders, and an absent
/// entry means the block is free. Waiters block on the condition variable
/// and re-check their predicate on every wake; the timeout is the only
/// deadlock avoidance, so a transaction that times out must roll back.
pub struct LockTable {
    locks: Mutex<HashMap<BlockId, i32>>,
    cond: Condvar,
    max_wait: Duration,
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LockTable {
    pub fn new() -> Self {
        Self::with_max_wait(MAX_WAIT)
    }

    /// Like `new` with a custom wait bound; tests use short waits.
    pub fn with_max_wait(max_wait: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            cond: Condvar::new(),
            max_wait,
        }
    }

    /// Acquires a shared lock, waiting out any exclusive holder.
    pub fn slock(&self, block: &BlockId) -> Result<()> {
        let deadline = Instant::now() + self.max_wait;
        let mut locks = self.locks.lock();
        while Self::has_xlock(&locks, block) {
            if Instant::now() >= deadline {
                return Err(LockError::Timeout(block.clone()));
            }
            let _ = self.cond.wait_until(&mut locks, deadline);
        }
        *locks.entry(block.clone()).or_insert(0) += 1;
        Ok(())
    }

    /// Upgrades to an exclusive lock. The caller must already hold a shared
    /// lock on the block, so only other shared holders can be in the way;
    /// waiting for the count to drop to one avoids upgrade deadlocks against
    /// exclusive requesters.
    pub fn xlock(&self, block: &BlockId) -> Result<()> {
        let deadline = Instant::now() + self.max_wait;
        let mut locks = self.locks.lock();
        while Self::has_other_slocks(&locks, block) {
            if Instant::now() >= deadline {
                return Err(LockError::Timeout(block.clone()));
            }
            let _ = self.cond.wait_until(&mut locks, deadline);
        }
        locks.insert(block.clone(), -1);
        Ok(())
    }

    /// Releases one lock on the block. The last holder removes the entry
    /// and wakes every waiter.
    pub fn unlock(&self, block: &BlockId) {
        let mut locks = self.locks.lock();
        match locks.get(block).copied() {
            Some(n) if n > 1 => {
                locks.insert(block.clone(), n - 1);
            }
            Some(_) => {
                locks.remove(block);
                self.cond.notify_all();
            }
            None => {}
        }
    }

    fn has_xlock(locks: &HashMap<BlockId, i32>, block: &BlockId) -> bool {
        locks.get(block).copied().unwrap_or(0) < 0
    }

    fn has_other_slocks(locks: &HashMap<BlockId, i32>, block: &BlockId) -> bool {
        locks.get(block).copied().unwrap_or(0) > 1
    }
}
