pub mod buffer_list;
pub mod concurrency;
pub mod recovery;

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::storage::buffer::{BufferError, BufferManager};
use crate::storage::file::{BlockId, FileError, FileManager};
use crate::storage::log::{LogError, LogManager};
use buffer_list::BufferList;
use concurrency::{ConcurrencyManager, LockError, LockTable};
use recovery::{RecoveryError, RecoveryManager};

/// Pseudo block number used to lock a file's end-of-file marker. It never
/// corresponds to an on-disk block; it only serves as a lock-table key that
/// serializes file growth against size checks.
pub const END_OF_FILE: i32 = -1;

/// Process-wide transaction number allocator; numbers are never recycled.
static NEXT_TXNUM: AtomicI32 = AtomicI32::new(0);

fn next_tx_number() -> i32 {
    NEXT_TXNUM.fetch_add(1, Ordering::SeqCst) + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error("block {0} is not pinned by this transaction")]
    NotPinned(BlockId),

    #[error("buffer has no assigned block")]
    UnassignedBuffer,

    #[error("transaction {0} is no longer active")]
    NotActive(i32),
}

pub type Result<T> = std::result::Result<T, TransactionError>;

/// A database transaction.
///
/// Binds the buffer pool, the lock table and the recovery manager behind a
/// single typed interface: reads take shared block locks, writes take
/// exclusive locks and log their pre-images, and `commit`/`rollback` release
/// everything. Once a transaction reaches a terminal state, further
/// operations are rejected.
///
/// A transaction that fails with a lock timeout or a buffer abort must be
/// rolled back by the caller; the engine never retries on its own.
pub struct Transaction {
    fm: Arc<FileManager>,
    rm: RecoveryManager,
    cm: ConcurrencyManager,
    bm: Arc<BufferManager>,
    buffers: BufferList,
    txnum: i32,
    state: TransactionState,
}

impl Transaction {
    /// Starts a new transaction, allocating its number and logging START.
    pub fn new(
        fm: Arc<FileManager>,
        lm: Arc<LogManager>,
        bm: Arc<BufferManager>,
        locktable: Arc<LockTable>,
    ) -> Result<Self> {
        let txnum = next_tx_number();
        let rm = RecoveryManager::new(lm, bm.clone(), txnum)?;
        Ok(Self {
            fm,
            rm,
            cm: ConcurrencyManager::new(locktable),
            bm: bm.clone(),
            buffers: BufferList::new(bm),
            txnum,
            state: TransactionState::Active,
        })
    }

    pub fn tx_number(&self) -> i32 {
        self.txnum
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Commits: flushes this transaction's changes, forces the COMMIT
    /// record, then releases locks and pins.
    pub fn commit(&mut self) -> Result<()> {
        self.check_active()?;
        self.rm.commit()?;
        log::info!("transaction {} committed", self.txnum);
        self.cm.release();
        self.buffers.unpin_all();
        self.state = TransactionState::Committed;
        Ok(())
    }

    /// Rolls back: undoes this transaction's logged changes, forces the
    /// ROLLBACK record, then releases locks and pins.
    pub fn rollback(&mut self) -> Result<()> {
        self.check_active()?;
        let rm = self.rm.clone();
        rm.rollback(self)?;
        log::info!("transaction {} rolled back", self.txnum);
        self.cm.release();
        self.buffers.unpin_all();
        self.state = TransactionState::RolledBack;
        Ok(())
    }

    /// Runs startup recovery inside this transaction: every unfinished
    /// transaction found in the log is undone and a quiescent checkpoint is
    /// written. Intended to be called once, before any user transactions.
    pub fn recover(&mut self) -> Result<()> {
        self.check_active()?;
        log::info!("recovering database");
        let rm = self.rm.clone();
        rm.recover(self)
    }

    /// Pins the block into the buffer pool on behalf of this transaction.
    pub fn pin(&mut self, block: &BlockId) -> Result<()> {
        self.check_active()?;
        self.buffers.pin(block)?;
        Ok(())
    }

    /// Releases one of this transaction's pins on the block.
    pub fn unpin(&mut self, block: &BlockId) -> Result<()> {
        if !self.buffers.unpin(block) {
            return Err(TransactionError::NotPinned(block.clone()));
        }
        Ok(())
    }

    /// Reads an integer from a pinned block under a shared lock.
    pub fn get_int(&mut self, block: &BlockId, offset: usize) -> Result<i32> {
        self.check_active()?;
        self.cm.slock(block)?;
        let buff = self
            .buffers
            .buffer(block)
            .ok_or_else(|| TransactionError::NotPinned(block.clone()))?;
        let guard = buff.lock();
        Ok(guard.contents().get_int(offset))
    }

    /// Reads a string from a pinned block under a shared lock.
    pub fn get_string(&mut self, block: &BlockId, offset: usize) -> Result<String> {
        self.check_active()?;
        self.cm.slock(block)?;
        let buff = self
            .buffers
            .buffer(block)
            .ok_or_else(|| TransactionError::NotPinned(block.clone()))?;
        let guard = buff.lock();
        Ok(guard.contents().get_string(offset))
    }

    /// Writes an integer to a pinned block under an exclusive lock. With
    /// `ok_to_log` the old value is first captured into an undo record;
    /// formatting paths pass false because the prior contents are garbage.
    pub fn set_int(
        &mut self,
        block: &BlockId,
        offset: usize,
        val: i32,
        ok_to_log: bool,
    ) -> Result<()> {
        self.check_active()?;
        self.cm.xlock(block)?;
        let buff = self
            .buffers
            .buffer(block)
            .ok_or_else(|| TransactionError::NotPinned(block.clone()))?;
        let mut guard = buff.lock();
        let lsn = if ok_to_log {
            self.rm.set_int(&mut guard, offset)?
        } else {
            -1
        };
        guard.contents_mut().set_int(offset, val);
        guard.set_modified(self.txnum, lsn);
        Ok(())
    }

    /// Writes a string to a pinned block under an exclusive lock.
    pub fn set_string(
        &mut self,
        block: &BlockId,
        offset: usize,
        val: &str,
        ok_to_log: bool,
    ) -> Result<()> {
        self.check_active()?;
        self.cm.xlock(block)?;
        let buff = self
            .buffers
            .buffer(block)
            .ok_or_else(|| TransactionError::NotPinned(block.clone()))?;
        let mut guard = buff.lock();
        let lsn = if ok_to_log {
            self.rm.set_string(&mut guard, offset)?
        } else {
            -1
        };
        guard.contents_mut().set_string(offset, val);
        guard.set_modified(self.txnum, lsn);
        Ok(())
    }

    /// Number of blocks in the file, under a shared lock on the file's
    /// end-of-file marker so the size cannot move underneath the caller.
    pub fn size(&mut self, filename: &str) -> Result<i32> {
        self.check_active()?;
        let eof_block = BlockId::new(filename, END_OF_FILE);
        self.cm.slock(&eof_block)?;
        Ok(self.fm.length(filename)?)
    }

    /// Appends a block to the file, under an exclusive lock on the file's
    /// end-of-file marker to serialize growth.
    pub fn append(&mut self, filename: &str) -> Result<BlockId> {
        self.check_active()?;
        let eof_block = BlockId::new(filename, END_OF_FILE);
        self.cm.xlock(&eof_block)?;
        Ok(self.fm.append(filename)?)
    }

    pub fn block_size(&self) -> usize {
        self.fm.block_size()
    }

    pub fn available_buffers(&self) -> usize {
        self.bm.available()
    }

    fn check_active(&self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(TransactionError::NotActive(self.txnum));
        }
        Ok(())
    }
}
