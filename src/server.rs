use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::storage::buffer::BufferManager;
use crate::storage::file::{FileError, FileManager};
use crate::storage::log::{LogError, LogManager};
use crate::transaction::concurrency::LockTable;
use crate::transaction::{Transaction, TransactionError};

pub const BLOCK_SIZE: usize = 400;
pub const BUFFER_POOL_SIZE: usize = 8;
pub const LOG_FILE: &str = "centauridb.log";

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// The assembled storage engine: one file manager, log manager, buffer pool
/// and lock table over a database directory, plus a transaction factory.
pub struct CentauriDB {
    fm: Arc<FileManager>,
    lm: Arc<LogManager>,
    bm: Arc<BufferManager>,
    locktable: Arc<LockTable>,
}

impl CentauriDB {
    /// Opens the database with explicit block size and pool size. No
    /// recovery is run; callers that skip `new` own that decision.
    pub fn with_config(
        dir: impl AsRef<Path>,
        block_size: usize,
        buffer_pool_size: usize,
    ) -> Result<Self, StartupError> {
        let fm = Arc::new(FileManager::new(dir.as_ref(), block_size)?);
        let lm = Arc::new(LogManager::new(fm.clone(), LOG_FILE)?);
        let bm = Arc::new(BufferManager::new(fm.clone(), lm.clone(), buffer_pool_size));
        Ok(Self {
            fm,
            lm,
            bm,
            locktable: Arc::new(LockTable::new()),
        })
    }

    /// Opens the database with default configuration. A brand-new directory
    /// starts clean; an existing one is put through startup recovery.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StartupError> {
        let db = Self::with_config(dir, BLOCK_SIZE, BUFFER_POOL_SIZE)?;

        let mut tx = db.new_tx()?;
        if db.fm.is_new() {
            log::info!("creating new database");
        } else {
            log::info!("recovering existing database");
            tx.recover()?;
        }
        tx.commit()?;

        Ok(db)
    }

    /// Starts a new transaction against this database.
    pub fn new_tx(&self) -> Result<Transaction, TransactionError> {
        Transaction::new(
            self.fm.clone(),
            self.lm.clone(),
            self.bm.clone(),
            self.locktable.clone(),
        )
    }

    pub fn file_mgr(&self) -> &Arc<FileManager> {
        &self.fm
    }

    pub fn log_mgr(&self) -> &Arc<LogManager> {
        &self.lm
    }

    pub fn buffer_mgr(&self) -> &Arc<BufferManager> {
        &self.bm
    }

    pub fn lock_table(&self) -> &Arc<LockTable> {
        &self.locktable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        {
            let db = CentauriDB::new(&path).unwrap();
            assert!(db.file_mgr().is_new());
            assert_eq!(db.file_mgr().block_size(), BLOCK_SIZE);
            assert_eq!(db.buffer_mgr().available(), BUFFER_POOL_SIZE);
        }
        let db = CentauriDB::new(&path).unwrap();
        assert!(!db.file_mgr().is_new());
    }

    #[test]
    fn test_transactions_get_distinct_numbers() {
        let dir = TempDir::new().unwrap();
        let db = CentauriDB::new(dir.path().join("db")).unwrap();
        let t1 = db.new_tx().unwrap();
        let t2 = db.new_tx().unwrap();
        assert!(t2.tx_number() > t1.tx_number());
    }
}
