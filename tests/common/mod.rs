use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use centauridb::storage::buffer::BufferManager;
use centauridb::storage::file::FileManager;
use centauridb::storage::log::LogManager;
use centauridb::transaction::concurrency::LockTable;
use centauridb::transaction::Transaction;

/// Timeouts are shortened so negative tests fail fast instead of waiting
/// out the 10-second production defaults.
const TEST_WAIT: Duration = Duration::from_millis(250);

/// A test engine over a database directory. Building a second instance on
/// the same directory simulates a process restart.
pub struct TestDb {
    pub fm: Arc<FileManager>,
    pub lm: Arc<LogManager>,
    pub bm: Arc<BufferManager>,
    pub locktable: Arc<LockTable>,
}

impl TestDb {
    #[allow(dead_code)]
    pub fn new(dir: &Path) -> Result<Self> {
        Self::with_pool_size(dir, 8)
    }

    #[allow(dead_code)]
    pub fn with_pool_size(dir: &Path, pool_size: usize) -> Result<Self> {
        let _ = env_logger::builder().is_test(true).try_init();
        let fm = Arc::new(FileManager::new(dir, 400)?);
        let lm = Arc::new(LogManager::new(fm.clone(), "centauridb.log")?);
        let bm = Arc::new(BufferManager::with_max_wait(
            fm.clone(),
            lm.clone(),
            pool_size,
            TEST_WAIT,
        ));
        let locktable = Arc::new(LockTable::with_max_wait(TEST_WAIT));
        Ok(Self {
            fm,
            lm,
            bm,
            locktable,
        })
    }

    pub fn new_tx(&self) -> Result<Transaction> {
        Ok(Transaction::new(
            self.fm.clone(),
            self.lm.clone(),
            self.bm.clone(),
            self.locktable.clone(),
        )?)
    }
}

#[allow(dead_code)]
pub fn test_dir() -> TempDir {
    TempDir::new().unwrap()
}
