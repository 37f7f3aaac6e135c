use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::storage::file::{BlockId, FileError, FileManager, Page};
use crate::storage::log::LogIterator;

#[derive(Error, Debug)]
pub enum LogError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error("log record of {0} bytes does not fit in a {1}-byte block")]
    RecordTooLarge(usize, usize),
}

pub type Result<T> = std::result::Result<T, LogError>;

/// Mutable log state: the in-memory page for the block currently being
/// filled, plus the LSN bookkeeping. Guarded by the manager mutex.
#[derive(Debug)]
struct LogState {
    logpage: Page,
    current_block: BlockId,
    latest_lsn: i32,
    last_saved_lsn: i32,
}

/// The append-only system log.
///
/// Records are placed right-to-left within each block: the first word of a
/// block holds the boundary, the offset of the most recently written record.
/// New records go immediately below the boundary, so a block is read newest
/// first by walking forward from the boundary. When a record does not fit,
/// the block is flushed and a fresh one is appended.
#[derive(Debug)]
pub struct LogManager {
    fm: Arc<FileManager>,
    logfile: String,
    state: Mutex<LogState>,
}

impl LogManager {
    /// Opens the log file, positioning at its last block, or creates the
    /// first block of a brand-new log.
    pub fn new(fm: Arc<FileManager>, logfile: &str) -> Result<Self> {
        let mut logpage = Page::new(fm.block_size());
        let logsize = fm.length(logfile)?;

        let current_block = if logsize == 0 {
            Self::append_new_block(&fm, logfile, &mut logpage)?
        } else {
            let block = BlockId::new(logfile, logsize - 1);
            fm.read(&block, &mut logpage)?;
            block
        };

        Ok(Self {
            fm,
            logfile: logfile.to_string(),
            state: Mutex::new(LogState {
                logpage,
                current_block,
                latest_lsn: 0,
                last_saved_lsn: 0,
            }),
        })
    }

    /// Appends a record and returns its LSN. The record is only guaranteed
    /// to be on disk after a `flush` covering the returned LSN.
    pub fn append(&self, record: &[u8]) -> Result<i32> {
        let block_size = self.fm.block_size();
        if record.len() + 8 > block_size {
            return Err(LogError::RecordTooLarge(record.len(), block_size));
        }

        let mut state = self.state.lock();

        let mut boundary = state.logpage.get_int(0);
        let bytes_needed = record.len() as i32 + 4;
        if boundary - bytes_needed < 4 {
            // The record does not fit: flush this block and start a new one.
            self.flush_page(&mut state)?;
            let new_block = Self::append_new_block(&self.fm, &self.logfile, &mut state.logpage)?;
            state.current_block = new_block;
            boundary = state.logpage.get_int(0);
        }

        let recpos = (boundary - bytes_needed) as usize;
        state.logpage.set_bytes(recpos, record);
        state.logpage.set_int(0, recpos as i32);

        state.latest_lsn += 1;
        Ok(state.latest_lsn)
    }

    /// Ensures every record with an LSN up to `lsn` is on disk. An LSN at
    /// or below the last saved one is already durable, so nothing is
    /// written.
    pub fn flush(&self, lsn: i32) -> Result<()> {
        let mut state = self.state.lock();
        if lsn > state.last_saved_lsn {
            self.flush_page(&mut state)?;
        }
        Ok(())
    }

    /// Returns an iterator over the log records in reverse insertion order
    /// (newest first). The log is flushed first so the iterator sees every
    /// record appended so far.
    pub fn iterator(&self) -> Result<LogIterator> {
        let mut state = self.state.lock();
        self.flush_page(&mut state)?;
        Ok(LogIterator::new(
            self.fm.clone(),
            state.current_block.clone(),
        )?)
    }

    fn flush_page(&self, state: &mut LogState) -> Result<()> {
        self.fm.write(&state.current_block, &state.logpage)?;
        state.last_saved_lsn = state.latest_lsn;
        Ok(())
    }

    /// Appends a fresh log block whose boundary starts at the block size,
    /// i.e. an empty record area.
    fn append_new_block(
        fm: &FileManager,
        logfile: &str,
        logpage: &mut Page,
    ) -> Result<BlockId> {
        let block = fm.append(logfile)?;
        *logpage = Page::new(fm.block_size());
        logpage.set_int(0, fm.block_size() as i32);
        fm.write(&block, logpage)?;
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_log(dir: &TempDir) -> LogManager {
        let fm = Arc::new(FileManager::new(dir.path(), 400).unwrap());
        LogManager::new(fm, "test.log").unwrap()
    }

    #[test]
    fn test_reverse_iteration_order() {
        let dir = TempDir::new().unwrap();
        let lm = create_log(&dir);

        lm.append(b"r1").unwrap();
        lm.append(b"r2").unwrap();
        let lsn = lm.append(b"r3").unwrap();
        lm.flush(lsn).unwrap();

        let records: Vec<Vec<u8>> = lm.iterator().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(records, vec![b"r3".to_vec(), b"r2".to_vec(), b"r1".to_vec()]);
    }

    #[test]
    fn test_lsns_increase_from_one() {
        let dir = TempDir::new().unwrap();
        let lm = create_log(&dir);
        for expected in 1..=10 {
            assert_eq!(lm.append(b"record").unwrap(), expected);
        }
    }

    #[test]
    fn test_iteration_spans_blocks() {
        let dir = TempDir::new().unwrap();
        let lm = create_log(&dir);

        // Each record is 50 bytes + a 4 byte prefix, so a 400-byte block
        // holds at most 7; 40 records spread over several blocks.
        let payload = [7u8; 50];
        for _ in 0..40 {
            lm.append(&payload).unwrap();
        }

        let records: Vec<Vec<u8>> = lm.iterator().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 40);
        assert!(records.iter().all(|r| r == &payload.to_vec()));
    }

    #[test]
    fn test_log_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let lm = create_log(&dir);
            let lsn = lm.append(b"persisted").unwrap();
            lm.flush(lsn).unwrap();
        }
        let lm = create_log(&dir);
        let records: Vec<Vec<u8>> = lm.iterator().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(records, vec![b"persisted".to_vec()]);
    }

    #[test]
    fn test_oversized_record_rejected() {
        let dir = TempDir::new().unwrap();
        let lm = create_log(&dir);
        let too_big = vec![0u8; 400];
        assert!(matches!(
            lm.append(&too_big),
            Err(LogError::RecordTooLarge(_, _))
        ));
    }
}
